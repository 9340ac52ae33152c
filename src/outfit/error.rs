use thiserror::Error;

/// Why a structured payload could not be pulled out of a model response.
#[derive(Debug, Error)]
pub enum ExtractionFailure {
    #[error("no JSON payload found in model response")]
    NoJsonFound,

    #[error("model returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model returned JSON that is not an object")]
    NotAnObject,

    #[error("product entry {index} is not a JSON object")]
    ElementNotAnObject { index: usize },
}

#[derive(Debug, Error)]
pub enum OutfitError {
    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("upstream returned an empty response")]
    EmptyResponse,

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream returned HTTP {0}")]
    HttpStatus(u16),

    #[error("upstream returned {len} bytes that are not a JPEG or PNG image")]
    InvalidImage { len: usize },

    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),
}

impl From<anyhow::Error> for OutfitError {
    fn from(err: anyhow::Error) -> Self {
        OutfitError::Upstream(err.to_string())
    }
}

pub type OutfitResult<T> = std::result::Result<T, OutfitError>;
