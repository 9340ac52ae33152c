use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use tracing::warn;

use crate::config::{CONFIG, IMAGE_STYLE_DIRECTIVE};
use crate::outfit::error::{OutfitError, OutfitResult};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8];
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G'];

pub fn illustration_prompt(description: &str) -> String {
    format!("{IMAGE_STYLE_DIRECTIVE}{description}")
}

pub fn illustration_url(endpoint: &str, prompt: &str) -> String {
    format!(
        "{}/prompt/{}",
        endpoint.trim_end_matches('/'),
        urlencoding::encode(prompt)
    )
}

pub fn has_image_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(JPEG_SIGNATURE) || bytes.starts_with(PNG_SIGNATURE)
}

/// Upload name matching the payload's signature. JPEG unless it is a PNG.
pub fn image_file_name(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(PNG_SIGNATURE) {
        "design.png"
    } else {
        "design.jpg"
    }
}

/// Accepts a response only when it is a success carrying more than
/// `min_bytes` of JPEG or PNG data.
pub fn validate_image_payload(
    status: StatusCode,
    body: Vec<u8>,
    min_bytes: usize,
) -> OutfitResult<Vec<u8>> {
    if !status.is_success() {
        return Err(OutfitError::HttpStatus(status.as_u16()));
    }
    if body.len() <= min_bytes || !has_image_signature(&body) {
        return Err(OutfitError::InvalidImage { len: body.len() });
    }
    Ok(body)
}

fn classify_request_error(err: reqwest::Error) -> OutfitError {
    if err.is_timeout() {
        OutfitError::Timeout
    } else {
        OutfitError::Upstream(err.without_url().to_string())
    }
}

/// Fetches an illustration of the described outfit from the image endpoint.
pub async fn render_design_image(description: &str) -> OutfitResult<Vec<u8>> {
    let prompt = illustration_prompt(description);
    let url = illustration_url(&CONFIG.image_endpoint, &prompt);
    let metadata = json!({ "promptChars": prompt.chars().count() });

    let result = log_llm_timing(
        "pollinations",
        "image",
        "render_design_image",
        Some(metadata),
        || async {
            let response = get_http_client()
                .get(&url)
                .timeout(Duration::from_secs(CONFIG.image_timeout_seconds))
                .send()
                .await
                .map_err(classify_request_error)?;
            let status = response.status();
            let body = response.bytes().await.map_err(classify_request_error)?;
            validate_image_payload(status, body.to_vec(), CONFIG.image_min_bytes)
        },
    )
    .await;

    if let Err(err) = &result {
        warn!("Design image rendering failed: {}", err);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_body(len: usize) -> Vec<u8> {
        let mut body = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        body.resize(len, 0);
        body
    }

    #[test]
    fn prompt_and_url_are_percent_encoded() {
        let prompt = illustration_prompt("navy saree");
        assert!(prompt.starts_with("High-quality fashion illustration"));
        assert!(prompt.ends_with("studio background. navy saree"));

        let url = illustration_url("https://image.pollinations.ai/", "navy saree, silver border");
        assert_eq!(
            url,
            "https://image.pollinations.ai/prompt/navy%20saree%2C%20silver%20border"
        );
    }

    #[test]
    fn accepts_large_png_and_jpeg() {
        assert!(validate_image_payload(StatusCode::OK, png_body(512), 100).is_ok());

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
        jpeg.resize(101, 0);
        assert!(validate_image_payload(StatusCode::OK, jpeg, 100).is_ok());
    }

    #[test]
    fn file_name_follows_signature() {
        assert_eq!(image_file_name(&png_body(512)), "design.png");
        assert_eq!(image_file_name(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), "design.jpg");
    }

    #[test]
    fn tiny_success_body_is_invalid() {
        let result = validate_image_payload(StatusCode::OK, b"hello".to_vec(), 100);
        assert!(matches!(result, Err(OutfitError::InvalidImage { len: 5 })));
    }

    #[test]
    fn body_at_threshold_is_rejected() {
        let result = validate_image_payload(StatusCode::OK, png_body(100), 100);
        assert!(matches!(result, Err(OutfitError::InvalidImage { len: 100 })));
    }

    #[test]
    fn unknown_signature_is_invalid() {
        let body = vec![b'<'; 400];
        assert!(matches!(
            validate_image_payload(StatusCode::OK, body, 100),
            Err(OutfitError::InvalidImage { len: 400 })
        ));
    }

    #[test]
    fn error_status_wins_over_body() {
        let result = validate_image_payload(StatusCode::BAD_GATEWAY, png_body(512), 100);
        assert!(matches!(result, Err(OutfitError::HttpStatus(502))));
    }
}
