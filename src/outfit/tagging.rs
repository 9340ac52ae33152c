use tracing::{debug, warn};

use crate::config::{CONFIG, TAGGING_PROMPT};
use crate::llm::gemini::generate_text_with_image;
use crate::outfit::error::{OutfitError, OutfitResult};
use crate::outfit::extract::parse_json_object;
use crate::outfit::types::OutfitTagSet;

/// Turns a raw vision-model reply into a tag set.
pub fn tags_from_response(text: &str) -> OutfitResult<OutfitTagSet> {
    let object = parse_json_object(text)?;
    Ok(OutfitTagSet::from_json_object(&object))
}

/// Asks the vision model to describe the outfit in `image` as tags.
///
/// Callers that only want the tags should fall back to an empty set on
/// `Err`; the error is there to be reported, not to stop a search.
pub async fn extract_outfit_tags(image: &[u8]) -> OutfitResult<OutfitTagSet> {
    if image.is_empty() {
        return Err(OutfitError::Upstream("no image to tag".to_string()));
    }

    let text = generate_text_with_image(
        TAGGING_PROMPT,
        image,
        CONFIG.tagging_temperature,
        "image_tags",
    )
    .await
    .map_err(|err| {
        warn!("Image tagging request failed: {err}");
        OutfitError::from(err)
    })?;

    let tags = tags_from_response(&text).map_err(|err| {
        warn!("Image tagging response could not be parsed: {err}");
        err
    })?;
    debug!(target: "outfit.tags", count = tags.len(), tags = %tags.render());
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outfit::error::ExtractionFailure;
    use crate::outfit::types::TagKey;

    #[test]
    fn parses_fenced_reply() {
        let text = "Sure! ```json\n{\"colors\":\"navy\",\"garment_type\":\"saree\"}\n```";
        let tags = tags_from_response(text).expect("tags");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get(TagKey::Colors), Some("navy"));
        assert_eq!(tags.get(TagKey::GarmentType), Some("saree"));
    }

    #[test]
    fn prose_without_json_is_an_extraction_failure() {
        let result = tags_from_response("I cannot see an outfit in this picture.");
        assert!(matches!(
            result,
            Err(OutfitError::Extraction(ExtractionFailure::NoJsonFound))
        ));
    }

    #[test]
    fn broken_json_is_an_extraction_failure() {
        let result = tags_from_response("{\"colors\": \"navy\", \"style\": }");
        assert!(matches!(
            result,
            Err(OutfitError::Extraction(ExtractionFailure::Malformed(_)))
        ));
    }

    #[tokio::test]
    async fn empty_image_is_rejected_before_any_call() {
        assert!(extract_outfit_tags(&[]).await.is_err());
    }
}
