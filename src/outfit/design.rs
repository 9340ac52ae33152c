use tracing::warn;

use crate::config::{CONFIG, DESIGN_PROMPT_TEMPLATE};
use crate::llm::gemini::generate_text;
use crate::outfit::error::{OutfitError, OutfitResult};

pub fn design_prompt(description: &str) -> String {
    DESIGN_PROMPT_TEMPLATE.replace("{description}", description.trim())
}

/// Expands a short outfit description into a full design write-up.
///
/// Blank input returns an empty string without calling the model.
pub async fn generate_design_text(description: &str) -> OutfitResult<String> {
    if description.trim().is_empty() {
        return Ok(String::new());
    }

    let prompt = design_prompt(description);
    let text = generate_text(&prompt, CONFIG.design_temperature, "design_text")
        .await
        .map_err(|err| {
            warn!("Design text generation failed: {err}");
            OutfitError::from(err)
        })?;

    if text.trim().is_empty() {
        warn!("Design text generation returned no text");
        return Err(OutfitError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_trimmed_description() {
        let prompt = design_prompt("  navy saree with silver border \n");
        assert!(prompt.contains("\"navy saree with silver border\""));
        assert!(prompt.contains("colors, fabric, drape, patterns"));
    }

    #[tokio::test]
    async fn blank_description_skips_the_model() {
        let text = generate_design_text(" \t\n").await.expect("no call made");
        assert!(text.is_empty());
    }
}
