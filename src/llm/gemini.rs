use std::time::Duration;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::CONFIG;
use crate::llm::media::{detect_mime_type, truncate_for_log};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    #[allow(dead_code)]
    Other(Value),
}

const GEMINI_RETRY_BASE_DELAY_MS: u64 = 900;
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

fn gemini_should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn gemini_should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn gemini_retry_delay(attempt: usize) -> Duration {
    let attempt = attempt.max(1) as u64;
    Duration::from_millis(GEMINI_RETRY_BASE_DELAY_MS.saturating_mul(attempt))
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut text_preview = None;
    let mut finish_reasons = Vec::new();

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates {
        if let Some(reason) = &candidate.finish_reason {
            finish_reasons.push(reason.clone());
        }
        let parts = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[]);
        for part in parts {
            if let GeminiPart::Text { text } = part {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "textParts": text_parts,
        "finishReasons": finish_reasons,
        "textPreview": text_preview
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn normalize_gemini_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

fn gemini_supports_image_mime(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/png" | "image/jpeg" | "image/webp" | "image/heic" | "image/heif"
    )
}

/// MIME type sent with inline image data. Unknown or unsupported formats are
/// labelled as JPEG and left for the model to reject.
fn gemini_image_mime(image: &[u8]) -> String {
    detect_mime_type(image)
        .map(|mime| normalize_gemini_mime_type(&mime))
        .filter(|mime| gemini_supports_image_mime(mime))
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string())
}

fn build_text_payload(prompt: &str, temperature: f32) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": { "temperature": temperature },
    })
}

fn build_image_payload(prompt: &str, image: &[u8], temperature: f32) -> Value {
    let encoded = general_purpose::STANDARD.encode(image);
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": prompt },
                { "inlineData": { "mimeType": gemini_image_mime(image), "data": encoded } }
            ]
        }],
        "generationConfig": { "temperature": temperature },
    })
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            for part in content.parts.unwrap_or_default() {
                if let GeminiPart::Text { text } = part {
                    if !text.trim().is_empty() {
                        text_parts.push(text);
                    }
                }
            }
        }
    }
    text_parts.join("\n")
}

async fn call_gemini_api(model: &str, payload: Value) -> Result<GeminiResponse> {
    let client = get_http_client();
    let url = format!(
        "{}/models/{}:generateContent",
        CONFIG.gemini_api_base, model
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        let payload_summary = summarize_gemini_payload(&payload);
        debug!(target: "llm.gemini", model = model, payload = %payload_summary);
    }

    let max_attempts = CONFIG.gemini_max_attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let response = match client
            .post(&url)
            .header("x-goog-api-key", &CONFIG.gemini_api_key)
            .timeout(Duration::from_secs(CONFIG.gemini_timeout_seconds))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let should_retry = gemini_should_retry_error(&err) && attempt < max_attempts;
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?}, retrying={})",
                    err,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status(),
                    should_retry
                );
                if should_retry {
                    tokio::time::sleep(gemini_retry_delay(attempt)).await;
                    continue;
                }
                if err.is_timeout() {
                    return Err(anyhow!("Gemini request timed out"));
                }
                return Err(anyhow!("Gemini request failed: {}", err));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            let should_retry = gemini_should_retry_status(status) && attempt < max_attempts;
            warn!(
                "Gemini API error: status={}, body={}, retrying={}",
                status, body_summary, should_retry
            );
            if should_retry {
                tokio::time::sleep(gemini_retry_delay(attempt)).await;
                continue;
            }
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                detail
            ));
        }

        let value = response.json::<GeminiResponse>().await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        return Ok(value);
    }
}

/// Single-turn text completion. Returns the joined text parts, possibly empty.
pub async fn generate_text(prompt: &str, temperature: f32, operation: &str) -> Result<String> {
    let model = CONFIG.gemini_model.as_str();
    let payload = build_text_payload(prompt, temperature);
    let metadata = json!({ "temperature": temperature, "promptChars": prompt.chars().count() });

    log_llm_timing("gemini", model, operation, Some(metadata), || async move {
        let response = call_gemini_api(model, payload).await?;
        Ok(extract_text_from_response(response))
    })
    .await
}

/// Text completion over a prompt followed by one inline image.
pub async fn generate_text_with_image(
    prompt: &str,
    image: &[u8],
    temperature: f32,
    operation: &str,
) -> Result<String> {
    if image.is_empty() {
        return Err(anyhow!("image data is empty"));
    }
    let model = CONFIG.gemini_model.as_str();
    let payload = build_image_payload(prompt, image, temperature);
    let metadata = json!({ "temperature": temperature, "imageBytes": image.len() });

    log_llm_timing("gemini", model, operation, Some(metadata), || async move {
        let response = call_gemini_api(model, payload).await?;
        Ok(extract_text_from_response(response))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52,
    ];

    #[test]
    fn joins_non_empty_text_parts_across_candidates() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "first" }, { "text": "  " }] }, "finishReason": "STOP" },
                { "content": { "parts": [{ "inlineData": { "mimeType": "image/png", "data": "AA==" } }, { "text": "second" }] } }
            ]
        }))
        .expect("response");
        assert_eq!(extract_text_from_response(response), "first\nsecond");
    }

    #[test]
    fn missing_candidates_yield_empty_text() {
        let response: GeminiResponse = serde_json::from_value(json!({})).expect("response");
        assert_eq!(extract_text_from_response(response), "");
    }

    #[test]
    fn error_body_prefers_api_message() {
        let (message, _) =
            summarize_error_body(r#"{"error":{"code":400,"message":"API key not valid"}}"#);
        assert_eq!(message.as_deref(), Some("API key not valid"));

        let (message, summary) = summarize_error_body("   ");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn image_payload_carries_sniffed_mime_and_base64() {
        let payload = build_image_payload("tag this", &PNG_HEADER, 0.3);
        let parts = payload
            .pointer("/contents/0/parts")
            .and_then(|value| value.as_array())
            .expect("parts");
        assert_eq!(parts[0]["text"], "tag this");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            parts[1]["inlineData"]["data"],
            general_purpose::STANDARD.encode(PNG_HEADER)
        );
        let temperature = payload
            .pointer("/generationConfig/temperature")
            .and_then(|value| value.as_f64())
            .expect("temperature");
        assert!((temperature - 0.3).abs() < 1e-6);
    }

    #[test]
    fn unknown_image_bytes_are_sent_as_jpeg() {
        assert_eq!(gemini_image_mime(b"not an image at all"), "image/jpeg");
        assert_eq!(normalize_gemini_mime_type(" IMAGE/JPG "), "image/jpeg");
    }

    #[test]
    fn payload_summary_hides_inline_data() {
        let payload = build_image_payload("tag this", &PNG_HEADER, 0.3);
        let summary = summarize_gemini_payload(&payload);
        let part = summary
            .pointer("/contents/0/parts/1/inlineData")
            .expect("inline data summary");
        assert!(part.get("data").is_none());
        assert!(part["dataLen"].as_u64().unwrap_or(0) > 0);
    }

    #[test]
    fn retry_policy_matches_transient_statuses() {
        assert!(gemini_should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(gemini_should_retry_status(StatusCode::BAD_GATEWAY));
        assert!(!gemini_should_retry_status(StatusCode::BAD_REQUEST));
        assert_eq!(gemini_retry_delay(2), Duration::from_millis(1800));
    }
}
