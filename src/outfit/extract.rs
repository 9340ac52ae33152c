//! Pulls JSON payloads out of free-form model text.
//!
//! Models wrap JSON in prose or markdown fences no matter how strictly the
//! prompt forbids it. The scan takes the span from the first opening
//! delimiter to the last closing delimiter of the same kind and hands it to a
//! strict `serde_json` parse. Nothing here panics; every failure is an
//! [`ExtractionFailure`].

use serde_json::{Map, Value};

use crate::outfit::error::ExtractionFailure;

/// Returns the span from the first `open` to the last `close`, inclusive.
pub fn delimited_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(&text[start..end + close.len_utf8()])
}

pub fn parse_json_object(text: &str) -> Result<Map<String, Value>, ExtractionFailure> {
    let span = delimited_span(text, '{', '}').ok_or(ExtractionFailure::NoJsonFound)?;
    match serde_json::from_str::<Value>(span)? {
        Value::Object(object) => Ok(object),
        _ => Err(ExtractionFailure::NotAnObject),
    }
}

/// Lenient form of [`parse_json_object`]: `None` on any failure.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    parse_json_object(text).ok()
}

/// Parses the `[...]` span of a response, or the whole trimmed response when
/// it contains no bracket pair. The caller decides what a non-array means.
pub fn parse_json_array_span(text: &str) -> Result<Value, ExtractionFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractionFailure::NoJsonFound);
    }
    let span = delimited_span(trimmed, '[', ']').unwrap_or(trimmed);
    Ok(serde_json::from_str::<Value>(span)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn returns_none_without_brace_pair() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("only an opener {").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("").is_none());
    }

    #[test]
    fn extracts_object_from_markdown_fence() {
        let text = "Sure! ```json\n{\"colors\":\"navy\",\"garment_type\":\"saree\"}\n```";
        let object = extract_json_object(text).expect("object");
        assert_eq!(
            Value::Object(object),
            json!({"colors": "navy", "garment_type": "saree"})
        );
    }

    #[test]
    fn span_runs_from_first_open_to_last_close() {
        let text = "a {\"x\": {\"y\": 1}} b } c";
        assert_eq!(delimited_span(text, '{', '}'), Some("{\"x\": {\"y\": 1}} b }"));
        assert!(matches!(
            parse_json_object(text),
            Err(ExtractionFailure::Malformed(_))
        ));
    }

    #[test]
    fn nested_object_is_kept_whole() {
        let text = "Here you go: {\"colors\": \"red\", \"meta\": {\"n\": 2}} thanks";
        let object = extract_json_object(text).expect("object");
        assert_eq!(object.get("meta"), Some(&json!({"n": 2})));
    }

    #[test]
    fn array_span_is_preferred_over_whole_text() {
        let text = "Products:\n[{\"title\": \"A\", \"price\": 10, \"site\": \"Ajio\"}]\nEnjoy!";
        let value = parse_json_array_span(text).expect("array");
        assert_eq!(value.as_array().map(|items| items.len()), Some(1));
    }

    #[test]
    fn whole_text_is_parsed_when_no_brackets() {
        let value = parse_json_array_span(" {\"products\": 0} ").expect("value");
        assert!(value.is_object());
    }

    #[test]
    fn truncated_array_is_malformed() {
        let text = "[{\"title\": \"Silk saree\", \"price\": 1500, \"site\": \"Myn";
        assert!(matches!(
            parse_json_array_span(text),
            Err(ExtractionFailure::Malformed(_))
        ));
    }

    #[test]
    fn blank_response_has_no_json() {
        assert!(matches!(
            parse_json_array_span("   "),
            Err(ExtractionFailure::NoJsonFound)
        ));
    }
}
