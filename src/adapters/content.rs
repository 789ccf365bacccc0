use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON format";

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```(?:[\w+-]+)?[ \t]*\r?\n([\s\S]*?)```").expect("fence pattern is valid")
    })
}

/// Replaces every fenced code block with its body and trims the result.
pub fn strip_code_fences(text: &str) -> String {
    fence_regex().replace_all(text, "$1").trim().to_string()
}

/// Turns the model's free-form reply into a JSON payload. Text that does not
/// parse becomes `{"error": "Invalid JSON format", "rawContent": ...}`.
pub fn parse_model_content(raw: &str) -> Value {
    let sanitized = strip_code_fences(raw);
    match serde_json::from_str::<Value>(&sanitized) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Model output is not valid JSON ({}), returning raw content", e);
            repair_payload(&sanitized)
        }
    }
}

pub fn repair_payload(raw_content: &str) -> Value {
    json!({
        "error": INVALID_JSON_MESSAGE,
        "rawContent": raw_content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_with_language_tag() {
        let payload = parse_model_content("```json\n{\"a\":1}\n```");
        assert_eq!(payload, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_json_without_language_tag() {
        let payload = parse_model_content("```\n[1, 2, 3]\n```\n");
        assert_eq!(payload, json!([1, 2, 3]));
    }

    #[test]
    fn test_plain_json_passes_through() {
        let payload = parse_model_content("  {\"invoice\": \"INV-7\", \"total\": 12.5}  ");
        assert_eq!(payload, json!({"invoice": "INV-7", "total": 12.5}));
    }

    #[test]
    fn test_unparsable_text_becomes_repair_payload() {
        let payload = parse_model_content("not json");
        assert_eq!(
            payload,
            json!({"error": "Invalid JSON format", "rawContent": "not json"})
        );
    }

    #[test]
    fn test_repair_payload_holds_stripped_text() {
        let payload = parse_model_content("```text\nsorry, unreadable\n```");
        assert_eq!(payload["rawContent"], "sorry, unreadable");
    }

    #[test]
    fn test_scalar_json_is_kept() {
        assert_eq!(parse_model_content("42"), json!(42));
        assert_eq!(parse_model_content("\"hello\""), json!("hello"));
    }
}
