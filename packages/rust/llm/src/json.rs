//! Extraction of JSON objects from model replies.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use supportflow_shared::{Result, SupportFlowError};

/// Matches a fenced block such as ```` ```json\n{...}\n``` ````.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*\n?(.*?)\n?\s*```$").expect("valid fence regex")
});

/// Parse a reply as a JSON object, tolerating a surrounding Markdown fence.
///
/// Anything that is not an object (arrays, scalars, prose) is a parse error.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>> {
    let trimmed = text.trim();
    let body = FENCE_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str().trim());

    let value: Value = serde_json::from_str(body).map_err(|e| {
        SupportFlowError::parse(format!(
            "reply is not valid JSON: {e} (got: {})",
            preview(body)
        ))
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(SupportFlowError::parse(format!(
            "expected a JSON object, got: {}",
            preview(&other.to_string())
        ))),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_object() {
        let map = extract_json_object(r#"{"category": "Billing"}"#).unwrap();
        assert_eq!(map["category"], "Billing");
    }

    #[test]
    fn parses_fenced_object() {
        let text = "```json\n{\"category\": \"Bug\", \"urgency\": \"High\"}\n```";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["urgency"], "High");
    }

    #[test]
    fn parses_bare_fence() {
        let map = extract_json_object("```\n{\"a\": 1}\n```").unwrap();
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn rejects_prose() {
        let err = extract_json_object("Category: Billing").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn rejects_non_object_json() {
        assert!(extract_json_object("[1, 2, 3]").is_err());
        assert!(extract_json_object("\"Billing\"").is_err());
    }
}
