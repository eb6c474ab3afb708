//! Payload compression for the context token budget.
//!
//! Structured payloads shrink by keeping the head of every list; text is cut
//! to a character budget. The result never exceeds the requested token count.

use serde_json::Value;

use crate::mcp::{estimate_tokens, ToolPayload};

const TRUNCATION_MARKER: &str = "\n[...truncated]";

/// One token unit per 100 list items' worth of budget, at least one item
pub const TOKENS_PER_LIST_ITEM: usize = 100;

/// Result of a compression operation
#[derive(Debug, Clone)]
pub struct CompressResult {
    pub payload: ToolPayload,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
}

impl CompressResult {
    pub fn new(original: &ToolPayload, payload: ToolPayload) -> Self {
        Self {
            original_tokens: original.token_count(),
            compressed_tokens: payload.token_count(),
            payload,
        }
    }

    pub fn reduction_percent(&self) -> f64 {
        if self.original_tokens == 0 || self.compressed_tokens >= self.original_tokens {
            return 0.0;
        }
        ((self.original_tokens - self.compressed_tokens) as f64 / self.original_tokens as f64)
            * 100.0
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut when there is room
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars > marker_len * 2 {
        let head: String = text.chars().take(max_chars - marker_len).collect();
        format!("{}{}", head, TRUNCATION_MARKER)
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Keep the first `keep` items of every list, at any depth
fn trim_lists(value: &Value, keep: usize) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(keep)
                .map(|v| trim_lists(v, keep))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), trim_lists(v, keep)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Shrink a payload to fit `max_tokens`.
///
/// Lists are cut to `max(1, max_tokens / 100)` items; when that is still too
/// large the rendered payload is cut as text.
pub fn summarize_payload(payload: &ToolPayload, max_tokens: usize) -> CompressResult {
    let max_chars = max_tokens * 4;

    let compressed = match payload {
        ToolPayload::Text(text) => ToolPayload::Text(truncate_chars(text, max_chars)),
        ToolPayload::Json(value) => {
            let keep = (max_tokens / TOKENS_PER_LIST_ITEM).max(1);
            let trimmed = ToolPayload::Json(trim_lists(value, keep));
            if trimmed.token_count() <= max_tokens {
                trimmed
            } else {
                ToolPayload::Text(truncate_chars(&payload.render(), max_chars))
            }
        }
    };

    debug_assert!(estimate_tokens(&compressed.render()) <= max_tokens);
    CompressResult::new(payload, compressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_chars_respects_limit() {
        let text = "x".repeat(500);
        let cut = truncate_chars(&text, 100);
        assert_eq!(cut.chars().count(), 100);
        assert!(cut.ends_with("[...truncated]"));

        let tiny = truncate_chars(&text, 5);
        assert_eq!(tiny, "xxxxx");

        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_summarize_text_payload() {
        let payload = ToolPayload::Text("a".repeat(4000));
        let result = summarize_payload(&payload, 100);
        assert!(result.compressed_tokens <= 100);
        assert_eq!(result.original_tokens, 1000);
        assert!((result.reduction_percent() - 90.0).abs() < 0.5);
    }

    #[test]
    fn test_summarize_json_keeps_list_heads() {
        let entities: Vec<_> = (0..20)
            .map(|i| json!({"name": format!("Entity{}", i)}))
            .collect();
        let payload = ToolPayload::Json(json!({ "entities": entities }));

        let result = summarize_payload(&payload, 250);
        let value = result.payload.as_json().unwrap();
        assert_eq!(value["entities"].as_array().unwrap().len(), 2);
        assert_eq!(value["entities"][0]["name"], "Entity0");
        assert!(result.compressed_tokens <= 250);
    }

    #[test]
    fn test_summarize_json_falls_back_to_text() {
        let big = "y".repeat(2000);
        let payload = ToolPayload::Json(json!({ "blob": big }));

        let result = summarize_payload(&payload, 50);
        assert!(matches!(result.payload, ToolPayload::Text(_)));
        assert!(result.compressed_tokens <= 50);
    }

    #[test]
    fn test_summarize_zero_budget() {
        let payload = ToolPayload::Text("abc".into());
        let result = summarize_payload(&payload, 0);
        assert!(result.payload.is_empty());
    }
}
