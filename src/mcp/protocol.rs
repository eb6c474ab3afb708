use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Catalog entry for a registered tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value, // JSON Schema
}

/// Tool call request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Tool call response at the boundary: payload rendered to a string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub result: String,
    pub mime_type: String,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            result: text.into(),
            mime_type: "text/plain".into(),
            is_error: false,
            error: None,
        }
    }

    pub fn json(value: &Value) -> Self {
        Self {
            result: serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            mime_type: "application/json".into(),
            is_error: false,
            error: None,
        }
    }

    pub fn error(error: ToolError) -> Self {
        Self {
            result: error.message.clone(),
            mime_type: "text/plain".into(),
            is_error: true,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_tool_call_defaults_arguments() {
        let call: ToolCall = serde_json::from_str(r#"{"name": "Get Routes"}"#).unwrap();
        assert_eq!(call.name, "Get Routes");
        assert!(call.arguments.is_null());
    }

    #[test]
    fn test_call_result_serializes_camel_case() {
        let result = ToolCallResult::json(&json!({"routes": []}));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["mimeType"], "application/json");
        assert_eq!(value["isError"], false);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_result_carries_kind() {
        let result = ToolCallResult::error(ToolError {
            kind: ErrorKind::ToolNotFound,
            message: "Tool not found: Nope".into(),
        });
        assert!(result.is_error);
        assert_eq!(result.result, "Tool not found: Nope");
        assert_eq!(result.error.unwrap().kind, ErrorKind::ToolNotFound);
    }
}
