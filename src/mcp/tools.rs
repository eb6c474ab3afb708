use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::executors;
use super::protocol::{ToolCall, ToolCallResult, ToolDescriptor};
use crate::config::{Config, ProjectConfig};
use crate::error::{EvalError, EvalResult, ToolError};

/// Rough token estimate: one unit per four characters
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Lookup key for a tool name: lowercase alphanumerics only,
/// so "Get Entities", "GetEntities" and "get_entities" collide
pub fn normalize_tool_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Output of a tool: free text or a structured document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ToolPayload {
    Text(String),
    Json(Value),
}

impl ToolPayload {
    pub fn render(&self) -> String {
        match self {
            ToolPayload::Text(text) => text.clone(),
            ToolPayload::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ToolPayload::Text(_) => "text/plain",
            ToolPayload::Json(_) => "application/json",
        }
    }

    pub fn token_count(&self) -> usize {
        estimate_tokens(&self.render())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ToolPayload::Text(text) => text.trim().is_empty(),
            ToolPayload::Json(Value::Null) => true,
            ToolPayload::Json(Value::Array(items)) => items.is_empty(),
            ToolPayload::Json(Value::Object(map)) => map.is_empty(),
            ToolPayload::Json(Value::String(s)) => s.is_empty(),
            ToolPayload::Json(_) => false,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ToolPayload::Json(value) => Some(value),
            ToolPayload::Text(_) => None,
        }
    }
}

/// Record of a single tool execution. Derived copies go through [`Self::with_payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub call_id: String,
    pub tool_name: String,
    pub success: bool,
    pub payload: Option<ToolPayload>,
    pub mime_type: String,
    pub error: Option<ToolError>,
    pub token_count: usize,
    pub executed_at: DateTime<Utc>,
    /// Monotonic per registry; orders executions even within one clock tick
    pub sequence: u64,
    #[serde(default)]
    pub truncated: bool,
}

impl ToolInvocationResult {
    fn succeeded(tool_name: String, payload: ToolPayload, sequence: u64) -> Self {
        Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            tool_name,
            success: true,
            mime_type: payload.mime_type().to_string(),
            token_count: payload.token_count(),
            payload: Some(payload),
            error: None,
            executed_at: Utc::now(),
            sequence,
            truncated: false,
        }
    }

    fn failed(tool_name: String, error: &EvalError, sequence: u64) -> Self {
        Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            tool_name,
            success: false,
            payload: None,
            mime_type: "text/plain".into(),
            error: Some(ToolError::from(error)),
            token_count: 0,
            executed_at: Utc::now(),
            sequence,
            truncated: false,
        }
    }

    /// Copy of this result carrying a reduced payload, marked truncated
    pub fn with_payload(&self, payload: ToolPayload) -> Self {
        Self {
            mime_type: payload.mime_type().to_string(),
            token_count: payload.token_count(),
            payload: Some(payload),
            truncated: true,
            ..self.clone()
        }
    }

    pub fn json(&self) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.as_json())
    }

    pub fn to_call_result(&self) -> ToolCallResult {
        match (&self.payload, &self.error) {
            (Some(ToolPayload::Json(value)), _) => ToolCallResult::json(value),
            (Some(ToolPayload::Text(text)), _) => ToolCallResult::text(text.clone()),
            (None, Some(error)) => ToolCallResult::error(error.clone()),
            (None, None) => ToolCallResult::text(String::new()),
        }
    }
}

/// Read-only view of the project shared by all executors
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Canonical project root
    pub root: PathBuf,
    pub project: ProjectConfig,
}

impl ToolContext {
    pub fn new(root: PathBuf, project: ProjectConfig) -> Self {
        Self { root, project }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.target_root.clone(), config.settings.project.clone())
    }
}

/// One introspection capability
pub trait ToolExecutor: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    fn call(&self, ctx: &ToolContext, args: &Value) -> EvalResult<ToolPayload>;
}

pub struct ToolRegistry {
    ctx: ToolContext,
    tools: BTreeMap<String, Box<dyn ToolExecutor>>,
    sequence: AtomicU64,
}

impl ToolRegistry {
    /// Empty registry
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            ctx,
            tools: BTreeMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Registry preloaded with the full catalog
    pub fn with_defaults(ctx: ToolContext) -> Self {
        let mut registry = Self::new(ctx);
        for tool in executors::catalog() {
            registry.register(tool);
        }
        registry
    }

    pub fn register(&mut self, tool: Box<dyn ToolExecutor>) {
        let key = normalize_tool_name(&tool.descriptor().name);
        self.tools.insert(key, tool);
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<_> = self.tools.values().map(|t| t.descriptor()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Display name of a registered tool, whatever spelling was requested
    pub fn canonical_name(&self, name: &str) -> Option<String> {
        self.tools
            .get(&normalize_tool_name(name))
            .map(|t| t.descriptor().name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(&normalize_tool_name(name))
    }

    /// Run a tool. Never fails: unknown names and executor errors become failed results.
    pub fn invoke(&self, name: &str, args: &Value) -> ToolInvocationResult {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let Some(tool) = self.tools.get(&normalize_tool_name(name)) else {
            warn!("Tool not found: {}", name);
            let err = EvalError::ToolNotFound(name.to_string());
            return ToolInvocationResult::failed(name.to_string(), &err, sequence);
        };

        let tool_name = tool.descriptor().name;
        debug!("Invoking tool {} (#{}) with {}", tool_name, sequence, args);

        match tool.call(&self.ctx, args) {
            Ok(payload) => ToolInvocationResult::succeeded(tool_name, payload, sequence),
            Err(e) => {
                warn!("Tool {} failed: {}", tool_name, e);
                ToolInvocationResult::failed(tool_name, &e, sequence)
            }
        }
    }

    /// Boundary form of [`Self::invoke`]
    pub fn execute(&self, call: &ToolCall) -> ToolCallResult {
        self.invoke(&call.name, &call.arguments).to_call_result()
    }
}

/// String argument, accepting any of the given aliases
pub(crate) fn str_arg<'a>(args: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|n| args.get(*n).and_then(|v| v.as_str()))
        .filter(|s| !s.trim().is_empty())
}

/// String-list argument; a lone string counts as a one-element list
pub(crate) fn str_list_arg(args: &Value, names: &[&str]) -> Vec<String> {
    for name in names {
        match args.get(*name) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect()
            }
            Some(Value::String(s)) if !s.is_empty() => return vec![s.clone()],
            _ => {}
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    struct EchoTool;

    impl ToolExecutor for EchoTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "Echo Text".into(),
                description: "Echo the text argument".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        fn call(&self, _ctx: &ToolContext, args: &Value) -> EvalResult<ToolPayload> {
            match str_arg(args, &["text"]) {
                Some(text) => Ok(ToolPayload::Text(text.to_string())),
                None => Err(EvalError::ToolExecutionFailure(
                    "Missing required parameter: text".into(),
                )),
            }
        }
    }

    fn registry() -> ToolRegistry {
        let ctx = ToolContext::new(PathBuf::from("."), ProjectConfig::default());
        let mut registry = ToolRegistry::new(ctx);
        registry.register(Box::new(EchoTool));
        registry
    }

    #[test]
    fn test_normalize_tool_name() {
        assert_eq!(normalize_tool_name("Get Entities"), "getentities");
        assert_eq!(normalize_tool_name("GetEntities"), "getentities");
        assert_eq!(normalize_tool_name("get_entities"), "getentities");
    }

    #[test]
    fn test_invoke_resolves_any_spelling() {
        let registry = registry();
        let result = registry.invoke("EchoText", &json!({"text": "hi"}));
        assert!(result.success);
        assert_eq!(result.tool_name, "Echo Text");
        assert_eq!(result.payload, Some(ToolPayload::Text("hi".into())));
    }

    #[test]
    fn test_unknown_tool_is_not_found_failure() {
        let registry = registry();
        let result = registry.invoke("Drop Database", &json!({}));
        assert!(!result.success);
        assert!(result.payload.is_none());
        assert_eq!(result.error.unwrap().kind, ErrorKind::ToolNotFound);
    }

    #[test]
    fn test_executor_error_is_caught() {
        let registry = registry();
        let result = registry.invoke("Echo Text", &json!({}));
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, ErrorKind::ToolExecutionFailure);
    }

    #[test]
    fn test_sequence_increases() {
        let registry = registry();
        let first = registry.invoke("Echo Text", &json!({"text": "a"}));
        let second = registry.invoke("Echo Text", &json!({"text": "b"}));
        assert!(first.sequence < second.sequence);
        assert!(first.executed_at <= second.executed_at);
    }

    #[test]
    fn test_with_payload_marks_truncated() {
        let registry = registry();
        let full = registry.invoke("Echo Text", &json!({"text": "a long piece of text"}));
        let cut = full.with_payload(ToolPayload::Text("a lo".into()));
        assert!(cut.truncated);
        assert_eq!(cut.token_count, 1);
        assert_eq!(cut.call_id, full.call_id);
        assert!(!full.truncated);
    }

    #[test]
    fn test_payload_emptiness() {
        assert!(ToolPayload::Text("  \n".into()).is_empty());
        assert!(ToolPayload::Json(json!([])).is_empty());
        assert!(!ToolPayload::Json(json!({"a": 1})).is_empty());
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }
}
