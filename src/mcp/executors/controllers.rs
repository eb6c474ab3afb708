use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::error::{EvalError, EvalResult};
use crate::mcp::paths::{relative_display, walk_files};
use crate::mcp::protocol::ToolDescriptor;
use crate::mcp::tools::{ToolContext, ToolExecutor, ToolPayload};

static ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"public\s+function\s+(\w+)\s*\(").unwrap());

/// Public methods of a controller, constructor and magic methods excluded
pub fn controller_actions(source: &str) -> Vec<String> {
    ACTION_RE
        .captures_iter(source)
        .map(|c| c[1].to_string())
        .filter(|name| !name.starts_with("__"))
        .collect()
}

pub struct GetControllers;

impl ToolExecutor for GetControllers {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "Get Controllers".into(),
            description: "List controller classes and their public actions.".into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    fn call(&self, ctx: &ToolContext, _args: &Value) -> EvalResult<ToolPayload> {
        let controller_dir = ctx.root.join("src").join("Controller");
        if !controller_dir.is_dir() {
            return Err(EvalError::ToolExecutionFailure(format!(
                "Controller directory not found: {}",
                relative_display(&ctx.root, &controller_dir)
            )));
        }

        let mut controllers = Vec::new();
        for path in walk_files(&ctx.root, &controller_dir, &ctx.project.exclude) {
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".php"))
                .filter(|n| n.ends_with("Controller"))
            else {
                continue;
            };

            let source = std::fs::read_to_string(&path)?;
            controllers.push(json!({
                "name": name,
                "file": relative_display(&ctx.root, &path),
                "actions": controller_actions(&source),
            }));
        }

        Ok(ToolPayload::Json(json!({ "controllers": controllers })))
    }
}

/// Controller names from a Get Controllers payload
pub fn controller_names(payload: &Value) -> Vec<String> {
    payload
        .get("controllers")
        .and_then(|c| c.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.get("name").and_then(|n| n.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
