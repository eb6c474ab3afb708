use serde_json::{json, Value};
use std::path::Path;

use crate::config::ProjectConfig;
use crate::error::{EvalError, EvalResult};
use crate::mcp::paths::{relative_display, walk_files};
use crate::mcp::protocol::ToolDescriptor;
use crate::mcp::tools::{str_arg, ToolContext, ToolExecutor, ToolPayload};

fn is_searchable(path: &Path, project: &ProjectConfig) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    // dotfiles such as .env have no extension of their own
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .or_else(|| name.strip_prefix('.'))
        .unwrap_or("");
    project.search_extensions.iter().any(|e| e == ext)
}

pub struct SearchCode;

impl ToolExecutor for SearchCode {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "Search Code".into(),
            description: "Case-insensitive text search across project source and config files."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Text to look for" },
                    "max_results": { "type": "integer", "default": 50 }
                },
                "required": ["pattern"]
            }),
        }
    }

    fn call(&self, ctx: &ToolContext, args: &Value) -> EvalResult<ToolPayload> {
        let Some(pattern) = str_arg(args, &["pattern", "query"]) else {
            return Err(EvalError::ToolExecutionFailure(
                "Missing required parameter: pattern".into(),
            ));
        };
        let max_results = args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(ctx.project.max_search_results);

        let needle = pattern.to_lowercase();
        let mut matches = Vec::new();
        let mut total = 0usize;

        for path in walk_files(&ctx.root, &ctx.root, &ctx.project.exclude) {
            if !is_searchable(&path, &ctx.project) {
                continue;
            }
            // binary or non-UTF-8 files are skipped
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let rel = relative_display(&ctx.root, &path);

            for (idx, line) in content.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    total += 1;
                    if matches.len() < max_results {
                        matches.push(format!("{}:{}: {}", rel, idx + 1, line.trim()));
                    }
                }
            }
        }

        if matches.is_empty() {
            return Ok(ToolPayload::Text(format!(
                "No matches found for '{}'",
                pattern
            )));
        }

        let mut output = matches.join("\n");
        if total > matches.len() {
            output.push_str(&format!("\n... ({} more matches)", total - matches.len()));
        }
        Ok(ToolPayload::Text(output))
    }
}
