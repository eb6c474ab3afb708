use serde_json::{json, Value};

use crate::error::{EvalError, EvalResult};
use crate::mcp::paths::{relative_display, render_tree, resolve_within};
use crate::mcp::protocol::ToolDescriptor;
use crate::mcp::tools::{str_arg, str_list_arg, ToolContext, ToolExecutor, ToolPayload};

const PROJECT_STRUCTURE_DEPTH: usize = 2;

pub struct GetFileContent;

impl ToolExecutor for GetFileContent {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "Get File Content".into(),
            description: "Read one or more files inside the project.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path relative to project root" },
                    "paths": { "type": "array", "items": { "type": "string" }, "description": "Several files at once" }
                }
            }),
        }
    }

    fn call(&self, ctx: &ToolContext, args: &Value) -> EvalResult<ToolPayload> {
        let mut requested = str_list_arg(args, &["paths", "files"]);
        if let Some(single) = str_arg(args, &["path", "filePath"]) {
            requested.insert(0, single.to_string());
        }
        if requested.is_empty() {
            return Err(EvalError::ToolExecutionFailure(
                "Missing required parameter: path".into(),
            ));
        }

        // Resolve everything first so one escaping path rejects the whole call
        let mut resolved = Vec::with_capacity(requested.len());
        for path in &requested {
            let file = resolve_within(&ctx.root, path)?;
            if !file.is_file() {
                return Err(EvalError::InvalidPath(format!("{} is not a file", path)));
            }
            resolved.push(file);
        }

        if resolved.len() == 1 {
            return Ok(ToolPayload::Text(std::fs::read_to_string(&resolved[0])?));
        }

        let mut output = String::new();
        for file in resolved {
            let content = std::fs::read_to_string(&file)?;
            output.push_str(&format!(
                "=== {} ===\n{}\n\n",
                relative_display(&ctx.root, &file),
                content.trim_end()
            ));
        }
        Ok(ToolPayload::Text(output.trim_end().to_string()))
    }
}

pub struct ReadDirectory;

impl ToolExecutor for ReadDirectory {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "Read Directory".into(),
            description: "Recursively list a directory inside the project.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory relative to project root", "default": "." }
                }
            }),
        }
    }

    fn call(&self, ctx: &ToolContext, args: &Value) -> EvalResult<ToolPayload> {
        let requested = str_arg(args, &["path", "dirPath"]).unwrap_or(".");
        let dir = resolve_within(&ctx.root, requested)?;
        if !dir.is_dir() {
            return Err(EvalError::InvalidPath(format!("{} is not a directory", requested)));
        }

        let listing = render_tree(&ctx.root, &dir, usize::MAX, &ctx.project.exclude);
        Ok(ToolPayload::Text(format!(
            "{}/\n{}",
            relative_display(&ctx.root, &dir),
            listing
        )))
    }
}

pub struct GetProjectStructure;

impl ToolExecutor for GetProjectStructure {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "Get Project Structure".into(),
            description: "Top two levels of the project layout.".into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    fn call(&self, ctx: &ToolContext, _args: &Value) -> EvalResult<ToolPayload> {
        let listing = render_tree(
            &ctx.root,
            &ctx.root,
            PROJECT_STRUCTURE_DEPTH,
            &ctx.project.exclude,
        );
        Ok(ToolPayload::Text(listing))
    }
}
