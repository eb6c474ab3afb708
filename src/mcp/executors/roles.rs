use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::error::EvalResult;
use crate::mcp::paths::walk_files;
use crate::mcp::protocol::ToolDescriptor;
use crate::mcp::tools::{ToolContext, ToolExecutor, ToolPayload};

static ROLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bROLE_[A-Z0-9_]+\b").unwrap());

/// Roles the demo application defines on its User entity
const DEFAULT_ROLES: &[&str] = &["ROLE_USER", "ROLE_ADMIN"];

fn describe_role(role: &str) -> &'static str {
    match role {
        "ROLE_USER" => "Default role for all users",
        "ROLE_ADMIN" => "Admin role for content management",
        "ROLE_SUPER_ADMIN" => "Unrestricted administrative access",
        "ROLE_ALLOWED_TO_SWITCH" => "May impersonate other users",
        _ => "Application-specific role",
    }
}

pub fn find_roles(source: &str) -> BTreeSet<String> {
    ROLE_RE
        .find_iter(source)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub struct GetUserRoles;

impl ToolExecutor for GetUserRoles {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "Get User Roles".into(),
            description: "List security roles referenced by the security config and source code."
                .into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    fn call(&self, ctx: &ToolContext, _args: &Value) -> EvalResult<ToolPayload> {
        let mut roles = BTreeSet::new();

        let security = ctx.root.join("config/packages/security.yaml");
        if security.is_file() {
            roles.extend(find_roles(&std::fs::read_to_string(&security)?));
        }

        let src = ctx.root.join("src");
        if src.is_dir() {
            for path in walk_files(&ctx.root, &src, &ctx.project.exclude) {
                if path.extension().map(|e| e == "php").unwrap_or(false) {
                    if let Ok(source) = std::fs::read_to_string(&path) {
                        roles.extend(find_roles(&source));
                    }
                }
            }
        }

        let source = if roles.is_empty() {
            roles.extend(DEFAULT_ROLES.iter().map(|r| r.to_string()));
            "default"
        } else {
            "scanned"
        };

        let roles: Vec<_> = roles
            .iter()
            .map(|r| json!({ "name": r, "description": describe_role(r) }))
            .collect();

        Ok(ToolPayload::Json(json!({ "roles": roles, "source": source })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_roles() {
        let yaml = r#"
role_hierarchy:
    ROLE_ADMIN: [ROLE_USER]
access_control:
    - { path: '^/admin', roles: ROLE_ADMIN }
"#;
        let roles: Vec<_> = find_roles(yaml).into_iter().collect();
        assert_eq!(roles, vec!["ROLE_ADMIN", "ROLE_USER"]);
    }

    #[test]
    fn test_describe_role() {
        assert_eq!(describe_role("ROLE_USER"), "Default role for all users");
        assert_eq!(describe_role("ROLE_EDITOR"), "Application-specific role");
    }
}
