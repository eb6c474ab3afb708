//! Turning included tool results into the structured parts of a bundle.

use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::mcp::executors::{controller_names, entity_names};
use crate::mcp::names::{
    GET_CONTEXTUAL_CODE_ANALYSIS, GET_CONTROLLERS, GET_ENTITIES, GET_ROUTES, GET_USER_ROLES,
};
use crate::mcp::{ToolInvocationResult, ToolPayload};

/// Included results keyed by canonical tool name
pub type RawContext = BTreeMap<String, ToolInvocationResult>;

pub type PatternDetector = Box<dyn Fn(&RawContext) -> bool + Send + Sync>;
pub type ConstraintDetector = Box<dyn Fn(&RawContext) -> Option<Value> + Send + Sync>;

fn json_of<'a>(raw: &'a RawContext, tool: &str) -> Option<&'a Value> {
    raw.get(tool).and_then(|r| r.json())
}

fn analysis_section<'a>(raw: &'a RawContext, path: &[&str]) -> Option<&'a Value> {
    let mut value = json_of(raw, GET_CONTEXTUAL_CODE_ANALYSIS)?;
    for key in path {
        value = value.get(*key)?;
    }
    Some(value)
}

fn any_payload_contains(raw: &RawContext, needle: &str) -> bool {
    raw.values()
        .filter_map(|r| r.payload.as_ref())
        .any(|p| p.render().contains(needle))
}

/// One-line summary of what the context knows
pub fn context_summary(raw: &RawContext) -> String {
    let mut parts = Vec::new();

    if let Some(payload) = json_of(raw, GET_ENTITIES) {
        let names = entity_names(payload);
        if !names.is_empty() {
            parts.push(format!("Available entities: {}", names.join(", ")));
        }
    }

    if let Some(payload) = json_of(raw, GET_CONTROLLERS) {
        let names = controller_names(payload);
        if !names.is_empty() {
            parts.push(format!("Existing controllers: {}", names.join(", ")));
        }
    }

    if let Some(result) = raw.get(GET_ROUTES) {
        let count = result
            .json()
            .and_then(|v| v.get("routes"))
            .and_then(|r| r.as_array())
            .map(|r| r.len());
        parts.push(match count {
            Some(n) => format!("Route structure analyzed ({} routes)", n),
            None => "Route structure analyzed".to_string(),
        });
    }

    parts.join(". ")
}

fn collect_string_leaves<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_string_leaves(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_string_leaves(v, out)),
        _ => {}
    }
}

/// File paths mentioned anywhere in the included payloads
pub fn relevant_files(raw: &RawContext, suffixes: &[String]) -> BTreeSet<String> {
    let is_source = |s: &str| suffixes.iter().any(|suffix| s.ends_with(suffix.as_str()));
    let mut files = BTreeSet::new();

    for payload in raw.values().filter_map(|r| r.payload.as_ref()) {
        match payload {
            ToolPayload::Json(value) => {
                let mut leaves = Vec::new();
                collect_string_leaves(value, &mut leaves);
                files.extend(leaves.into_iter().filter(|s| is_source(*s)).map(String::from));
            }
            ToolPayload::Text(text) => {
                for line in text.lines() {
                    let line = line
                        .trim()
                        .trim_start_matches("=== ")
                        .trim_end_matches(" ===");
                    if !line.is_empty() && !line.contains(char::is_whitespace) && is_source(line) {
                        files.insert(line.to_string());
                    }
                }
            }
        }
    }

    files
}

fn has_mvc(raw: &RawContext) -> bool {
    let controllers = json_of(raw, GET_CONTROLLERS)
        .map(|v| !controller_names(v).is_empty())
        .unwrap_or(false);
    let models = json_of(raw, GET_ENTITIES)
        .map(|v| !entity_names(v).is_empty())
        .unwrap_or(false);
    let routes = raw.contains_key(GET_ROUTES);
    controllers && (models || routes)
}

fn has_repositories(raw: &RawContext) -> bool {
    analysis_section(raw, &["patterns", "repository"]).is_some()
        || any_payload_contains(raw, "Repository")
}

fn has_service_layer(raw: &RawContext) -> bool {
    analysis_section(raw, &["patterns", "services"]).is_some()
        || any_payload_contains(raw, "src/Service/")
        || any_payload_contains(raw, "App\\Service")
}

fn framework_version(raw: &RawContext) -> Option<Value> {
    analysis_section(raw, &["project_info", "framework_version"]).cloned()
}

fn required_bundles(raw: &RawContext) -> Option<Value> {
    let architecture = analysis_section(raw, &["architecture"])?.as_object()?;
    let bundles: Vec<&str> = [
        ("security", "SecurityBundle"),
        ("database", "DoctrineBundle"),
        ("forms", "Form component"),
        ("api", "Serializer"),
        ("templating", "TwigBundle"),
    ]
    .iter()
    .filter(|(section, _)| architecture.contains_key(*section))
    .map(|(_, bundle)| *bundle)
    .collect();
    (!bundles.is_empty()).then(|| json!(bundles))
}

fn security_requirements(raw: &RawContext) -> Option<Value> {
    let roles: Vec<&str> = json_of(raw, GET_USER_ROLES)
        .and_then(|v| v.get("roles"))
        .and_then(|r| r.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|r| r.get("name").and_then(|n| n.as_str()))
                .collect()
        })
        .unwrap_or_default();
    if !roles.is_empty() {
        return Some(json!(roles));
    }
    analysis_section(raw, &["architecture", "security", "authorization"]).map(|a| json!([a]))
}

/// Pluggable pattern and constraint detection
pub struct ContextStructurer {
    patterns: Vec<(String, PatternDetector)>,
    constraints: Vec<(String, ConstraintDetector)>,
}

impl Default for ContextStructurer {
    fn default() -> Self {
        Self::empty()
            .with_pattern("mvc_pattern", has_mvc)
            .with_pattern("repository_pattern", has_repositories)
            .with_pattern("service_layer", has_service_layer)
            .with_constraint("framework_version", framework_version)
            .with_constraint("required_bundles", required_bundles)
            .with_constraint("security_requirements", security_requirements)
    }
}

impl ContextStructurer {
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn with_pattern<F>(mut self, name: &str, detector: F) -> Self
    where
        F: Fn(&RawContext) -> bool + Send + Sync + 'static,
    {
        self.patterns.push((name.to_string(), Box::new(detector)));
        self
    }

    pub fn with_constraint<F>(mut self, name: &str, detector: F) -> Self
    where
        F: Fn(&RawContext) -> Option<Value> + Send + Sync + 'static,
    {
        self.constraints.push((name.to_string(), Box::new(detector)));
        self
    }

    /// Every detector's verdict; nothing at all for an empty context
    pub fn patterns(&self, raw: &RawContext) -> BTreeMap<String, bool> {
        if raw.is_empty() {
            return BTreeMap::new();
        }
        self.patterns
            .iter()
            .map(|(name, detect)| (name.clone(), detect(raw)))
            .collect()
    }

    /// Only constraints a detector could establish
    pub fn constraints(&self, raw: &RawContext) -> BTreeMap<String, Value> {
        self.constraints
            .iter()
            .filter_map(|(name, detect)| detect(raw).map(|v| (name.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::error::EvalResult;
    use crate::mcp::{ToolContext, ToolDescriptor, ToolExecutor, ToolRegistry};
    use std::path::PathBuf;

    struct Fixed(&'static str, ToolPayload);

    impl ToolExecutor for Fixed {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: self.0.into(),
                description: String::new(),
                input_schema: json!({}),
            }
        }

        fn call(&self, _ctx: &ToolContext, _args: &Value) -> EvalResult<ToolPayload> {
            Ok(self.1.clone())
        }
    }

    fn raw_context(tools: Vec<Fixed>) -> RawContext {
        let ctx = ToolContext::new(PathBuf::from("."), ProjectConfig::default());
        let mut registry = ToolRegistry::new(ctx);
        let names: Vec<&str> = tools.iter().map(|t| t.0).collect();
        for tool in tools {
            registry.register(Box::new(tool));
        }
        names
            .into_iter()
            .map(|n| (n.to_string(), registry.invoke(n, &json!({}))))
            .collect()
    }

    fn blog_context() -> RawContext {
        raw_context(vec![
            Fixed(
                GET_ENTITIES,
                ToolPayload::Json(json!({"entities": [
                    {"name": "Post", "file": "src/Entity/Post.php"},
                    {"name": "Comment", "file": "src/Entity/Comment.php"}
                ]})),
            ),
            Fixed(
                GET_CONTROLLERS,
                ToolPayload::Json(json!({"controllers": [
                    {"name": "BlogController", "file": "src/Controller/BlogController.php", "actions": ["index"]}
                ]})),
            ),
            Fixed(
                GET_ROUTES,
                ToolPayload::Json(json!({"route_files": ["config/routes.yaml"], "routes": [
                    {"name": "blog_index", "path": "/blog"},
                    {"name": "blog_show", "path": "/blog/{slug}"}
                ]})),
            ),
        ])
    }

    #[test]
    fn test_summary_mentions_entities_controllers_routes() {
        let summary = context_summary(&blog_context());
        assert_eq!(
            summary,
            "Available entities: Post, Comment. Existing controllers: BlogController. Route structure analyzed (2 routes)"
        );
    }

    #[test]
    fn test_summary_empty_context() {
        assert_eq!(context_summary(&RawContext::new()), "");
    }

    #[test]
    fn test_relevant_files_from_json_and_text() {
        let mut raw = blog_context();
        raw.extend(raw_context(vec![Fixed(
            "Get File Content",
            ToolPayload::Text(
                "=== src/Service/Mailer.php ===\n<?php\nnamespace App\\Service;".into(),
            ),
        )]));

        let files = relevant_files(&raw, &[".php".to_string()]);
        let files: Vec<_> = files.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            files,
            vec![
                "src/Controller/BlogController.php",
                "src/Entity/Comment.php",
                "src/Entity/Post.php",
                "src/Service/Mailer.php",
            ]
        );
    }

    #[test]
    fn test_default_patterns() {
        let structurer = ContextStructurer::default();
        let patterns = structurer.patterns(&blog_context());
        assert_eq!(patterns["mvc_pattern"], true);
        assert_eq!(patterns["repository_pattern"], false);
        assert_eq!(patterns["service_layer"], false);
        assert!(structurer.patterns(&RawContext::new()).is_empty());
    }

    #[test]
    fn test_constraints_from_analysis_and_roles() {
        let raw = raw_context(vec![
            Fixed(
                GET_CONTEXTUAL_CODE_ANALYSIS,
                ToolPayload::Json(json!({
                    "project_info": {"framework_version": "7.1.*"},
                    "architecture": {"security": {}, "database": {"driver": "SQLITE"}}
                })),
            ),
            Fixed(
                GET_USER_ROLES,
                ToolPayload::Json(json!({"roles": [{"name": "ROLE_ADMIN", "description": ""}]})),
            ),
        ]);

        let constraints = ContextStructurer::default().constraints(&raw);
        assert_eq!(constraints["framework_version"], json!("7.1.*"));
        assert_eq!(
            constraints["required_bundles"],
            json!(["SecurityBundle", "DoctrineBundle"])
        );
        assert_eq!(constraints["security_requirements"], json!(["ROLE_ADMIN"]));
    }

    #[test]
    fn test_custom_detectors() {
        let structurer = ContextStructurer::empty()
            .with_pattern("always", |_| true)
            .with_constraint("fixed", |_| Some(json!(1)));
        let raw = blog_context();
        assert_eq!(structurer.patterns(&raw).len(), 1);
        assert_eq!(structurer.constraints(&raw)["fixed"], json!(1));
    }
}
