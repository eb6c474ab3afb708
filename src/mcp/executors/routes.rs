use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_yaml::{Mapping, Value as YamlValue};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::EvalResult;
use crate::mcp::paths::{relative_display, walk_files};
use crate::mcp::protocol::ToolDescriptor;
use crate::mcp::tools::{ToolContext, ToolExecutor, ToolPayload};

static ROUTE_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\[Route\((.*?)\)\]|@Route\(([^)]*)\)").unwrap());

static LEADING_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\s*["']([^"']*)["']"#).unwrap());

static NAMED_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"path\s*[:=]\s*["']([^"']*)["']"#).unwrap());

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"name\s*[:=]\s*["']([^"']+)["']"#).unwrap());

static METHODS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"methods\s*[:=]\s*[\[{]([^\]}]*)[\]}]"#).unwrap());

static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']([^"']+)["']"#).unwrap());

static CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bclass\s+(\w+)").unwrap());

static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfunction\s+(\w+)").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub file: String,
}

struct RouteArgs {
    name: Option<String>,
    path: Option<String>,
    methods: Vec<String>,
}

fn parse_route_args(args: &str) -> RouteArgs {
    let path = LEADING_PATH_RE
        .captures(args)
        .or_else(|| NAMED_PATH_RE.captures(args))
        .map(|c| c[1].to_string());
    let name = NAME_RE.captures(args).map(|c| c[1].to_string());
    let methods = METHODS_RE
        .captures(args)
        .map(|c| {
            QUOTED_RE
                .captures_iter(&c[1])
                .map(|m| m[1].to_uppercase())
                .collect()
        })
        .unwrap_or_default();

    RouteArgs {
        name,
        path,
        methods,
    }
}

/// Routes declared with `#[Route]` attributes or `@Route` annotations.
///
/// A route placed before the class declaration is a prefix applied to every
/// method-level route in that class.
pub fn attribute_routes(source: &str, file: &str) -> Vec<RouteInfo> {
    let class_pos = CLASS_RE.find(source).map(|m| m.start()).unwrap_or(0);
    let class_name = CLASS_RE.captures(source).map(|c| c[1].to_string());

    let mut prefix_path = String::new();
    let mut prefix_name = String::new();
    let mut routes = Vec::new();

    for caps in ROUTE_ATTR_RE.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        let args = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        let parsed = parse_route_args(args);

        if whole.start() < class_pos {
            prefix_path = parsed.path.unwrap_or_default();
            prefix_name = parsed.name.unwrap_or_default();
            continue;
        }

        let action = FUNCTION_RE
            .captures(&source[whole.end()..])
            .map(|c| c[1].to_string());

        let path = parsed.path.map(|p| join_route_path(&prefix_path, &p));
        routes.push(RouteInfo {
            name: parsed.name.map(|n| format!("{}{}", prefix_name, n)),
            path: path.or_else(|| (!prefix_path.is_empty()).then(|| prefix_path.clone())),
            methods: parsed.methods,
            controller: match (&class_name, action) {
                (Some(class), Some(action)) => Some(format!("{}::{}", class, action)),
                (Some(class), None) => Some(class.clone()),
                _ => None,
            },
            resource: None,
            file: file.to_string(),
        });
    }

    routes
}

fn join_route_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    let prefix = prefix.trim_end_matches('/');
    if path.is_empty() || path == "/" {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            format!("{}/", prefix)
        }
    } else {
        format!("{}/{}", prefix, path.trim_start_matches('/'))
    }
}

fn yaml_str(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) if !s.is_empty() => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `GET|POST`, `[GET, POST]` or a block sequence
fn yaml_methods(value: &YamlValue) -> Vec<String> {
    let raw: Vec<String> = match value {
        YamlValue::Sequence(items) => items.iter().filter_map(yaml_str).collect(),
        other => yaml_str(other)
            .map(|s| s.split(|c| c == '|' || c == ',').map(str::to_string).collect())
            .unwrap_or_default(),
    };
    raw.into_iter()
        .map(|m| m.trim().to_uppercase())
        .filter(|m| !m.is_empty())
        .collect()
}

fn yaml_route(name: &str, entry: &Mapping, file: &str) -> RouteInfo {
    let field = |key: &str| entry.get(key);

    // localized routes map each locale to its own path; the first one stands in
    let path = field("path").and_then(|p| match p {
        YamlValue::Mapping(locales) => locales.values().find_map(yaml_str),
        other => yaml_str(other),
    });

    let controller = field("controller").and_then(yaml_str).or_else(|| {
        field("defaults")
            .and_then(|d| d.get("_controller"))
            .and_then(yaml_str)
    });

    let resource = field("resource").and_then(|r| match r {
        YamlValue::Mapping(m) => m.get("path").and_then(yaml_str),
        other => yaml_str(other),
    });

    RouteInfo {
        name: Some(name.to_string()),
        path,
        methods: field("methods").map(yaml_methods).unwrap_or_default(),
        controller,
        resource,
        file: file.to_string(),
    }
}

fn collect_yaml_routes(document: &Mapping, file: &str, routes: &mut Vec<RouteInfo>) {
    for (key, value) in document {
        let (Some(name), YamlValue::Mapping(entry)) = (key.as_str(), value) else {
            continue;
        };
        // `when@dev:` blocks hold routes for one environment
        if name.starts_with("when@") {
            collect_yaml_routes(entry, file, routes);
        } else {
            routes.push(yaml_route(name, entry, file));
        }
    }
}

/// Route entries from a YAML routing file, in document order.
///
/// Unreadable YAML is logged and yields no routes.
pub fn yaml_routes(source: &str, file: &str) -> Vec<RouteInfo> {
    let document = match serde_yaml::from_str::<YamlValue>(source) {
        Ok(YamlValue::Mapping(document)) => document,
        Ok(_) => return Vec::new(),
        Err(e) => {
            warn!("Skipping routing file {}: {}", file, e);
            return Vec::new();
        }
    };

    let mut routes = Vec::new();
    collect_yaml_routes(&document, file, &mut routes);
    routes
}

fn route_config_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = ["config/routes.yaml", "config/routes.yml"]
        .iter()
        .map(|f| root.join(f))
        .filter(|p| p.is_file())
        .collect();

    let routes_dir = root.join("config").join("routes");
    let pattern = format!(
        "{}/*.y*ml",
        glob::Pattern::escape(&routes_dir.to_string_lossy())
    );
    match glob::glob(&pattern) {
        Ok(paths) => {
            for entry in paths {
                match entry {
                    Ok(path) if path.is_file() => files.push(path),
                    Ok(_) => {}
                    Err(e) => warn!("Glob error: {}", e),
                }
            }
        }
        Err(e) => warn!("Invalid route glob {}: {}", pattern, e),
    }

    files
}

pub struct GetRoutes;

impl ToolExecutor for GetRoutes {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "Get Routes".into(),
            description: "Collect routes from routing config files and controller route attributes."
                .into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    fn call(&self, ctx: &ToolContext, _args: &Value) -> EvalResult<ToolPayload> {
        let mut route_files = Vec::new();
        let mut routes = Vec::new();

        for path in route_config_files(&ctx.root) {
            let rel = relative_display(&ctx.root, &path);
            let source = std::fs::read_to_string(&path)?;
            routes.extend(yaml_routes(&source, &rel));
            route_files.push(rel);
        }

        let controller_dir = ctx.root.join("src").join("Controller");
        if controller_dir.is_dir() {
            for path in walk_files(&ctx.root, &controller_dir, &ctx.project.exclude) {
                if path.extension().map(|e| e != "php").unwrap_or(true) {
                    continue;
                }
                let source = std::fs::read_to_string(&path)?;
                routes.extend(attribute_routes(&source, &relative_display(&ctx.root, &path)));
            }
        }

        Ok(ToolPayload::Json(json!({
            "route_files": route_files,
            "routes": routes,
        })))
    }
}
