use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

use super::entities::analyze_entity;
use crate::error::{EvalError, EvalResult};
use crate::mcp::paths::walk_files;
use crate::mcp::protocol::ToolDescriptor;
use crate::mcp::tools::{ToolContext, ToolExecutor, ToolPayload};

static ASSERT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:#\[|@)Assert\\(\w+)").unwrap());

static USER_PROVIDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)entity:.*?class:\s*([A-Za-z\\]+)").unwrap());

static DRIVER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)driver:\s*pdo_(\w+)").unwrap());

static ROLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ROLE_\w+").unwrap());

static REPO_METHOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"public\s+function\s+(\w+)").unwrap());

/// (pattern, inferred purpose), matched case-insensitively against entity source
static PURPOSE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)getAuthor|setAuthor|author.*User", "Has authorship/ownership concept"),
        (r"(?i)publishedAt|published|status.*publish", "Has publication/status workflow"),
        (r"(?i)email.*unique|UniqueEntity.*email", "Email uniqueness required"),
        (r"(?i)slug", "Uses slugs for URL generation"),
        (r"(?i)createdAt|updatedAt|timestamp", "Has timestamp tracking"),
    ]
    .into_iter()
    .map(|(p, label)| (Regex::new(p).unwrap(), label))
    .collect()
});

fn read_composer(root: &Path) -> Option<Value> {
    let raw = std::fs::read_to_string(root.join("composer.json")).ok()?;
    serde_json::from_str(&raw).ok()
}

fn dependency_names(composer: &Value) -> BTreeSet<String> {
    ["require", "require-dev"]
        .iter()
        .filter_map(|section| composer.get(*section).and_then(|s| s.as_object()))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

fn project_type(deps: &BTreeSet<String>) -> &'static str {
    if deps.contains("api-platform/core") || deps.contains("symfony/serializer") {
        "API Platform / REST API"
    } else if deps.contains("symfony/twig-bundle") && deps.contains("symfony/form") {
        "Full-stack web application"
    } else if deps.contains("symfony/console") && !deps.contains("symfony/twig-bundle") {
        "Console application"
    } else if deps.contains("symfony/http-kernel") && deps.len() < 10 {
        "Microservice / Minimal application"
    } else {
        "Web application"
    }
}

fn project_info(composer: Option<&Value>) -> Map<String, Value> {
    let mut info = Map::new();
    let Some(composer) = composer else {
        return info;
    };

    let require = composer.get("require");
    if let Some(v) = require.and_then(|r| r.get("symfony/framework-bundle")) {
        info.insert("framework_version".into(), v.clone());
    }
    if let Some(v) = require.and_then(|r| r.get("php")) {
        info.insert("php_version".into(), v.clone());
    }
    for key in ["name", "description"] {
        if let Some(v) = composer.get(key) {
            let field = if key == "name" { "project_name" } else { key };
            info.insert(field.into(), v.clone());
        }
    }
    info.insert(
        "project_type".into(),
        json!(project_type(&dependency_names(composer))),
    );
    info
}

fn php_files(dir: &Path, suffix: &str) -> Vec<std::path::PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(suffix))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn entities_section(root: &Path) -> EvalResult<Map<String, Value>> {
    let mut entities = Map::new();

    for path in php_files(&root.join("src/Entity"), ".php") {
        let source = std::fs::read_to_string(&path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let analysis = analyze_entity(&source);

        let properties: BTreeSet<_> = analysis
            .properties
            .iter()
            .map(|p| p.name.clone())
            .chain(analysis.relationships.iter().map(|r| r.property.clone()))
            .filter(|p| p != "id")
            .collect();
        let relationships: Vec<_> = analysis
            .relationships
            .iter()
            .map(|r| format!("{} ({})", r.target_entity, r.kind))
            .collect();

        if properties.is_empty() && relationships.is_empty() {
            continue;
        }

        let mut data = Map::new();
        data.insert("properties".into(), json!(properties));
        data.insert("relationships".into(), json!(relationships));

        let validation: BTreeSet<_> = ASSERT_RE
            .captures_iter(&source)
            .map(|c| c[1].to_string())
            .collect();
        if !validation.is_empty() {
            data.insert("validation".into(), json!(validation));
        }

        let purpose: Vec<_> = PURPOSE_RULES
            .iter()
            .filter(|(re, _)| re.is_match(&source))
            .map(|(_, label)| *label)
            .collect();
        if !purpose.is_empty() {
            data.insert("inferred_purpose".into(), json!(purpose));
        }

        entities.insert(name, Value::Object(data));
    }

    Ok(entities)
}

fn security_setup(root: &Path) -> Option<Value> {
    let content = std::fs::read_to_string(root.join("config/packages/security.yaml")).ok()?;
    let mut info = Map::new();

    let auth = if content.contains("form_login") {
        Some("Form login")
    } else if content.contains("json_login") {
        Some("JSON login (API)")
    } else if content.contains("http_basic") {
        Some("HTTP Basic")
    } else {
        None
    };
    if let Some(auth) = auth {
        info.insert("authentication".into(), json!(auth));
    }

    if let Some(caps) = USER_PROVIDER_RE.captures(&content) {
        let class = caps[1].rsplit('\\').next().unwrap_or(&caps[1]).to_string();
        info.insert("user_provider".into(), json!(format!("Doctrine entity ({})", class)));
    }

    if content.contains("role_hierarchy") {
        info.insert("authorization".into(), json!("Role-based with hierarchy"));
    } else {
        let roles: BTreeSet<_> = ROLE_RE.find_iter(&content).map(|m| m.as_str()).collect();
        if !roles.is_empty() {
            let joined = roles.into_iter().collect::<Vec<_>>().join(", ");
            info.insert("authorization".into(), json!(format!("Role-based ({})", joined)));
        }
    }

    (!info.is_empty()).then(|| Value::Object(info))
}

fn database_setup(root: &Path) -> Option<Value> {
    let content = std::fs::read_to_string(root.join("config/packages/doctrine.yaml")).ok()?;
    let mut info = Map::new();

    if let Some(caps) = DRIVER_RE.captures(&content) {
        info.insert("driver".into(), json!(caps[1].to_uppercase()));
    }
    let migrations = php_files(&root.join("migrations"), ".php").len();
    if migrations > 0 {
        info.insert(
            "migrations".into(),
            json!(format!("{} migration files", migrations)),
        );
    }

    (!info.is_empty()).then(|| Value::Object(info))
}

fn form_setup(root: &Path) -> Option<Value> {
    let forms = php_files(&root.join("src/Form"), "Type.php").len();
    (forms > 0).then(|| json!({ "form_classes": forms, "pattern": "FormType classes" }))
}

fn api_setup(deps: &BTreeSet<String>) -> Option<Value> {
    let mut info = Map::new();
    if deps.contains("api-platform/core") {
        info.insert("platform".into(), json!("API Platform"));
    }
    if deps.contains("jms/serializer-bundle") {
        info.insert("serialization".into(), json!("JMS Serializer"));
    } else if deps.contains("symfony/serializer") {
        info.insert("serialization".into(), json!("Symfony Serializer"));
    }
    (!info.is_empty()).then(|| Value::Object(info))
}

fn template_setup(root: &Path, exclude: &[String]) -> Option<Value> {
    let dir = root.join("templates");
    if !dir.is_dir() {
        return None;
    }
    let count = walk_files(root, &dir, exclude)
        .iter()
        .filter(|p| p.extension().map(|e| e == "twig").unwrap_or(false))
        .count();
    if count == 0 {
        return None;
    }
    let mut info = json!({ "template_count": count, "engine": "Twig" });
    if dir.join("base.html.twig").is_file() {
        info["inheritance"] = json!("Base template found");
    }
    Some(info)
}

fn patterns_section(root: &Path) -> Map<String, Value> {
    let mut patterns = Map::new();

    let repos = php_files(&root.join("src/Repository"), "Repository.php");
    if !repos.is_empty() {
        let custom: usize = repos
            .iter()
            .filter_map(|p| std::fs::read_to_string(p).ok())
            .map(|src| {
                REPO_METHOD_RE
                    .captures_iter(&src)
                    .filter(|c| {
                        let m = &c[1];
                        !m.starts_with("find") && m != "__construct" && m != "createQueryBuilder"
                    })
                    .count()
            })
            .sum();
        patterns.insert(
            "repository".into(),
            json!({
                "repository_count": repos.len(),
                "custom_methods": if custom > 0 { json!(custom) } else { json!("None detected") },
            }),
        );
    }

    let services = php_files(&root.join("src/Service"), ".php").len();
    if services > 0 {
        patterns.insert("services".into(), json!({ "service_classes": services }));
    }

    let listeners = php_files(&root.join("src/EventListener"), ".php").len();
    let subscribers = php_files(&root.join("src/EventSubscriber"), ".php").len();
    if listeners + subscribers > 0 {
        let mut events = Map::new();
        if listeners > 0 {
            events.insert("listeners".into(), json!(listeners));
        }
        if subscribers > 0 {
            events.insert("subscribers".into(), json!(subscribers));
        }
        patterns.insert("events".into(), Value::Object(events));
    }

    patterns
}

fn conventions_section(root: &Path) -> Map<String, Value> {
    let mut conventions = Map::new();
    let mut naming = Map::new();

    let entity_files = php_files(&root.join("src/Entity"), ".php");
    let pascal = |p: &std::path::PathBuf| {
        p.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.chars().next())
            .map(|c| c.is_ascii_uppercase())
            .unwrap_or(false)
    };
    if !entity_files.is_empty() && entity_files.iter().all(pascal) {
        naming.insert("entities".into(), json!("PascalCase"));
    }
    if !php_files(&root.join("src/Controller"), "Controller.php").is_empty() {
        naming.insert(
            "controllers".into(),
            json!("PascalCase with Controller suffix"),
        );
    }
    if !naming.is_empty() {
        conventions.insert("naming".into(), Value::Object(naming));
    }

    let quality_tools: Vec<_> = [
        (&[".php-cs-fixer.dist.php"][..], "PHP-CS-Fixer"),
        (&["phpstan.neon", "phpstan.neon.dist"][..], "PHPStan"),
        (&["rector.php"][..], "Rector"),
        (&["phpunit.xml.dist"][..], "PHPUnit"),
    ]
    .iter()
    .filter(|(files, _)| files.iter().any(|f| root.join(f).is_file()))
    .map(|(_, tool)| *tool)
    .collect();
    if !quality_tools.is_empty() {
        conventions.insert("code_quality".into(), json!(quality_tools));
    }

    conventions
}

pub struct GetContextualCodeAnalysis;

impl ToolExecutor for GetContextualCodeAnalysis {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "Get Contextual Code Analysis".into(),
            description: "Summarize project info, entities, architecture, patterns and conventions."
                .into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    fn call(&self, ctx: &ToolContext, _args: &Value) -> EvalResult<ToolPayload> {
        if !ctx.root.is_dir() {
            return Err(EvalError::ToolExecutionFailure(
                "Project root not found".into(),
            ));
        }

        let composer = read_composer(&ctx.root);
        let deps = composer.as_ref().map(dependency_names).unwrap_or_default();

        let mut architecture = Map::new();
        let sections = [
            ("security", security_setup(&ctx.root)),
            ("database", database_setup(&ctx.root)),
            ("forms", form_setup(&ctx.root)),
            ("api", api_setup(&deps)),
            ("templating", template_setup(&ctx.root, &ctx.project.exclude)),
        ];
        for (name, section) in sections {
            if let Some(section) = section {
                architecture.insert(name.into(), section);
            }
        }

        let mut result = Map::new();
        let parts = [
            ("project_info", project_info(composer.as_ref())),
            ("entities", entities_section(&ctx.root)?),
            ("architecture", architecture),
            ("patterns", patterns_section(&ctx.root)),
            ("conventions", conventions_section(&ctx.root)),
        ];
        for (name, part) in parts {
            if !part.is_empty() {
                result.insert(name.into(), Value::Object(part));
            }
        }

        Ok(ToolPayload::Json(Value::Object(result)))
    }
}
