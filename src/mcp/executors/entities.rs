use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{EvalError, EvalResult};
use crate::mcp::paths::relative_display;
use crate::mcp::protocol::ToolDescriptor;
use crate::mcp::tools::{ToolContext, ToolExecutor, ToolPayload};

static PROPERTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:private|protected)\s+\??([\w\\]+)\s+\$(\w+)").unwrap());

static DECLARATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:private|protected|public)\s+(?:\??[\w\\]+\s+)?\$(\w+)").unwrap()
});

static RELATION_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:#\[ORM\\|@ORM\\)(OneToMany|ManyToOne|ManyToMany|OneToOne)\((.*?)\)(?:\]|\s|\*|$)")
        .unwrap()
});

static TARGET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"targetEntity\s*[:=]\s*["']?([A-Za-z_\\][\w\\]*)"#).unwrap());

static MAPPED_BY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:mappedBy|inversedBy)\s*[:=]\s*["'](\w+)["']"#).unwrap());

static TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:#\[ORM\\Table\(|@ORM\\Table\()\s*name\s*[:=]\s*["']([^"']+)["']"#).unwrap()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelationship {
    #[serde(rename = "type")]
    pub kind: String,
    pub property: String,
    pub target_entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_by: Option<String>,
}

/// Result of [`analyze_entity`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAnalysis {
    pub properties: Vec<EntityProperty>,
    pub relationships: Vec<EntityRelationship>,
    pub table: Option<String>,
}

/// Best-effort regex extraction of an ORM entity's fields, relations and table.
///
/// Collection-typed fields are reported as relationships only.
pub fn analyze_entity(source: &str) -> EntityAnalysis {
    let properties = PROPERTY_RE
        .captures_iter(source)
        .filter(|c| &c[1] != "Collection")
        .map(|c| EntityProperty {
            name: c[2].to_string(),
            kind: simplify_type(&c[1]),
        })
        .collect();

    let mut relationships = Vec::new();
    for caps in RELATION_ATTR_RE.captures_iter(source) {
        let (Some(whole), Some(kind), Some(args)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(target) = TARGET_RE.captures(args.as_str()) else {
            continue;
        };
        // The annotated property is the first declaration after the attribute
        let Some(property) = DECLARATION_RE.captures(&source[whole.end()..]) else {
            continue;
        };

        relationships.push(EntityRelationship {
            kind: kind.as_str().to_string(),
            property: property[1].to_string(),
            target_entity: short_name(&target[1]),
            mapped_by: MAPPED_BY_RE
                .captures(args.as_str())
                .map(|m| m[1].to_string()),
        });
    }

    let table = TABLE_RE.captures(source).map(|c| c[1].to_string());

    EntityAnalysis {
        properties,
        relationships,
        table,
    }
}

fn short_name(qualified: &str) -> String {
    qualified
        .rsplit('\\')
        .next()
        .unwrap_or(qualified)
        .to_string()
}

fn simplify_type(raw: &str) -> String {
    match short_name(raw).as_str() {
        "DateTimeImmutable" | "DateTime" | "DateTimeInterface" => "datetime".into(),
        other => other.to_string(),
    }
}

pub struct GetEntities;

impl ToolExecutor for GetEntities {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "Get Entities".into(),
            description: "List ORM entities with their properties, relationships and table names."
                .into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    fn call(&self, ctx: &ToolContext, _args: &Value) -> EvalResult<ToolPayload> {
        let entity_dir = ctx.root.join("src").join("Entity");
        if !entity_dir.is_dir() {
            return Err(EvalError::ToolExecutionFailure(format!(
                "Entity directory not found: {}",
                relative_display(&ctx.root, &entity_dir)
            )));
        }

        let mut files: Vec<_> = std::fs::read_dir(&entity_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().map(|x| x == "php").unwrap_or(false))
            .collect();
        files.sort();

        let mut entities = Vec::new();
        for path in files {
            let source = std::fs::read_to_string(&path)?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let analysis = analyze_entity(&source);

            entities.push(json!({
                "name": name,
                "file": relative_display(&ctx.root, &path),
                "table": analysis.table,
                "properties": analysis.properties,
                "relationships": analysis.relationships,
            }));
        }

        Ok(ToolPayload::Json(json!({ "entities": entities })))
    }
}

/// Entity names from a Get Entities payload
pub fn entity_names(payload: &Value) -> Vec<String> {
    payload
        .get("entities")
        .and_then(|e| e.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|e| e.get("name").and_then(|n| n.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST: &str = r#"<?php
namespace App\Entity;

#[ORM\Entity(repositoryClass: PostRepository::class)]
#[ORM\Table(name: 'symfony_demo_post')]
class Post
{
    #[ORM\Id]
    #[ORM\GeneratedValue]
    #[ORM\Column(type: Types::INTEGER)]
    private ?int $id = null;

    #[ORM\Column(type: Types::STRING)]
    private ?string $title = null;

    #[ORM\Column]
    private \DateTimeImmutable $publishedAt;

    #[ORM\ManyToOne(targetEntity: User::class)]
    #[ORM\JoinColumn(nullable: false)]
    private ?User $author = null;

    #[ORM\OneToMany(targetEntity: Comment::class, mappedBy: 'post', orphanRemoval: true, cascade: ['persist'])]
    #[ORM\OrderBy(['publishedAt' => 'DESC'])]
    private Collection $comments;

    #[ORM\ManyToMany(targetEntity: Tag::class, cascade: ['persist'])]
    #[ORM\JoinTable(name: 'symfony_demo_post_tag')]
    private Collection $tags;
}
"#;

    #[test]
    fn test_analyze_entity_properties() {
        let analysis = analyze_entity(POST);
        let names: Vec<_> = analysis.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "title", "publishedAt", "author"]);
        assert_eq!(analysis.properties[2].kind, "datetime");
        assert_eq!(analysis.properties[3].kind, "User");
    }

    #[test]
    fn test_analyze_entity_relationships() {
        let analysis = analyze_entity(POST);
        assert_eq!(analysis.relationships.len(), 3);

        let author = &analysis.relationships[0];
        assert_eq!(author.kind, "ManyToOne");
        assert_eq!(author.property, "author");
        assert_eq!(author.target_entity, "User");

        let comments = &analysis.relationships[1];
        assert_eq!(comments.kind, "OneToMany");
        assert_eq!(comments.property, "comments");
        assert_eq!(comments.mapped_by.as_deref(), Some("post"));

        assert_eq!(analysis.relationships[2].target_entity, "Tag");
        assert_eq!(analysis.relationships[2].property, "tags");
    }

    #[test]
    fn test_analyze_entity_table() {
        assert_eq!(
            analyze_entity(POST).table.as_deref(),
            Some("symfony_demo_post")
        );
        assert_eq!(analyze_entity("<?php class Bare {}").table, None);
    }

    #[test]
    fn test_legacy_annotations() {
        let source = r#"
/**
 * @ORM\Table(name="legacy_user")
 */
class User {
    /** @ORM\OneToMany(targetEntity="App\Entity\Post", mappedBy="author") */
    private $posts;
    private string $email;
}
"#;
        let analysis = analyze_entity(source);
        assert_eq!(analysis.table.as_deref(), Some("legacy_user"));
        assert_eq!(analysis.relationships.len(), 1);
        assert_eq!(analysis.relationships[0].target_entity, "Post");
        assert_eq!(analysis.relationships[0].property, "posts");
        assert_eq!(analysis.relationships[0].mapped_by.as_deref(), Some("author"));
        // untyped declarations are not reported as properties
        assert_eq!(analysis.properties.len(), 1);
        assert_eq!(analysis.properties[0].name, "email");
    }

    #[test]
    fn test_entity_names() {
        let payload = json!({"entities": [{"name": "Post"}, {"name": "User"}]});
        assert_eq!(entity_names(&payload), vec!["Post", "User"]);
        assert!(entity_names(&json!({})).is_empty());
    }
}
