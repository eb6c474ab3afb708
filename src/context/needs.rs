use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Medium,
    High,
}

impl Priority {
    /// Relevance contribution of a need whose name appears in a tool name
    pub fn weight(self) -> u32 {
        match self {
            Priority::High => 10,
            Priority::Medium => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Need {
    pub priority: Priority,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
}

/// Detected information needs keyed by category, in detection order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeedAssessment {
    needs: Vec<(String, Need)>,
}

impl NeedAssessment {
    pub fn is_empty(&self) -> bool {
        self.needs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.needs.len()
    }

    pub fn get(&self, category: &str) -> Option<&Need> {
        self.needs
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, need)| need)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.get(category).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Need)> {
        self.needs.iter().map(|(name, need)| (name.as_str(), need))
    }

    pub fn categories(&self) -> Vec<&str> {
        self.needs.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn insert(&mut self, category: &str, need: Need) {
        match self.needs.iter_mut().find(|(name, _)| name == category) {
            Some((_, existing)) => *existing = need,
            None => self.needs.push((category.to_string(), need)),
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, Need> {
        self.needs.iter().cloned().collect()
    }

    /// Sum of need weights whose category name occurs in the tool name (case-insensitive)
    pub fn relevance_score(&self, tool_name: &str) -> u32 {
        let tool = tool_name.to_lowercase();
        self.needs
            .iter()
            .filter(|(name, _)| tool.contains(&name.to_lowercase()))
            .map(|(_, need)| need.priority.weight())
            .sum()
    }
}

struct Detector {
    pattern: Regex,
    emits: &'static [(&'static str, Priority, &'static str)],
    extract_entities: bool,
}

static DETECTORS: Lazy<Vec<Detector>> = Lazy::new(|| {
    vec![
        Detector {
            pattern: Regex::new(r"\b(entity|entities|model|database)\b").unwrap(),
            emits: &[("entities", Priority::High, "Entity references detected")],
            extract_entities: false,
        },
        Detector {
            pattern: Regex::new(r"\b(controller|route|endpoint|api)\b").unwrap(),
            emits: &[
                ("controllers", Priority::High, "Controller/routing references"),
                ("routes", Priority::High, "Route structure needed"),
            ],
            extract_entities: false,
        },
        Detector {
            pattern: Regex::new(r"\b(blog|post|user|product|category)\b").unwrap(),
            emits: &[(
                "specific_entities",
                Priority::High,
                "Specific domain entities mentioned",
            )],
            extract_entities: true,
        },
        Detector {
            pattern: Regex::new(r"\b(crud|create|update|delete|list|manage)\b").unwrap(),
            emits: &[("crud_patterns", Priority::Medium, "CRUD operations mentioned")],
            extract_entities: false,
        },
        Detector {
            pattern: Regex::new(r"\b(auth|login|security|permission|role)\b").unwrap(),
            emits: &[("security", Priority::High, "Security context needed")],
            extract_entities: false,
        },
    ]
});

static ENTITY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-zA-Z]*(?:Post|User|Product|Category|Entity))\b").unwrap()
});

/// Proper-noun-like entity names, read from the original-case prompt
pub fn extract_entity_names(prompt: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in ENTITY_NAME_RE.captures_iter(prompt) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Run every detector over the lower-cased prompt. Detectors never short-circuit each other.
pub fn assess_needs(prompt: &str) -> NeedAssessment {
    let lowered = prompt.to_lowercase();
    let mut assessment = NeedAssessment::default();

    for detector in DETECTORS.iter() {
        if !detector.pattern.is_match(&lowered) {
            continue;
        }
        let entities = if detector.extract_entities {
            extract_entity_names(prompt)
        } else {
            Vec::new()
        };
        for (category, priority, rationale) in detector.emits {
            assessment.insert(
                category,
                Need {
                    priority: *priority,
                    rationale: rationale.to_string(),
                    entities: entities.clone(),
                },
            );
        }
    }

    assessment
}
