//! Evaluation scenarios and their TOML source.

pub mod runner;

pub use runner::{ScenarioReport, ScenarioRunner};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::error::{EvalError, EvalResult};

/// Kind of code a scenario asks for. Names are case-insensitive and
/// unrecognized ones read as `General`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Controller,
    Entity,
    Api,
    Service,
    #[default]
    General,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Controller => "controller",
            TaskType::Entity => "entity",
            TaskType::Api => "api",
            TaskType::Service => "service",
            TaskType::General => "general",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "controller" => TaskType::Controller,
            "entity" => TaskType::Entity,
            "api" => TaskType::Api,
            "service" => TaskType::Service,
            _ => TaskType::General,
        })
    }
}

impl<'de> Deserialize<'de> for TaskType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(name.parse().unwrap_or_default())
    }
}

fn default_category() -> String {
    "general".into()
}

fn default_complexity() -> String {
    "medium".into()
}

/// One scenario record as written in the source file
#[derive(Debug, Clone, Deserialize)]
struct ScenarioRecord {
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    task_type: TaskType,
    #[serde(default)]
    relevant_tools: Vec<String>,
    #[serde(default)]
    expected_files: Vec<String>,
    #[serde(default)]
    evaluation_criteria: Vec<String>,
    #[serde(default = "default_complexity", alias = "complexity_level")]
    complexity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub category: String,
    pub prompt: String,
    pub task_type: TaskType,
    pub relevant_tools: Vec<String>,
    /// Informational only
    pub expected_files: Vec<String>,
    pub evaluation_criteria: Vec<String>,
    pub complexity: String,
}

impl Scenario {
    /// Ad-hoc scenario with defaults for everything but the prompt
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            category: default_category(),
            prompt: prompt.into(),
            task_type,
            relevant_tools: Vec::new(),
            expected_files: Vec::new(),
            evaluation_criteria: Vec::new(),
            complexity: default_complexity(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.relevant_tools = tools;
        self
    }

    pub fn with_criteria(mut self, criteria: Vec<String>) -> Self {
        self.evaluation_criteria = criteria;
        self
    }

    fn from_record(id: String, record: ScenarioRecord) -> Self {
        Self {
            id,
            category: record.category,
            prompt: record.prompt,
            task_type: record.task_type,
            relevant_tools: record.relevant_tools,
            expected_files: record.expected_files,
            evaluation_criteria: record.evaluation_criteria,
            complexity: record.complexity,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    scenarios: BTreeMap<String, ScenarioRecord>,
}

/// Scenarios keyed by id, iterated in key order
#[derive(Debug, Clone, Default)]
pub struct ScenarioRepository {
    scenarios: BTreeMap<String, Scenario>,
}

impl ScenarioRepository {
    pub fn from_toml_str(contents: &str) -> EvalResult<Self> {
        let file: ScenarioFile =
            toml::from_str(contents).map_err(|e| EvalError::Config(e.to_string()))?;
        let scenarios = file
            .scenarios
            .into_iter()
            .map(|(id, record)| (id.clone(), Scenario::from_record(id, record)))
            .collect();
        Ok(Self { scenarios })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenarios from {}", path.display()))?;
        let repository = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded {} scenarios from {}", repository.len(), path.display());
        Ok(repository)
    }

    pub fn from_scenarios(scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        Self {
            scenarios: scenarios.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn all(&self) -> Vec<&Scenario> {
        self.scenarios.values().collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&Scenario> {
        self.scenarios
            .values()
            .filter(|s| s.category == category)
            .collect()
    }

    pub fn by_key(&self, key: &str) -> Option<&Scenario> {
        self.scenarios.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[scenarios.controller_crud]
category = "controller"
prompt = "Create a CRUD controller for BlogPost"
task_type = "controller"
relevant_tools = ["Get Entities", "Get Routes"]
evaluation_criteria = ["index", "show"]

[scenarios.like_entity]
category = "entity"
prompt = "Create a Like entity"
task_type = "entity"
complexity_level = "high"

[scenarios.bare]
prompt = "Something else"
task_type = "form"
"#;

    #[test]
    fn test_parse_scenarios() {
        let repo = ScenarioRepository::from_toml_str(SAMPLE).unwrap();
        assert_eq!(repo.len(), 3);

        let crud = repo.by_key("controller_crud").unwrap();
        assert_eq!(crud.id, "controller_crud");
        assert_eq!(crud.task_type, TaskType::Controller);
        assert_eq!(crud.relevant_tools, vec!["Get Entities", "Get Routes"]);
        assert_eq!(crud.complexity, "medium");

        assert_eq!(repo.by_key("like_entity").unwrap().complexity, "high");
    }

    #[test]
    fn test_defaults_and_unknown_task_type() {
        let repo = ScenarioRepository::from_toml_str(SAMPLE).unwrap();
        let bare = repo.by_key("bare").unwrap();
        assert_eq!(bare.category, "general");
        assert_eq!(bare.task_type, TaskType::General);
        assert!(bare.evaluation_criteria.is_empty());
    }

    #[test]
    fn test_by_category() {
        let repo = ScenarioRepository::from_toml_str(SAMPLE).unwrap();
        let ids: Vec<_> = repo.by_category("entity").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["like_entity"]);
        assert!(repo.by_category("missing").is_empty());
        assert!(repo.by_key("missing").is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ScenarioRepository::from_toml_str("[scenarios.x\nprompt =").unwrap_err();
        assert!(matches!(err, EvalError::Config(_)));
    }

    #[test]
    fn test_task_type_names_ignore_case() {
        let repo = ScenarioRepository::from_toml_str(
            "[scenarios.shouty]\nprompt = \"x\"\ntask_type = \"Controller\"\n",
        )
        .unwrap();
        assert_eq!(repo.by_key("shouty").unwrap().task_type, TaskType::Controller);

        let parsed: TaskType = serde_json::from_str("\" SERVICE \"").unwrap();
        assert_eq!(parsed, TaskType::Service);
        assert_eq!(serde_json::to_string(&TaskType::Api).unwrap(), "\"api\"");
    }

    #[test]
    fn test_task_type_from_str() {
        assert_eq!("API".parse::<TaskType>().unwrap(), TaskType::Api);
        assert_eq!("form".parse::<TaskType>().unwrap(), TaskType::General);
        assert_eq!(TaskType::Service.to_string(), "service");
    }
}
