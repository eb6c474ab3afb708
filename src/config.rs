use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Runtime-resolved paths and settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Detected workspace root (holds .context-eval/)
    pub project_root: PathBuf,
    /// Workspace-local directory: {project_root}/.context-eval/
    pub config_dir: PathBuf,
    /// Canonical root of the project the tools introspect
    pub target_root: PathBuf,
    /// Scenario definitions file
    pub scenarios_path: PathBuf,
    /// Parsed config file settings
    pub settings: ConfigFile,
}

/// Parsed from .context-eval/config.toml (all fields have defaults)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub project: ProjectConfig,
    pub context: ContextConfig,
    pub generation: GenerationConfig,
    pub scenarios: ScenariosConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Introspected project, relative to the workspace root
    pub root: PathBuf,
    /// Suffixes that mark a string as a relevant source file
    pub source_extensions: Vec<String>,
    /// File extensions scanned by Search Code
    pub search_extensions: Vec<String>,
    /// Directory names skipped by every walker
    pub exclude: Vec<String>,
    pub max_search_results: usize,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            source_extensions: vec![".php".into()],
            search_extensions: vec![
                "php".into(),
                "yaml".into(),
                "twig".into(),
                "json".into(),
                "xml".into(),
                "env".into(),
            ],
            exclude: vec![
                "vendor".into(),
                "var".into(),
                "node_modules".into(),
                ".git".into(),
                ".context-eval".into(),
            ],
            max_search_results: 50,
        }
    }
}

/// Declarative tables driving tool selection and ordering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Token-unit budget for the included raw context (1 unit ~ 4 chars)
    pub token_budget: usize,
    /// Files fetched by a dependent Get File Content call
    pub max_dependent_files: usize,
    /// need category -> tools satisfying it
    pub need_tools: BTreeMap<String, Vec<String>>,
    /// tool -> prerequisite tools
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: 8000,
            max_dependent_files: 3,
            need_tools: default_need_tools(),
            dependencies: default_dependencies(),
        }
    }
}

fn table(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

pub fn default_need_tools() -> BTreeMap<String, Vec<String>> {
    table(&[
        ("entities", &["Get Entities", "Get File Content"]),
        ("controllers", &["Get Controllers", "Get Routes"]),
        ("routes", &["Get Routes"]),
        ("security", &["Get User Roles", "Get File Content"]),
        ("crud_patterns", &["Get Controllers", "Get Entities", "Get Routes"]),
        ("specific_entities", &["Get Entities", "Get File Content"]),
    ])
}

pub fn default_dependencies() -> BTreeMap<String, Vec<String>> {
    table(&[
        ("Get File Content", &["Get Entities", "Get Controllers"]),
        (
            "Get Contextual Code Analysis",
            &["Get Entities", "Get Controllers", "Get Routes"],
        ),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Passed through verbatim as the request's option map
    pub options: Map<String, Value>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "deepseek-coder:6.7b".into(),
            timeout_secs: 720,
            options: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenariosConfig {
    /// Relative to the workspace root
    pub path: PathBuf,
}

impl Default for ScenariosConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("scenarios.toml"),
        }
    }
}

const DEFAULT_CONFIG_TOML: &str = r#"# context-eval configuration

[project]
# Project introspected by the tools, relative to this workspace
root = "."
source_extensions = [".php"]
search_extensions = ["php", "yaml", "twig", "json", "xml", "env"]
exclude = ["vendor", "var", "node_modules", ".git", ".context-eval"]
max_search_results = 50

[context]
# Token units (about 4 characters each) available to raw context
token_budget = 8000
max_dependent_files = 3

[context.need_tools]
entities = ["Get Entities", "Get File Content"]
controllers = ["Get Controllers", "Get Routes"]
routes = ["Get Routes"]
security = ["Get User Roles", "Get File Content"]
crud_patterns = ["Get Controllers", "Get Entities", "Get Routes"]
specific_entities = ["Get Entities", "Get File Content"]

[context.dependencies]
"Get File Content" = ["Get Entities", "Get Controllers"]
"Get Contextual Code Analysis" = ["Get Entities", "Get Controllers", "Get Routes"]

[generation]
base_url = "http://localhost:11434"
model = "deepseek-coder:6.7b"
timeout_secs = 720

[scenarios]
path = "scenarios.toml"
"#;

const CONFIG_DIR_NAME: &str = ".context-eval";

impl Config {
    /// Detect configuration from the current directory
    pub fn detect() -> Result<Self> {
        Self::from_path(&std::env::current_dir()?)
    }

    /// Create configuration from a specific path
    pub fn from_path(start_path: &Path) -> Result<Self> {
        let project_root = Self::find_project_root(start_path)?;
        let config_dir = project_root.join(CONFIG_DIR_NAME);
        let settings = Self::load_config_file(&config_dir);
        Self::with_settings(project_root, settings)
    }

    /// Build from an explicit root and settings, skipping file discovery
    pub fn with_settings(project_root: PathBuf, settings: ConfigFile) -> Result<Self> {
        let config_dir = project_root.join(CONFIG_DIR_NAME);
        let target = project_root.join(&settings.project.root);
        let target_root = target
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", target.display()))?;
        let scenarios_path = project_root.join(&settings.scenarios.path);

        Ok(Self {
            project_root,
            config_dir,
            target_root,
            scenarios_path,
            settings,
        })
    }

    /// Point the tools at a different project, keeping other settings
    pub fn with_target(mut self, target: &Path) -> Result<Self> {
        self.target_root = target
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", target.display()))?;
        Ok(self)
    }

    /// Load config.toml from the workspace, then the user config dir, falling back to defaults
    fn load_config_file(config_dir: &Path) -> ConfigFile {
        let mut candidates = vec![config_dir.join("config.toml")];
        if let Some(user_dir) = dirs::config_dir() {
            candidates.push(user_dir.join("context-eval").join("config.toml"));
        }

        for config_path in candidates {
            if !config_path.is_file() {
                continue;
            }
            match std::fs::read_to_string(&config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => {
                        warn!("Failed to parse {}: {}", config_path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Failed to read {}: {}", config_path.display(), e);
                }
            }
        }
        ConfigFile::default()
    }

    /// Find the workspace root by walking up from start path
    ///
    /// Looks for:
    /// 1. .context-eval directory
    /// 2. .git directory
    /// 3. Falls back to start path if nothing found
    fn find_project_root(start_path: &Path) -> Result<PathBuf> {
        let start = start_path
            .canonicalize()
            .with_context(|| format!("Start path not found: {}", start_path.display()))?;
        let mut current = start.clone();

        loop {
            if current.join(CONFIG_DIR_NAME).is_dir() || current.join(".git").is_dir() {
                return Ok(current);
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok(start),
            }
        }
    }

    /// Ensure .context-eval/ exists, writing a default config on first run
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)
            .context("Failed to create .context-eval directory")?;

        let config_path = self.config_dir.join("config.toml");
        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_CONFIG_TOML)
                .context("Failed to write default config.toml")?;
            info!("Created .context-eval/config.toml with defaults");
        }

        Ok(())
    }
}
