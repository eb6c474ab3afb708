//! Prompt-driven context collection.
//!
//! A prompt is assessed for information needs, the needs select tools, the tools
//! run in dependency order, and the results are ranked and admitted under a token
//! budget before being summarized into a [`ContextBundle`].

pub mod budget;
pub mod needs;
pub mod plan;
pub mod structure;

pub use budget::{filter_by_relevance, BudgetOutcome};
pub use needs::{assess_needs, extract_entity_names, Need, NeedAssessment, Priority};
pub use plan::{execution_order, select_relevant_tools, SelectedTool};
pub use structure::{context_summary, relevant_files, ContextStructurer, RawContext};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ContextConfig;
use crate::mcp::names::{GET_CONTROLLERS, GET_ENTITIES, GET_FILE_CONTENT};
use crate::mcp::{normalize_tool_name, ToolInvocationResult, ToolRegistry};
use crate::scenario::TaskType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: usize,
    pub tools_executed: usize,
    pub tools_included: usize,
    /// included / executed, 0 when nothing ran
    pub efficiency_ratio: f64,
}

/// Everything the prompt builder gets to know about the project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub context_summary: String,
    pub relevant_files: BTreeSet<String>,
    pub architectural_patterns: BTreeMap<String, bool>,
    pub constraints: BTreeMap<String, Value>,
    pub raw_context: RawContext,
    pub token_usage: TokenUsage,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.raw_context.is_empty()
    }
}

pub struct ContextCollector {
    registry: Arc<ToolRegistry>,
    config: ContextConfig,
    structurer: ContextStructurer,
}

impl ContextCollector {
    pub fn new(registry: Arc<ToolRegistry>, config: ContextConfig) -> Self {
        Self {
            registry,
            config,
            structurer: ContextStructurer::default(),
        }
    }

    /// Replace the pattern and constraint detectors
    pub fn with_structurer(mut self, structurer: ContextStructurer) -> Self {
        self.structurer = structurer;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Assess, select, execute, filter and structure. Never fails; with nothing
    /// collected the bundle is simply empty.
    pub fn collect_smart_context(
        &self,
        prompt: &str,
        task_type: TaskType,
        explicit_tools: &[String],
    ) -> ContextBundle {
        let needs = assess_needs(prompt);
        debug!("Needs for {} task: {:?}", task_type, needs.categories());

        let selection = select_relevant_tools(&needs, explicit_tools, &self.config.need_tools);
        let names: Vec<String> = selection.into_iter().map(|t| t.name).collect();

        let results = self.execute_with_dependencies(&names);
        let outcome = filter_by_relevance(&results, &needs, self.config.token_budget);

        let tools_executed = results.len();
        let tools_included = outcome.included.len();
        let raw_context: RawContext = outcome
            .included
            .into_iter()
            .map(|r| (r.tool_name.clone(), r))
            .collect();

        let source_extensions = &self.registry.context().project.source_extensions;
        let bundle = ContextBundle {
            context_summary: context_summary(&raw_context),
            relevant_files: relevant_files(&raw_context, source_extensions),
            architectural_patterns: self.structurer.patterns(&raw_context),
            constraints: self.structurer.constraints(&raw_context),
            token_usage: TokenUsage {
                total_tokens: outcome.total_tokens,
                tools_executed,
                tools_included,
                efficiency_ratio: if tools_executed > 0 {
                    tools_included as f64 / tools_executed as f64
                } else {
                    0.0
                },
            },
            raw_context,
        };

        info!(
            "Collected context: {}/{} tools included, {} tokens",
            tools_included, tools_executed, bundle.token_usage.total_tokens
        );
        bundle
    }

    /// Run each selected tool once, prerequisites first. Results come back in selection order.
    fn execute_with_dependencies(&self, names: &[String]) -> Vec<ToolInvocationResult> {
        let order = execution_order(names, &self.config.dependencies);
        let mut slots: Vec<Option<ToolInvocationResult>> = vec![None; names.len()];
        let mut done: HashMap<String, ToolInvocationResult> = HashMap::new();

        for position in order {
            let name = &names[position];
            let args = self.build_tool_arguments(name, &done);
            let result = self.registry.invoke(name, &args);
            done.insert(normalize_tool_name(name), result.clone());
            slots[position] = Some(result);
        }

        slots.into_iter().flatten().collect()
    }

    /// Arguments a tool derives from what already ran
    fn build_tool_arguments(
        &self,
        tool: &str,
        done: &HashMap<String, ToolInvocationResult>,
    ) -> Value {
        if normalize_tool_name(tool) != normalize_tool_name(GET_FILE_CONTENT) {
            return json!({});
        }

        let mut paths: Vec<String> = Vec::new();
        for (source, list_key) in [(GET_ENTITIES, "entities"), (GET_CONTROLLERS, "controllers")] {
            let Some(payload) = done
                .get(&normalize_tool_name(source))
                .filter(|r| r.success)
                .and_then(|r| r.json())
            else {
                continue;
            };
            let files = payload
                .get(list_key)
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
                .filter_map(|item| item.get("file").and_then(|f| f.as_str()));
            for file in files {
                if paths.len() >= self.config.max_dependent_files {
                    break;
                }
                paths.push(file.to_string());
            }
        }

        debug!("Derived {} file paths for {}", paths.len(), tool);
        json!({ "paths": paths })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::mcp::ToolContext;
    use std::fs;
    use std::path::Path;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn collector(root: &Path) -> ContextCollector {
        let ctx = ToolContext::new(root.canonicalize().unwrap(), ProjectConfig::default());
        ContextCollector::new(
            Arc::new(ToolRegistry::with_defaults(ctx)),
            ContextConfig::default(),
        )
    }

    fn blog_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "src/Entity/Post.php",
            "<?php\nnamespace App\\Entity;\n\nclass Post\n{\n    private ?int $id = null;\n    private string $title;\n}\n",
        );
        write(
            dir.path(),
            "src/Controller/BlogController.php",
            "<?php\nnamespace App\\Controller;\n\nclass BlogController\n{\n    #[Route('/blog', name: 'blog_index')]\n    public function index(): Response {}\n}\n",
        );
        dir
    }

    #[test]
    fn test_dependent_file_content_uses_prior_results() {
        let dir = blog_project();
        let collector = collector(dir.path());
        let explicit = vec!["Get File Content".to_string()];

        let bundle = collector.collect_smart_context("show each entity", TaskType::Entity, &explicit);

        let content = &bundle.raw_context[GET_FILE_CONTENT];
        let entities = &bundle.raw_context[GET_ENTITIES];
        assert!(content.success);
        assert!(entities.sequence < content.sequence);
        assert!(content.payload.as_ref().unwrap().render().contains("class Post"));
        assert!(bundle.relevant_files.contains("src/Entity/Post.php"));
    }

    #[test]
    fn test_hello_runs_only_explicit_tools() {
        let dir = blog_project();
        let collector = collector(dir.path());
        let explicit = vec!["Get Controllers".to_string()];

        let bundle = collector.collect_smart_context("hello", TaskType::General, &explicit);
        assert_eq!(bundle.token_usage.tools_executed, 1);
        assert_eq!(bundle.context_summary, "Existing controllers: BlogController");
        assert_eq!(bundle.token_usage.efficiency_ratio, 1.0);
    }

    #[test]
    fn test_nothing_selected_yields_empty_bundle() {
        let dir = blog_project();
        let bundle = collector(dir.path()).collect_smart_context("hello", TaskType::General, &[]);
        assert!(bundle.is_empty());
        assert_eq!(bundle.context_summary, "");
        assert!(bundle.architectural_patterns.is_empty());
        assert_eq!(bundle.token_usage, TokenUsage::default());
    }

    #[test]
    fn test_repeated_spelling_still_waits_for_prerequisites() {
        let dir = blog_project();
        let explicit = vec![
            "Get File Content".to_string(),
            "GetFileContent".to_string(),
            "Get Entities".to_string(),
        ];
        let bundle = collector(dir.path()).collect_smart_context("hello", TaskType::General, &explicit);

        assert_eq!(bundle.token_usage.tools_executed, 2);
        let content = &bundle.raw_context[GET_FILE_CONTENT];
        let entities = &bundle.raw_context[GET_ENTITIES];
        assert!(content.success);
        assert!(entities.sequence < content.sequence);
        assert!(content.payload.as_ref().unwrap().render().contains("class Post"));
    }

    #[test]
    fn test_unknown_explicit_tool_is_executed_but_excluded() {
        let dir = blog_project();
        let explicit = vec!["Drop Tables".to_string()];
        let bundle = collector(dir.path()).collect_smart_context("hello", TaskType::General, &explicit);
        assert_eq!(bundle.token_usage.tools_executed, 1);
        assert_eq!(bundle.token_usage.tools_included, 0);
        assert_eq!(bundle.token_usage.efficiency_ratio, 0.0);
    }
}
