//! Prompt rendering for the contextual and vanilla conditions.

pub mod templates;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::compress::truncate_chars;
use crate::context::ContextBundle;
use crate::scenario::TaskType;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Z][A-Z_]*)\}").unwrap());

const NO_CONSTRAINTS: &str = "No specific constraints detected.";
const NO_PATTERNS: &str = "Standard Symfony MVC pattern detected.";
const NO_DETECTED_PATTERNS: &str = "Standard patterns";
const NO_SUMMARY: &str = "No context available";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptOptions {
    pub include_examples: bool,
    pub include_raw_context: bool,
    /// Cap on each raw context entry, in characters
    pub max_context_chars: Option<usize>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            include_examples: true,
            include_raw_context: true,
            max_context_chars: Some(6000),
        }
    }
}

/// Replace every `{NAME}` in one pass; names without a value render empty
pub fn render(template: &str, values: &HashMap<&str, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn humanize(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn format_constraints(constraints: &BTreeMap<String, Value>) -> String {
    if constraints.is_empty() {
        return NO_CONSTRAINTS.to_string();
    }
    constraints
        .iter()
        .map(|(key, value)| format!("- {}: {}", humanize(key), value_text(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_patterns(patterns: &BTreeMap<String, bool>) -> String {
    if patterns.is_empty() {
        return NO_PATTERNS.to_string();
    }
    let detected: Vec<String> = patterns
        .iter()
        .filter(|(_, &on)| on)
        .map(|(name, _)| format!("✓ {}", humanize(name)))
        .collect();
    if detected.is_empty() {
        NO_DETECTED_PATTERNS.to_string()
    } else {
        detected.join("\n")
    }
}

pub fn format_context_data(bundle: &ContextBundle, options: &PromptOptions) -> String {
    let mut sections = Vec::new();

    if !bundle.relevant_files.is_empty() {
        let files: Vec<String> = bundle
            .relevant_files
            .iter()
            .map(|f| format!("- {}", f))
            .collect();
        sections.push(format!("## Relevant Files\n{}", files.join("\n")));
    }

    if options.include_raw_context {
        for (tool, result) in &bundle.raw_context {
            let Some(payload) = result.payload.as_ref().filter(|p| result.success && !p.is_empty())
            else {
                continue;
            };
            let rendered = payload.render();
            let body = match options.max_context_chars {
                Some(max) => truncate_chars(&rendered, max),
                None => rendered,
            };
            sections.push(format!("## {}", tool));
            sections.push(format!("```\n{}\n```", body));
        }
    }

    sections.join("\n\n")
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    options: PromptOptions,
}

impl PromptBuilder {
    pub fn new(options: PromptOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PromptOptions {
        &self.options
    }

    pub fn build_contextual_prompt(
        &self,
        user_prompt: &str,
        bundle: &ContextBundle,
        task_type: TaskType,
    ) -> String {
        self.build_contextual_prompt_with(user_prompt, bundle, task_type, &self.options)
    }

    pub fn build_contextual_prompt_with(
        &self,
        user_prompt: &str,
        bundle: &ContextBundle,
        task_type: TaskType,
        options: &PromptOptions,
    ) -> String {
        let summary = if bundle.context_summary.trim().is_empty() {
            NO_SUMMARY.to_string()
        } else {
            bundle.context_summary.clone()
        };
        let examples = if options.include_examples {
            templates::example_for(task_type).to_string()
        } else {
            String::new()
        };

        let mut values: HashMap<&str, String> = HashMap::new();
        values.insert("USER_PROMPT", user_prompt.to_string());
        values.insert("CONTEXT_SUMMARY", summary);
        values.insert("CONSTRAINTS", format_constraints(&bundle.constraints));
        values.insert("PATTERNS", format_patterns(&bundle.architectural_patterns));
        values.insert("EXAMPLES", examples);
        values.insert("CONTEXT_DATA", format_context_data(bundle, options));

        let prompt = render(templates::template_for(task_type), &values);
        debug!("Built {} prompt: {} chars", task_type, prompt.len());
        prompt
    }

    pub fn build_vanilla_prompt(&self, user_prompt: &str, task_type: TaskType) -> String {
        let mut values: HashMap<&str, String> = HashMap::new();
        values.insert("USER_PROMPT", user_prompt.to_string());
        let prompt = render(templates::VANILLA_TEMPLATE, &values);
        debug!("Built vanilla prompt for {} task: {} chars", task_type, prompt.len());
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle() -> ContextBundle {
        let mut bundle = ContextBundle {
            context_summary: "Available entities: Post".into(),
            ..Default::default()
        };
        bundle.relevant_files.insert("src/Entity/Post.php".into());
        bundle
            .constraints
            .insert("framework_version".into(), json!("7.1.*"));
        bundle
            .constraints
            .insert("required_bundles".into(), json!(["SecurityBundle", "TwigBundle"]));
        bundle.architectural_patterns.insert("mvc_pattern".into(), true);
        bundle
            .architectural_patterns
            .insert("service_layer".into(), false);
        bundle
    }

    #[test]
    fn test_controller_prompt_sections() {
        let prompt = PromptBuilder::default().build_contextual_prompt(
            "Create a CRUD controller for BlogPost",
            &bundle(),
            TaskType::Controller,
        );
        assert!(prompt.starts_with("You are a Symfony expert developer."));
        assert!(prompt.contains("## Your Task\nCreate a CRUD controller for BlogPost"));
        assert!(prompt.contains("- Framework version: 7.1.*"));
        assert!(prompt.contains("- Required bundles: SecurityBundle, TwigBundle"));
        assert!(prompt.contains("✓ Mvc pattern"));
        assert!(!prompt.contains("Service layer"));
        assert!(prompt.contains("## Relevant Files\n- src/Entity/Post.php"));
        assert!(prompt.contains("class BlogApiController"));
        assert!(prompt.ends_with("Generate the code now:"));
    }

    #[test]
    fn test_empty_bundle_sentinels() {
        let prompt = PromptBuilder::default().build_contextual_prompt(
            "Do it",
            &ContextBundle::default(),
            TaskType::Controller,
        );
        assert!(prompt.contains(NO_SUMMARY));
        assert!(prompt.contains(NO_CONSTRAINTS));
        assert!(prompt.contains(NO_PATTERNS));
        assert!(!PLACEHOLDER_RE.is_match(&prompt));
    }

    #[test]
    fn test_no_detected_patterns() {
        let mut patterns = BTreeMap::new();
        patterns.insert("mvc_pattern".to_string(), false);
        assert_eq!(format_patterns(&patterns), "Standard patterns");
    }

    #[test]
    fn test_user_prompt_is_not_re_expanded() {
        let prompt = PromptBuilder::default().build_contextual_prompt(
            "Explain {CONTEXT_SUMMARY} literally",
            &bundle(),
            TaskType::General,
        );
        assert!(prompt.contains("Explain {CONTEXT_SUMMARY} literally"));
    }

    #[test]
    fn test_unknown_placeholder_renders_empty() {
        let values = HashMap::new();
        assert_eq!(render("a{MISSING}b", &values), "ab");
    }

    #[test]
    fn test_general_has_no_examples() {
        let prompt = PromptBuilder::default().build_contextual_prompt(
            "Anything",
            &bundle(),
            TaskType::General,
        );
        assert!(!prompt.contains("```php"));
        assert!(prompt.ends_with("Generate the solution:"));
    }

    #[test]
    fn test_options_disable_examples_and_raw_context() {
        let options = PromptOptions {
            include_examples: false,
            include_raw_context: false,
            max_context_chars: None,
        };
        let prompt = PromptBuilder::new(options).build_contextual_prompt(
            "Build a service",
            &bundle(),
            TaskType::Service,
        );
        assert!(!prompt.contains("class BlogService"));
        assert!(prompt.contains("## Relevant Files"));
    }

    #[test]
    fn test_vanilla_prompt() {
        let prompt = PromptBuilder::default().build_vanilla_prompt("Make a form", TaskType::Entity);
        assert_eq!(
            prompt,
            "You are a Symfony expert developer.\n\n## Your Task\nMake a form\n\n## Requirements\n- Follow Symfony best practices\n- Write clean, maintainable code\n- Use proper error handling\n- Follow PSR standards\n\nGenerate the solution:"
        );
    }
}
