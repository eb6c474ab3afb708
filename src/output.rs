use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::context::ContextBundle;
use crate::mcp::{ToolCallResult, ToolDescriptor};
use crate::scenario::ScenarioReport;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("Error serializing results to JSON: {}", e))
}

pub fn render_reports(reports: &[ScenarioReport], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(reports),
        OutputFormat::Plain => reports_plain(reports),
    }
}

fn reports_plain(reports: &[ScenarioReport]) -> String {
    if reports.is_empty() {
        return "No scenarios run.".to_string();
    }

    let mut out = String::new();
    for report in reports {
        let eval = &report.evaluation;
        let _ = writeln!(out, "=== {} ({}) ===", report.scenario.id, report.scenario.task_type);
        let _ = writeln!(out, "Prompt: {}", report.scenario.prompt);
        if report.degraded() {
            let _ = writeln!(out, "⚠ generation failed for at least one side");
        }
        let _ = writeln!(out, "{:<15} {:<8} {:<8} {:<8}", "Category", "Context", "Vanilla", "Delta");
        let _ = writeln!(out, "{}", "-".repeat(42));
        let rows = [
            ("quality", eval.code_quality.context.score(), eval.code_quality.vanilla.score(), eval.code_quality.improvement),
            ("compliance", eval.compliance.context.score(), eval.compliance.vanilla.score(), eval.compliance.improvement),
            ("correctness", eval.correctness.context.score(), eval.correctness.vanilla.score(), eval.correctness.improvement),
            ("utilization", eval.context_utilization.utilization_score, 0.0, eval.context_utilization.utilization_score),
            ("overall", eval.overall.context_score, eval.overall.vanilla_score, eval.overall.improvement),
        ];
        for (name, context, vanilla, delta) in rows {
            let _ = writeln!(out, "{:<15} {:<8.3} {:<8.3} {:<+8.3}", name, context, vanilla, delta);
        }
        let percentage = if eval.overall.improvement_percentage_defined {
            format!("{:+.2}%", eval.overall.improvement_percentage)
        } else {
            "n/a".to_string()
        };
        let _ = writeln!(
            out,
            "Improvement: {}  Time: {:.2}s vs {:.2}s  Tokens: {} vs {}",
            percentage,
            report.context_response.response_time,
            report.vanilla_response.response_time,
            report.context_response.token_count,
            report.vanilla_response.token_count
        );
        let _ = writeln!(out);
    }
    out.trim_end().to_string()
}

pub fn render_bundle(bundle: &ContextBundle, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return to_json(bundle);
    }

    let mut out = String::new();
    let summary = if bundle.context_summary.is_empty() {
        "(no context)"
    } else {
        &bundle.context_summary
    };
    let _ = writeln!(out, "Summary: {}", summary);
    let _ = writeln!(
        out,
        "Tokens: {} ({} of {} tools included, efficiency {:.2})",
        bundle.token_usage.total_tokens,
        bundle.token_usage.tools_included,
        bundle.token_usage.tools_executed,
        bundle.token_usage.efficiency_ratio
    );
    for (tool, result) in &bundle.raw_context {
        let marker = if result.truncated { " (truncated)" } else { "" };
        let _ = writeln!(out, "  • {}: {} tokens{}", tool, result.token_count, marker);
    }
    for file in &bundle.relevant_files {
        let _ = writeln!(out, "  - {}", file);
    }
    out.trim_end().to_string()
}

pub fn render_call_result(result: &ToolCallResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(result),
        OutputFormat::Plain if result.is_error => format!("Error: {}", result.result),
        OutputFormat::Plain => result.result.clone(),
    }
}

pub fn render_tools(tools: &[ToolDescriptor], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(tools),
        OutputFormat::Plain => tools
            .iter()
            .map(|t| format!("{:<30} {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_reports() {
        assert_eq!(render_reports(&[], OutputFormat::Plain), "No scenarios run.");
        assert_eq!(render_reports(&[], OutputFormat::Json), "[]");
    }

    #[test]
    fn test_bundle_plain() {
        let bundle = ContextBundle::default();
        let text = render_bundle(&bundle, OutputFormat::Plain);
        assert!(text.starts_with("Summary: (no context)"));
        assert!(text.contains("0 of 0 tools"));
    }

    #[test]
    fn test_call_result_formats() {
        let ok = ToolCallResult::json(&json!({"a": 1}));
        assert!(render_call_result(&ok, OutputFormat::Plain).contains("\"a\": 1"));
        let json = render_call_result(&ok, OutputFormat::Json);
        assert!(json.contains("\"isError\": false"));
    }

    #[test]
    fn test_tools_plain() {
        let tools = vec![ToolDescriptor {
            name: "Get Routes".into(),
            description: "List routes".into(),
            input_schema: json!({}),
        }];
        let text = render_tools(&tools, OutputFormat::Plain);
        assert!(text.starts_with("Get Routes"));
        assert!(text.ends_with("List routes"));
    }
}
