//! Bridge between prompts and the code-generating model.

pub mod ollama;

pub use ollama::OllamaClient;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::GenerationConfig;
use crate::context::{ContextBundle, ContextCollector};
use crate::error::EvalResult;
use crate::mcp::estimate_tokens;
use crate::prompt::PromptBuilder;
use crate::scenario::Scenario;

/// A model endpoint. Returns the raw JSON object the server answered with.
pub trait ModelClient: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &Map<String, Value>,
    ) -> EvalResult<Map<String, Value>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub content: String,
    pub used_context: bool,
    /// Seconds
    pub response_time: f64,
    pub token_count: usize,
    pub context: Option<ContextBundle>,
    pub raw_metadata: Map<String, Value>,
}

impl GenerationResponse {
    /// Normalize a server reply, estimating whatever it left out
    pub fn from_raw(
        raw: Map<String, Value>,
        elapsed_secs: f64,
        used_context: bool,
        context: Option<ContextBundle>,
    ) -> Self {
        let content = raw
            .get("response")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();
        let token_count = raw
            .get("eval_count")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or_else(|| estimate_tokens(&content));
        let response_time = raw
            .get("total_duration")
            .and_then(|v| v.as_f64())
            .map(|ns| ns / 1e9)
            .unwrap_or(elapsed_secs);

        Self {
            content,
            used_context,
            response_time,
            token_count,
            context,
            raw_metadata: raw,
        }
    }

    /// Stand-in for a call that never produced a reply
    pub fn degraded(
        error: &str,
        elapsed_secs: f64,
        used_context: bool,
        context: Option<ContextBundle>,
    ) -> Self {
        let mut raw_metadata = Map::new();
        raw_metadata.insert("error".into(), json!(error));
        Self {
            content: String::new(),
            used_context,
            response_time: elapsed_secs,
            token_count: 0,
            context,
            raw_metadata,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.raw_metadata.contains_key("error")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDiff {
    pub response_time_diff: f64,
    pub token_count_diff: i64,
    pub length_diff: i64,
    pub used_context: bool,
    pub timestamp: DateTime<Utc>,
}

impl ResponseDiff {
    pub fn between(with_context: &GenerationResponse, vanilla: &GenerationResponse) -> Self {
        Self {
            response_time_diff: with_context.response_time - vanilla.response_time,
            token_count_diff: with_context.token_count as i64 - vanilla.token_count as i64,
            length_diff: with_context.content.len() as i64 - vanilla.content.len() as i64,
            used_context: with_context.used_context,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub context_response: GenerationResponse,
    pub vanilla_response: GenerationResponse,
    pub diff: ResponseDiff,
}

pub struct GenerationBridge<C: ModelClient> {
    client: C,
    collector: Arc<ContextCollector>,
    prompts: PromptBuilder,
    config: GenerationConfig,
}

impl<C: ModelClient> GenerationBridge<C> {
    pub fn new(
        client: C,
        collector: Arc<ContextCollector>,
        prompts: PromptBuilder,
        config: GenerationConfig,
    ) -> Self {
        Self {
            client,
            collector,
            prompts,
            config,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn collector(&self) -> &ContextCollector {
        &self.collector
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// One model call. Transport problems come back as a degraded response.
    pub async fn generate(
        &self,
        prompt: &str,
        used_context: bool,
        context: Option<ContextBundle>,
    ) -> GenerationResponse {
        let started = Instant::now();
        let outcome = self
            .client
            .generate(&self.config.model, prompt, &self.config.options)
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(raw) => GenerationResponse::from_raw(raw, elapsed, used_context, context),
            Err(e) => {
                warn!("Generation failed after {:.1}s: {}", elapsed, e);
                GenerationResponse::degraded(&e.to_string(), elapsed, used_context, context)
            }
        }
    }

    pub async fn query_with_context(&self, scenario: &Scenario) -> GenerationResponse {
        let bundle = self.collector.collect_smart_context(
            &scenario.prompt,
            scenario.task_type,
            &scenario.relevant_tools,
        );
        let prompt =
            self.prompts
                .build_contextual_prompt(&scenario.prompt, &bundle, scenario.task_type);
        self.generate(&prompt, true, Some(bundle)).await
    }

    pub async fn query_without_context(&self, scenario: &Scenario) -> GenerationResponse {
        let prompt = self
            .prompts
            .build_vanilla_prompt(&scenario.prompt, scenario.task_type);
        self.generate(&prompt, false, None).await
    }

    /// Both conditions, one after the other
    pub async fn compare_responses(&self, scenario: &Scenario) -> Comparison {
        let context_response = self.query_with_context(scenario).await;
        let vanilla_response = self.query_without_context(scenario).await;
        let diff = ResponseDiff::between(&context_response, &vanilla_response);
        info!(
            "Compared {}: {:+.2}s, {:+} tokens",
            scenario.id, diff.response_time_diff, diff.token_count_diff
        );
        Comparison {
            context_response,
            vanilla_response,
            diff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_prefers_server_fields() {
        let raw = json!({
            "response": "  <?php\necho 1;\n ",
            "eval_count": 42,
            "total_duration": 2_500_000_000u64
        });
        let response =
            GenerationResponse::from_raw(raw.as_object().unwrap().clone(), 9.0, true, None);
        assert_eq!(response.content, "<?php\necho 1;");
        assert_eq!(response.token_count, 42);
        assert!((response.response_time - 2.5).abs() < 1e-9);
        assert!(!response.is_degraded());
    }

    #[test]
    fn test_from_raw_estimates_missing_fields() {
        let raw = json!({ "response": "abcdefghijkl" });
        let response =
            GenerationResponse::from_raw(raw.as_object().unwrap().clone(), 1.25, false, None);
        assert_eq!(response.token_count, 3);
        assert_eq!(response.response_time, 1.25);
    }

    #[test]
    fn test_degraded_response() {
        let response = GenerationResponse::degraded("connection refused", 0.5, true, None);
        assert!(response.is_degraded());
        assert_eq!(response.content, "");
        assert_eq!(response.raw_metadata["error"], "connection refused");
    }

    #[test]
    fn test_response_diff() {
        let a = GenerationResponse::degraded("x", 3.0, true, None);
        let mut b = GenerationResponse::degraded("y", 1.0, false, None);
        b.content = "vanilla".into();
        b.token_count = 5;
        let diff = ResponseDiff::between(&a, &b);
        assert_eq!(diff.response_time_diff, 2.0);
        assert_eq!(diff.token_count_diff, -5);
        assert_eq!(diff.length_diff, -7);
        assert!(diff.used_context);
    }
}
