use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Scenario, ScenarioRepository};
use crate::error::{EvalError, EvalResult};
use crate::eval::{EvaluationResult, Evaluator};
use crate::generation::{GenerationBridge, GenerationResponse, ModelClient, ResponseDiff};

/// Outcome of one scenario: both answers and their evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub context_response: GenerationResponse,
    pub vanilla_response: GenerationResponse,
    pub diff: ResponseDiff,
    pub evaluation: EvaluationResult,
    pub started_at: DateTime<Utc>,
}

impl ScenarioReport {
    /// True when either model call failed
    pub fn degraded(&self) -> bool {
        self.context_response.is_degraded() || self.vanilla_response.is_degraded()
    }
}

pub struct ScenarioRunner<C: ModelClient> {
    bridge: GenerationBridge<C>,
    repository: ScenarioRepository,
    evaluator: Evaluator,
}

impl<C: ModelClient> ScenarioRunner<C> {
    pub fn new(bridge: GenerationBridge<C>, repository: ScenarioRepository) -> Self {
        Self {
            bridge,
            repository,
            evaluator: Evaluator::default(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn repository(&self) -> &ScenarioRepository {
        &self.repository
    }

    pub async fn run_all(&self) -> Vec<ScenarioReport> {
        self.run_each(self.repository.all()).await
    }

    /// Empty when no scenario has the category
    pub async fn run_by_category(&self, category: &str) -> Vec<ScenarioReport> {
        let scenarios = self.repository.by_category(category);
        if scenarios.is_empty() {
            warn!("No scenarios in category '{}'", category);
        }
        self.run_each(scenarios).await
    }

    pub async fn run_by_key(&self, key: &str) -> EvalResult<ScenarioReport> {
        let scenario = self
            .repository
            .by_key(key)
            .ok_or_else(|| EvalError::ScenarioNotFound(key.to_string()))?;
        Ok(self.run_scenario(scenario).await)
    }

    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioReport {
        let started_at = Utc::now();
        info!(
            "Running scenario {} ({}, {})",
            scenario.id, scenario.category, scenario.complexity
        );

        let comparison = self.bridge.compare_responses(scenario).await;
        let evaluation = self.evaluator.evaluate(
            scenario,
            &comparison.context_response,
            &comparison.vanilla_response,
        );

        ScenarioReport {
            scenario: scenario.clone(),
            context_response: comparison.context_response,
            vanilla_response: comparison.vanilla_response,
            diff: comparison.diff,
            evaluation,
            started_at,
        }
    }

    async fn run_each(&self, scenarios: Vec<&Scenario>) -> Vec<ScenarioReport> {
        let total = scenarios.len();
        let mut reports = Vec::with_capacity(total);
        for (i, scenario) in scenarios.into_iter().enumerate() {
            info!("[{}/{}] {}", i + 1, total, scenario.id);
            reports.push(self.run_scenario(scenario).await);
        }
        reports
    }
}
