//! Scoring of generated code, with and without project context.
//!
//! Every category score is clamped to [0, 1] and rounded to three decimals.
//! Blank content scores zero everywhere. The composite for one side is the
//! mean of quality, compliance, correctness and utilization, with
//! utilization fixed at zero for the vanilla side.

pub mod basic;
pub mod compliance;
pub mod correctness;
pub mod quality;
pub mod utilization;

pub use basic::{basic_metrics, calculate_improvement, BasicMetrics};
pub use compliance::{assess_framework_compliance, ComplianceCheck, FrameworkCompliance};
pub use correctness::{assess_functional_correctness, FunctionalCorrectness};
pub use quality::{assess_code_quality, CodeQuality, Level};
pub use utilization::{analyze_context_utilization, ContextRelevance, ContextUtilization};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::generation::GenerationResponse;
use crate::scenario::Scenario;

/// Vanilla composites at or below this leave the improvement percentage undefined
pub const DEFAULT_IMPROVEMENT_EPSILON: f64 = 0.05;

pub(crate) fn is_blank(content: &str) -> bool {
    content.trim().is_empty()
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    normalize(values.iter().sum::<f64>() / values.len() as f64)
}

/// Clamp to [0, 1] and round to three decimals. NaN and infinities become 0.
pub(crate) fn normalize(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    (score.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

fn round3(value: f64) -> f64 {
    if value.is_finite() {
        (value * 1000.0).round() / 1000.0
    } else {
        0.0
    }
}

/// One category, scored for both sides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paired<T> {
    pub context: T,
    pub vanilla: T,
    /// context score minus vanilla score
    pub improvement: f64,
}

impl<T> Paired<T> {
    fn new(context: T, vanilla: T, score: impl Fn(&T) -> f64) -> Self {
        let improvement = round3(score(&context) - score(&vanilla));
        Self {
            context,
            vanilla,
            improvement,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    pub context_score: f64,
    pub vanilla_score: f64,
    pub improvement: f64,
    pub improvement_percentage: f64,
    /// False when the vanilla score was too small to divide by
    pub improvement_percentage_defined: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub scenario_id: String,
    pub basic: BasicMetrics,
    pub code_quality: Paired<CodeQuality>,
    pub context_utilization: ContextUtilization,
    pub compliance: Paired<FrameworkCompliance>,
    pub correctness: Paired<FunctionalCorrectness>,
    pub overall: OverallScore,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn quality_improvement(&self) -> f64 {
        self.code_quality.improvement
    }

    pub fn compliance_improvement(&self) -> f64 {
        self.compliance.improvement
    }

    pub fn correctness_improvement(&self) -> f64 {
        self.correctness.improvement
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    improvement_epsilon: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            improvement_epsilon: DEFAULT_IMPROVEMENT_EPSILON,
        }
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epsilon(improvement_epsilon: f64) -> Self {
        Self {
            improvement_epsilon,
        }
    }

    pub fn evaluate(
        &self,
        scenario: &Scenario,
        context_response: &GenerationResponse,
        vanilla_response: &GenerationResponse,
    ) -> EvaluationResult {
        let ctx = &context_response.content;
        let van = &vanilla_response.content;

        let code_quality = Paired::new(
            assess_code_quality(ctx),
            assess_code_quality(van),
            CodeQuality::score,
        );
        let compliance = Paired::new(
            assess_framework_compliance(ctx),
            assess_framework_compliance(van),
            FrameworkCompliance::score,
        );
        let correctness = Paired::new(
            assess_functional_correctness(ctx, scenario),
            assess_functional_correctness(van, scenario),
            FunctionalCorrectness::score,
        );
        let context_utilization =
            analyze_context_utilization(ctx, context_response.context.as_ref(), scenario);

        let context_score = mean(&[
            code_quality.context.score(),
            compliance.context.score(),
            correctness.context.score(),
            context_utilization.utilization_score,
        ]);
        let vanilla_score = mean(&[
            code_quality.vanilla.score(),
            compliance.vanilla.score(),
            correctness.vanilla.score(),
            0.0,
        ]);
        let overall = self.overall(context_score, vanilla_score);

        debug!(
            "{}: quality {:+.3}, compliance {:+.3}, correctness {:+.3}, utilization {:.3}",
            scenario.id,
            code_quality.improvement,
            compliance.improvement,
            correctness.improvement,
            context_utilization.utilization_score
        );
        info!(
            "Evaluated {}: context {:.3} vs vanilla {:.3}",
            scenario.id, context_score, vanilla_score
        );

        EvaluationResult {
            scenario_id: scenario.id.clone(),
            basic: basic_metrics(context_response, vanilla_response),
            code_quality,
            context_utilization,
            compliance,
            correctness,
            overall,
            evaluated_at: Utc::now(),
        }
    }

    fn overall(&self, context_score: f64, vanilla_score: f64) -> OverallScore {
        let improvement = round3(context_score - vanilla_score);
        let defined = vanilla_score > self.improvement_epsilon;
        let improvement_percentage = if defined {
            (improvement / vanilla_score * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };

        OverallScore {
            context_score,
            vanilla_score,
            improvement,
            improvement_percentage,
            improvement_percentage_defined: defined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::TaskType;

    fn response(content: &str, used_context: bool) -> GenerationResponse {
        let mut r = GenerationResponse::degraded("", 1.0, used_context, None);
        r.raw_metadata.clear();
        r.content = content.to_string();
        r
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(f64::NAN), 0.0);
        assert_eq!(normalize(f64::INFINITY), 0.0);
        assert_eq!(normalize(-0.2), 0.0);
        assert_eq!(normalize(1.7), 1.0);
        assert_eq!(normalize(0.12345), 0.123);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_blank_both_sides() {
        let scenario = Scenario::new("s", "Create a controller", TaskType::Controller);
        let result = Evaluator::new().evaluate(&scenario, &response("", true), &response("   ", false));
        assert_eq!(result.overall.context_score, 0.0);
        assert_eq!(result.overall.vanilla_score, 0.0);
        assert_eq!(result.overall.improvement, 0.0);
        assert_eq!(result.overall.improvement_percentage, 0.0);
        assert!(!result.overall.improvement_percentage_defined);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let code = r#"<?php
namespace App\Controller;

class PostController extends AbstractController
{
    #[Route('/post', name: 'post_index')]
    public function index(PostRepository $posts): Response
    {
        return $this->render('post/index.html.twig', ['posts' => $posts->findAll()]);
    }
}
"#;
        let scenario = Scenario::new("s", "Create a controller", TaskType::Controller)
            .with_criteria(vec!["index".into()]);
        let result = Evaluator::new().evaluate(&scenario, &response(code, true), &response("echo 1;", false));
        for score in [result.overall.context_score, result.overall.vanilla_score] {
            assert!((0.0..=1.0).contains(&score));
        }
        assert!(result.overall.improvement > 0.0);
        assert!(result.quality_improvement().is_finite());
        assert!(result.compliance_improvement() > 0.0);
    }

    #[test]
    fn test_percentage_uses_vanilla_baseline() {
        let overall = Evaluator::new().overall(0.6, 0.4);
        assert_eq!(overall.improvement, 0.2);
        assert_eq!(overall.improvement_percentage, 50.0);
        assert!(overall.improvement_percentage_defined);

        let tiny = Evaluator::with_epsilon(0.05).overall(0.5, 0.05);
        assert!(!tiny.improvement_percentage_defined);
        assert_eq!(tiny.improvement_percentage, 0.0);
    }
}
