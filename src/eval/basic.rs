use serde::{Deserialize, Serialize};

use crate::generation::GenerationResponse;

/// Raw differences between the two conditions. These may be negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicMetrics {
    pub response_time_diff: f64,
    pub token_count_diff: i64,
    pub content_length_diff: i64,
    /// Percent faster the contextual answer was, relative to vanilla
    pub response_time_improvement: f64,
}

/// Percentage change from `before` to `after`, lower is better. 0 when `before` is 0.
pub fn calculate_improvement(before: f64, after: f64) -> f64 {
    if before == 0.0 || !before.is_finite() || !after.is_finite() {
        return 0.0;
    }
    (((before - after) / before) * 100.0 * 100.0).round() / 100.0
}

pub fn basic_metrics(context: &GenerationResponse, vanilla: &GenerationResponse) -> BasicMetrics {
    BasicMetrics {
        response_time_diff: context.response_time - vanilla.response_time,
        token_count_diff: context.token_count as i64 - vanilla.token_count as i64,
        content_length_diff: context.content.len() as i64 - vanilla.content.len() as i64,
        response_time_improvement: calculate_improvement(
            vanilla.response_time,
            context.response_time,
        ),
    }
}
