use tracing::debug;

use super::needs::NeedAssessment;
use crate::compress::summarize_payload;
use crate::mcp::ToolInvocationResult;

/// Results that made it into the bundle, in relevance order
#[derive(Debug, Clone, Default)]
pub struct BudgetOutcome {
    pub included: Vec<ToolInvocationResult>,
    pub total_tokens: usize,
}

/// Rank `results` (given in selection order) by relevance and admit them under `budget`.
///
/// Failures are skipped. An entry too large for the remaining budget is summarized
/// and admitted only if the summary fits and still says something.
pub fn filter_by_relevance(
    results: &[ToolInvocationResult],
    needs: &NeedAssessment,
    budget: usize,
) -> BudgetOutcome {
    let mut ranked: Vec<&ToolInvocationResult> = results.iter().collect();
    // stable: equal scores keep selection order
    ranked.sort_by_key(|r| std::cmp::Reverse(needs.relevance_score(&r.tool_name)));

    let mut outcome = BudgetOutcome::default();

    for result in ranked {
        let Some(payload) = result.payload.as_ref().filter(|_| result.success) else {
            continue;
        };
        let remaining = budget.saturating_sub(outcome.total_tokens);

        if result.token_count <= remaining {
            outcome.total_tokens += result.token_count;
            outcome.included.push(result.clone());
            continue;
        }

        if remaining == 0 {
            debug!("Budget exhausted, dropping {}", result.tool_name);
            continue;
        }

        let compressed = summarize_payload(payload, remaining);
        if compressed.payload.is_empty() || compressed.compressed_tokens > remaining {
            debug!("Dropping {}: summary does not fit", result.tool_name);
            continue;
        }

        debug!(
            "Summarized {} from {} to {} tokens ({:.0}% smaller)",
            result.tool_name,
            compressed.original_tokens,
            compressed.compressed_tokens,
            compressed.reduction_percent()
        );
        let reduced = result.with_payload(compressed.payload);
        outcome.total_tokens += reduced.token_count;
        outcome.included.push(reduced);
    }

    outcome
}
