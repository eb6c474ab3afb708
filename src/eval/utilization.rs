//! How much of the supplied context shows up in the contextual answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{mean, normalize};
use crate::context::ContextBundle;
use crate::mcp::executors::entity_names;
use crate::mcp::names::{
    GET_CONTEXTUAL_CODE_ANALYSIS, GET_CONTROLLERS, GET_ENTITIES, GET_PROJECT_STRUCTURE,
    GET_ROUTES, GET_USER_ROLES,
};
use crate::scenario::{Scenario, TaskType};

const CONTROLLER_PATTERNS: [&str; 6] = ["index", "show", "create", "edit", "delete", "update"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityUsage {
    pub total_entities: usize,
    pub used_entities: Vec<String>,
    pub usage_count: usize,
    pub usage_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteUsage {
    pub total_routes: usize,
    pub used_routes: usize,
    pub usage_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerPatterns {
    pub detected_patterns: BTreeMap<String, bool>,
    pub pattern_coverage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextRelevance {
    pub score: f64,
    pub expected_contexts: Vec<String>,
    pub available_contexts: Vec<String>,
    pub is_relevant: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextUtilization {
    pub context_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<RouteUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller_patterns: Option<ControllerPatterns>,
    pub utilization_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_relevance: Option<ContextRelevance>,
}

fn contains_ignore_case(haystack_lower: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack_lower.contains(&needle.to_lowercase())
}

pub fn check_entity_usage(content: &str, entities: &Value) -> EntityUsage {
    let lower = content.to_lowercase();
    let names = entity_names(entities);
    let used: Vec<String> = names
        .iter()
        .filter(|n| contains_ignore_case(&lower, n))
        .cloned()
        .collect();

    EntityUsage {
        total_entities: names.len(),
        usage_count: used.len(),
        usage_ratio: if names.is_empty() {
            0.0
        } else {
            normalize(used.len() as f64 / names.len() as f64)
        },
        used_entities: used,
    }
}

pub fn check_route_usage(content: &str, routes: &Value) -> RouteUsage {
    let lower = content.to_lowercase();
    let routes: &[Value] = routes
        .get("routes")
        .and_then(|r| r.as_array())
        .map(|r| r.as_slice())
        .unwrap_or_default();

    let field = |route: &Value, key: &str| -> String {
        route
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let used = routes
        .iter()
        .filter(|route| {
            contains_ignore_case(&lower, &field(route, "name"))
                || contains_ignore_case(&lower, &field(route, "path"))
        })
        .count();

    RouteUsage {
        total_routes: routes.len(),
        used_routes: used,
        usage_ratio: if routes.is_empty() {
            0.0
        } else {
            normalize(used as f64 / routes.len() as f64)
        },
    }
}

pub fn check_controller_patterns(content: &str) -> ControllerPatterns {
    let lower = content.to_lowercase();
    let detected_patterns: BTreeMap<String, bool> = CONTROLLER_PATTERNS
        .iter()
        .map(|p| (p.to_string(), lower.contains(p)))
        .collect();
    let hits = detected_patterns.values().filter(|&&hit| hit).count();

    ControllerPatterns {
        detected_patterns,
        pattern_coverage: normalize(hits as f64 / CONTROLLER_PATTERNS.len() as f64),
    }
}

/// Tools whose output a task type is expected to draw on
pub fn expected_contexts(task_type: TaskType) -> &'static [&'static str] {
    match task_type {
        TaskType::Controller => &[GET_CONTROLLERS, GET_ROUTES],
        TaskType::Entity => &[GET_ENTITIES, GET_CONTEXTUAL_CODE_ANALYSIS],
        TaskType::Service => &[GET_CONTROLLERS, GET_PROJECT_STRUCTURE],
        TaskType::Api => &[GET_ROUTES, GET_CONTROLLERS, GET_USER_ROLES],
        TaskType::General => &[],
    }
}

/// Share of the expected tools that actually contributed; 0.5 without expectations
pub fn assess_context_relevance(bundle: &ContextBundle, scenario: &Scenario) -> ContextRelevance {
    let expected = expected_contexts(scenario.task_type);
    let available: Vec<String> = bundle.raw_context.keys().cloned().collect();

    let score = if expected.is_empty() {
        0.5
    } else {
        let present = expected
            .iter()
            .filter(|e| bundle.raw_context.contains_key(**e))
            .count();
        normalize(present as f64 / expected.len() as f64)
    };

    ContextRelevance {
        score,
        expected_contexts: expected.iter().map(|e| e.to_string()).collect(),
        available_contexts: available,
        is_relevant: score > 0.5,
    }
}

pub fn analyze_context_utilization(
    content: &str,
    bundle: Option<&ContextBundle>,
    scenario: &Scenario,
) -> ContextUtilization {
    let Some(bundle) = bundle else {
        return ContextUtilization::default();
    };

    let entities = bundle
        .raw_context
        .get(GET_ENTITIES)
        .and_then(|r| r.json())
        .map(|v| check_entity_usage(content, v));
    let routes = bundle
        .raw_context
        .get(GET_ROUTES)
        .and_then(|r| r.json())
        .map(|v| check_route_usage(content, v));
    let controller_patterns = bundle
        .raw_context
        .get(GET_CONTROLLERS)
        .map(|_| check_controller_patterns(content));

    let ratios: Vec<f64> = [
        entities.as_ref().map(|e| e.usage_ratio),
        routes.as_ref().map(|r| r.usage_ratio),
        controller_patterns.as_ref().map(|c| c.pattern_coverage),
    ]
    .into_iter()
    .flatten()
    .collect();

    ContextUtilization {
        context_used: !ratios.is_empty(),
        utilization_score: mean(&ratios),
        entities,
        routes,
        controller_patterns,
        context_relevance: Some(assess_context_relevance(bundle, scenario)),
    }
}
