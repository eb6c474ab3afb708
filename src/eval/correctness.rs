use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::quality::Level;
use super::{is_blank, mean, normalize};
use crate::scenario::Scenario;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementCoverage {
    pub requirements: Vec<String>,
    pub coverage_details: BTreeMap<String, bool>,
    pub coverage_ratio: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeCaseHandling {
    pub patterns_detected: BTreeMap<String, bool>,
    pub score: f64,
    pub coverage_level: Level,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorHandling {
    pub score: f64,
    pub uses_try_catch: bool,
    pub logs_errors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputValidation {
    pub score: f64,
    pub uses_validator: bool,
    pub sanitizes_input: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionalCorrectness {
    pub requirement_coverage: RequirementCoverage,
    pub edge_case_handling: EdgeCaseHandling,
    pub error_handling: ErrorHandling,
    pub input_validation: InputValidation,
    pub business_logic_accuracy: f64,
    pub api_contract_compliance: f64,
}

impl FunctionalCorrectness {
    pub fn score(&self) -> f64 {
        mean(&[
            self.requirement_coverage.score,
            self.edge_case_handling.score,
            self.error_handling.score,
            self.input_validation.score,
            self.business_logic_accuracy,
            self.api_contract_compliance,
        ])
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn check_requirement_coverage(code: &str, scenario: &Scenario) -> RequirementCoverage {
    let coverage_details: BTreeMap<String, bool> = scenario
        .evaluation_criteria
        .iter()
        .map(|req| (req.clone(), contains_ignore_case(code, req)))
        .collect();
    let covered = coverage_details.values().filter(|&&c| c).count();
    let ratio = if coverage_details.is_empty() {
        0.0
    } else {
        covered as f64 / coverage_details.len() as f64
    };

    RequirementCoverage {
        requirements: scenario.evaluation_criteria.clone(),
        coverage_details,
        coverage_ratio: normalize(ratio),
        score: normalize(ratio),
    }
}

static EDGE_CASES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "null_checks",
            Regex::new(r"===\s*null|!==\s*null|null ===|null !==").unwrap(),
        ),
        ("empty_checks", Regex::new(r"empty\s*\(|!\s*\w+").unwrap()),
        ("boundary_checks", Regex::new(r"<=|>=|<|>").unwrap()),
        (
            "try_catch_blocks",
            Regex::new(r"try\s*\{[\s\S]*?\}\s*catch\s*\(").unwrap(),
        ),
    ]
});

pub fn check_edge_case_handling(code: &str) -> EdgeCaseHandling {
    let patterns_detected: BTreeMap<String, bool> = EDGE_CASES
        .iter()
        .map(|(name, re)| (name.to_string(), re.is_match(code)))
        .collect();
    let hits = patterns_detected.values().filter(|&&hit| hit).count();
    let score = normalize(hits as f64 / EDGE_CASES.len() as f64);
    let coverage_level = if score > 0.75 {
        Level::High
    } else if score > 0.5 {
        Level::Medium
    } else {
        Level::Low
    };

    EdgeCaseHandling {
        patterns_detected,
        score,
        coverage_level,
    }
}

static TRY_CATCH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)try\s*\{.*?\}\s*catch\s*\(").unwrap());
static LOGS_ERRORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"logger->(error|critical|warning)").unwrap());

pub fn check_error_handling(code: &str) -> ErrorHandling {
    let uses_try_catch = TRY_CATCH_RE.is_match(code);
    let logs_errors = LOGS_ERRORS_RE.is_match(code);
    ErrorHandling {
        score: 0.5 * uses_try_catch as u8 as f64 + 0.5 * logs_errors as u8 as f64,
        uses_try_catch,
        logs_errors,
    }
}

static VALIDATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"validate|Assert|Constraints").unwrap());
static SANITIZER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"htmlspecialchars|strip_tags|filter_var").unwrap());

pub fn check_input_validation(code: &str) -> InputValidation {
    let uses_validator = VALIDATOR_RE.is_match(code);
    let sanitizes_input = SANITIZER_RE.is_match(code);
    InputValidation {
        score: 0.5 * uses_validator as u8 as f64 + 0.5 * sanitizes_input as u8 as f64,
        uses_validator,
        sanitizes_input,
    }
}

/// Fixed partial credit for any non-blank answer. Real checking needs a test harness.
pub fn check_business_logic_accuracy(code: &str, _scenario: &Scenario) -> f64 {
    if is_blank(code) {
        0.0
    } else {
        0.75
    }
}

static API_CONTRACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"JsonResponse|@Route|@Method|Request").unwrap());

pub fn check_api_contract_compliance(code: &str, _scenario: &Scenario) -> f64 {
    if API_CONTRACT_RE.is_match(code) {
        1.0
    } else {
        0.0
    }
}

pub fn assess_functional_correctness(code: &str, scenario: &Scenario) -> FunctionalCorrectness {
    FunctionalCorrectness {
        requirement_coverage: check_requirement_coverage(code, scenario),
        edge_case_handling: check_edge_case_handling(code),
        error_handling: check_error_handling(code),
        input_validation: check_input_validation(code),
        business_logic_accuracy: check_business_logic_accuracy(code, scenario),
        api_contract_compliance: check_api_contract_compliance(code, scenario),
    }
}
