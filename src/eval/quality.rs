//! Static code-quality heuristics over generated PHP.
//!
//! None of these parse the code; they look for textual signals only.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{is_blank, mean, normalize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Low,
    Medium,
    High,
}

impl Level {
    /// high above 0.8, medium above 0.5
    fn from_score(score: f64) -> Self {
        if score > 0.8 {
            Level::High
        } else if score > 0.5 {
            Level::Medium
        } else {
            Level::Low
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxCheck {
    pub score: f64,
    pub errors: Vec<String>,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleCheck {
    pub score: f64,
    pub violations: Vec<String>,
    pub compliance_level: Level,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
    pub cyclomatic_complexity: usize,
    pub rating: Level,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Documentation {
    pub method_documentation_ratio: f64,
    pub has_class_documentation: bool,
    pub has_property_documentation: bool,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityCheck {
    pub score: f64,
    pub vulnerabilities: Vec<String>,
    pub security_level: Level,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Maintainability {
    pub score: f64,
    pub issues: Vec<String>,
    pub average_method_length: f64,
    pub max_method_length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeQuality {
    pub syntax_correctness: SyntaxCheck,
    pub psr_compliance: StyleCheck,
    pub complexity: Complexity,
    pub documentation: Documentation,
    pub security: SecurityCheck,
    pub maintainability: Maintainability,
}

impl CodeQuality {
    pub fn score(&self) -> f64 {
        mean(&[
            self.syntax_correctness.score,
            self.psr_compliance.score,
            self.complexity.score,
            self.documentation.score,
            self.security.score,
            self.maintainability.score,
        ])
    }
}

/// Blank content scores zero across the board
pub fn assess_code_quality(code: &str) -> CodeQuality {
    if is_blank(code) {
        return CodeQuality::default();
    }
    CodeQuality {
        syntax_correctness: check_syntax(code),
        psr_compliance: check_style(code),
        complexity: calculate_complexity(code),
        documentation: check_documentation(code),
        security: check_security(code),
        maintainability: check_maintainability(code),
    }
}

static SYNTAX_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"[^;]\s*\}").unwrap(),
            "Missing semicolon before closing brace",
        ),
        (
            Regex::new(r"\$[a-zA-Z_][a-zA-Z0-9_]*\s*=\s*[^;]*\n").unwrap(),
            "Missing semicolon at end of assignment",
        ),
        (
            Regex::new(r"\bfunction\s+[a-zA-Z_][a-zA-Z0-9_]*\s*\([^)]*\)\s*[^{]").unwrap(),
            "Missing opening brace for function",
        ),
    ]
});

pub fn check_syntax(code: &str) -> SyntaxCheck {
    let mut errors = Vec::new();
    if !code.contains("<?php") && !code.contains("<?=") {
        errors.push("Missing PHP opening tag".to_string());
    }
    for (rule, message) in SYNTAX_RULES.iter() {
        if rule.is_match(code) {
            errors.push(message.to_string());
        }
    }

    SyntaxCheck {
        score: normalize(1.0 - 0.1 * errors.len() as f64),
        is_valid: errors.is_empty(),
        errors,
    }
}

static STYLE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"^[^\r\n]*\r\n").unwrap(),
            "Should use Unix line endings (LF)",
        ),
        (Regex::new(r"\t").unwrap(), "Should use 4 spaces instead of tabs"),
        (
            Regex::new(r"\bclass\s+[a-z]").unwrap(),
            "Class names should start with uppercase",
        ),
        (
            Regex::new(r"\bfunction\s+[A-Z]").unwrap(),
            "Method names should be camelCase",
        ),
        (
            Regex::new(r"[^\s]\{").unwrap(),
            "Opening brace should be on new line for classes/methods",
        ),
    ]
});

pub fn check_style(code: &str) -> StyleCheck {
    let violations: Vec<String> = STYLE_RULES
        .iter()
        .filter(|(rule, _)| rule.is_match(code))
        .map(|(_, message)| message.to_string())
        .collect();
    let score = normalize(1.0 - 0.15 * violations.len() as f64);

    StyleCheck {
        score,
        violations,
        compliance_level: Level::from_score(score),
    }
}

static DECISION_POINTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bif\s*\(",
        r"\belse\s*if\s*\(",
        r"\bfor\s*\(",
        r"\bforeach\s*\(",
        r"\bwhile\s*\(",
        r"\bdo\s+",
        r"\bswitch\s*\(",
        r"\bcase\s+",
        r"\bcatch\s*\(",
        r"\?\s*.*\s*:",
        r"&&",
        r"\|\|",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn calculate_complexity(code: &str) -> Complexity {
    let cyclomatic_complexity = 1 + DECISION_POINTS
        .iter()
        .map(|p| p.find_iter(code).count())
        .sum::<usize>();

    let rating = match cyclomatic_complexity {
        0..=10 => Level::Low,
        11..=20 => Level::Medium,
        _ => Level::High,
    };

    Complexity {
        cyclomatic_complexity,
        rating,
        score: normalize(1.0 - cyclomatic_complexity as f64 / 30.0),
    }
}

static METHOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfunction\s+[a-zA-Z_][a-zA-Z0-9_]*\s*\(").unwrap());

// A docblock is `/** ... */` without an inner `*/`
static DOCUMENTED_METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/\*\*(?:[^*]|\*[^/])*\*/\s*(?:#\[[^\]]*\]\s*)*(?:(?:public|protected|private|static|abstract|final)\s+)*function\b",
    )
    .unwrap()
});

static DOCUMENTED_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/\*\*(?:[^*]|\*[^/])*\*/\s*(?:#\[[^\]]*\]\s*)*(?:(?:final|abstract|readonly)\s+)*class\b")
        .unwrap()
});

static DOCUMENTED_PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/\*\*(?:[^*]|\*[^/])*\*/\s*(?:#\[[^\]]*\]\s*)*(?:private|protected|public)\s+(?:readonly\s+)?(?:\??[\w\\]+\s+)?\$")
        .unwrap()
});

pub fn check_documentation(code: &str) -> Documentation {
    let methods = METHOD_RE.find_iter(code).count();
    let documented = DOCUMENTED_METHOD_RE.find_iter(code).count();
    let ratio = if methods > 0 {
        (documented as f64 / methods as f64).min(1.0)
    } else {
        0.0
    };

    let has_class_documentation = DOCUMENTED_CLASS_RE.is_match(code);
    let has_property_documentation = DOCUMENTED_PROPERTY_RE.is_match(code);
    let bonus = if has_class_documentation { 0.2 } else { 0.0 }
        + if has_property_documentation { 0.1 } else { 0.0 };

    Documentation {
        method_documentation_ratio: normalize(ratio),
        has_class_documentation,
        has_property_documentation,
        score: normalize((ratio + bonus) / 1.3),
    }
}

static SECURITY_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"eval\s*\(").unwrap(), "Use of eval() function"),
        (Regex::new(r"exec\s*\(").unwrap(), "Use of exec() function"),
        (Regex::new(r"system\s*\(").unwrap(), "Use of system() function"),
        (
            Regex::new(r"shell_exec\s*\(").unwrap(),
            "Use of shell_exec() function",
        ),
        (
            Regex::new(r"mysql_query\s*\(").unwrap(),
            "Use of deprecated mysql_query",
        ),
        (
            Regex::new(r"md5\s*\(.*password").unwrap(),
            "Weak password hashing with MD5",
        ),
    ]
});

/// `$_GET[...]` on a line where some closing bracket is not immediately
/// passed on to a call, i.e. not followed by `)`
fn raw_superglobal(code: &str, name: &str) -> bool {
    let marker = format!("${}[", name);
    code.lines().any(|line| {
        line.match_indices(&marker).any(|(start, _)| {
            let rest = &line[start + marker.len()..];
            rest.match_indices(']').any(|(i, _)| {
                !rest[i + 1..].trim_start().starts_with(')')
            })
        })
    })
}

pub fn check_security(code: &str) -> SecurityCheck {
    let mut vulnerabilities = Vec::new();
    for name in ["_GET", "_POST"] {
        if raw_superglobal(code, name) {
            vulnerabilities.push(format!("Direct ${} usage without validation", name));
        }
    }
    for (rule, message) in SECURITY_RULES.iter() {
        if rule.is_match(code) {
            vulnerabilities.push(message.to_string());
        }
    }
    let score = normalize(1.0 - 0.2 * vulnerabilities.len() as f64);

    SecurityCheck {
        score,
        vulnerabilities,
        security_level: Level::from_score(score),
    }
}

static FUNCTION_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfunction\s+").unwrap());

/// Line counts of each method: from its `function` line to the first lone `}`
fn method_lengths(code: &str) -> Vec<usize> {
    let mut lengths = Vec::new();
    let mut current = 0usize;
    let mut in_method = false;

    for line in code.lines() {
        if FUNCTION_LINE_RE.is_match(line) {
            if in_method && current > 0 {
                lengths.push(current);
            }
            in_method = true;
            current = 1;
        } else if in_method {
            current += 1;
            if line.trim() == "}" {
                lengths.push(current);
                in_method = false;
                current = 0;
            }
        }
    }

    lengths
}

/// Number of duplicated lines. Always zero until a real detector exists.
pub fn find_duplicated_code(_code: &str) -> usize {
    0
}

pub fn check_maintainability(code: &str) -> Maintainability {
    let lengths = method_lengths(code);
    let mut issues = Vec::new();
    let mut score = 1.0;

    let long_methods = lengths.iter().filter(|&&len| len > 20).count();
    if long_methods > 0 {
        issues.push("Methods too long (>20 lines)".to_string());
        score -= 0.1 * long_methods as f64;
    }

    let duplicated = find_duplicated_code(code);
    if duplicated > 0 {
        issues.push(format!(
            "Code duplication detected ({} similar lines)",
            duplicated
        ));
        score -= 0.1;
    }

    Maintainability {
        score: normalize(score),
        issues,
        average_method_length: if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
        },
        max_method_length: lengths.iter().copied().max().unwrap_or(0),
    }
}
