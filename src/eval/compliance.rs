//! Symfony convention checks. Each check is a set of weighted textual signals.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{mean, normalize};

struct Signal {
    name: &'static str,
    pattern: Regex,
    weight: f64,
}

struct CheckSpec {
    name: &'static str,
    signals: Vec<Signal>,
}

fn signal(name: &'static str, pattern: &str, weight: f64) -> Signal {
    Signal {
        name,
        pattern: Regex::new(pattern).unwrap(),
        weight,
    }
}

static CHECKS: Lazy<Vec<CheckSpec>> = Lazy::new(|| {
    let third = 1.0 / 3.0;
    vec![
        CheckSpec {
            name: "service_pattern_usage",
            signals: vec![
                signal(
                    "constructor_injection",
                    r"public\s+function\s+__construct\([^)]*[A-Z][a-zA-Z]*Interface",
                    third,
                ),
                signal("service_autowiring", r"#\[Autowire\]", third),
                signal("service_attributes", r"#\[AsService\]", third),
            ],
        },
        CheckSpec {
            name: "dependency_injection",
            signals: vec![
                signal("constructor_di", r"public\s+function\s+__construct", 0.25),
                signal(
                    "typed_parameters",
                    r"function\s+__construct\([^)]*[A-Z][a-zA-Z]*\s+\$",
                    0.25,
                ),
                signal("readonly_properties", r"readonly\s+", 0.25),
                signal("private_properties", r"private\s+[A-Z][a-zA-Z]*\s+\$", 0.25),
            ],
        },
        CheckSpec {
            name: "attribute_usage",
            signals: vec![
                signal("route_attributes", r"#\[Route\(", 0.5),
                signal("autowire_attributes", r"#\[Autowire\]", 0.5),
                signal("validation_attributes", r"#\[Assert\\", 0.5),
                signal("serializer_attributes", r"#\[Groups\(", 0.5),
            ],
        },
        CheckSpec {
            name: "event_dispatcher_usage",
            signals: vec![
                signal("uses_events", r"EventDispatcher|dispatch\(", 0.5),
                signal("custom_events", r"extends\s+Event", 0.5),
            ],
        },
        CheckSpec {
            name: "form_component_usage",
            signals: vec![
                signal("uses_form_builder", r"FormBuilderInterface|createForm", 0.5),
                signal("form_validation", r"handleRequest|isSubmitted|isValid", 0.5),
            ],
        },
        CheckSpec {
            name: "security_component_usage",
            signals: vec![
                signal(
                    "uses_security",
                    r"Security|IsGranted|denyAccessUnlessGranted",
                    0.6,
                ),
                signal("csrf_protection", r"csrf|CsrfToken", 0.4),
            ],
        },
        CheckSpec {
            name: "doctrine_integration",
            signals: vec![
                signal("uses_entity_manager", r"EntityManagerInterface|EntityManager", 0.4),
                signal("uses_repository", r"Repository|findBy|find\(", 0.4),
                signal("uses_orm_attributes", r"#\[ORM\\", 0.2),
            ],
        },
        CheckSpec {
            name: "controller_best_practices",
            signals: vec![
                signal("extends_abstract_controller", r"extends\s+AbstractController", 0.25),
                signal("returns_response", r":\s*Response|return\s+\$this->", 0.25),
                signal("uses_route_attributes", r"#\[Route\(", 0.25),
                signal(
                    "proper_method_names",
                    r"public\s+function\s+(index|show|new|edit|delete)",
                    0.25,
                ),
            ],
        },
        CheckSpec {
            name: "response_handling",
            signals: vec![
                signal("json_response", r"JsonResponse|json\(", 0.33),
                signal("redirect_response", r"RedirectResponse|redirectToRoute", 0.33),
                signal("template_response", r"render\(|renderView", 0.34),
            ],
        },
        CheckSpec {
            name: "validation_usage",
            signals: vec![
                signal("uses_validation", r"Assert\\|@Assert|#\[Assert", 0.7),
                signal("validation_groups", r"groups\s*=|Groups\(", 0.3),
            ],
        },
    ]
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub name: String,
    pub signals: BTreeMap<String, bool>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkCompliance {
    pub checks: Vec<ComplianceCheck>,
}

impl FrameworkCompliance {
    pub fn score(&self) -> f64 {
        mean(&self.checks.iter().map(|c| c.score).collect::<Vec<_>>())
    }

    pub fn check(&self, name: &str) -> Option<&ComplianceCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

fn run_check(spec: &CheckSpec, code: &str) -> ComplianceCheck {
    let mut signals = BTreeMap::new();
    let mut total = 0.0;
    for signal in &spec.signals {
        let hit = signal.pattern.is_match(code);
        if hit {
            total += signal.weight;
        }
        signals.insert(signal.name.to_string(), hit);
    }
    ComplianceCheck {
        name: spec.name.to_string(),
        signals,
        score: normalize(total),
    }
}

pub fn assess_framework_compliance(code: &str) -> FrameworkCompliance {
    FrameworkCompliance {
        checks: CHECKS.iter().map(|spec| run_check(spec, code)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROLLER: &str = r#"<?php
namespace App\Controller;

#[Route('/blog')]
class BlogController extends AbstractController
{
    public function __construct(private readonly PostRepository $posts) {}

    #[Route('/', name: 'blog_index')]
    public function index(): Response
    {
        return $this->render('blog/index.html.twig', ['posts' => $this->posts->findAll()]);
    }
}
"#;

    #[test]
    fn test_ten_checks() {
        assert_eq!(assess_framework_compliance("").checks.len(), 10);
        assert_eq!(assess_framework_compliance("").score(), 0.0);
    }

    #[test]
    fn test_controller_best_practices_full() {
        let compliance = assess_framework_compliance(CONTROLLER);
        let check = compliance.check("controller_best_practices").unwrap();
        assert_eq!(check.score, 1.0);
        assert!(check.signals.values().all(|&hit| hit));
    }

    #[test]
    fn test_partial_weights() {
        let compliance = assess_framework_compliance(CONTROLLER);
        assert_eq!(compliance.check("response_handling").unwrap().score, 0.34);
        assert_eq!(compliance.check("doctrine_integration").unwrap().score, 0.4);
        assert_eq!(compliance.check("attribute_usage").unwrap().score, 0.5);
        let di = compliance.check("dependency_injection").unwrap();
        assert_eq!(di.score, 0.75);
        assert!(!di.signals["private_properties"]);
    }

    #[test]
    fn test_attribute_usage_caps_at_one() {
        let code = "#[Route('/')] #[Autowire] #[Assert\\NotBlank] #[Groups('a')]";
        let compliance = assess_framework_compliance(code);
        assert_eq!(compliance.check("attribute_usage").unwrap().score, 1.0);
    }
}
