use context_eval::config::{Config, GenerationConfig};
use context_eval::context::ContextCollector;
use context_eval::error::EvalError;
use context_eval::generation::{GenerationBridge, OllamaClient};
use context_eval::mcp::{ToolContext, ToolRegistry};
use context_eval::prompt::{PromptBuilder, PromptOptions};
use context_eval::scenario::{ScenarioRepository, ScenarioRunner, TaskType};
use mockito::Matcher;
use serde_json::Map;
use std::sync::Arc;
use tempfile::TempDir;

const SCENARIOS: &str = r#"
[scenarios.controller_crud]
category = "controller"
prompt = "Create a CRUD controller for BlogPost"
task_type = "controller"
relevant_tools = ["Get Entities", "Get Routes"]
evaluation_criteria = ["index", "show", "new", "edit", "delete"]

[scenarios.entity_tag]
category = "entity"
prompt = "Add a Tag entity"
task_type = "entity"
complexity_level = "low"
"#;

const CONTEXT_ANSWER: &str = r#"<?php
namespace App\Controller;

use App\Entity\BlogPost;
use App\Repository\BlogPostRepository;

#[Route('/blog-post')]
class BlogPostController extends AbstractController
{
    #[Route('/', name: 'blog_post_index', methods: ['GET'])]
    public function index(BlogPostRepository $repository): Response
    {
        return $this->render('blog_post/index.html.twig', ['posts' => $repository->findAll()]);
    }

    #[Route('/{id}', name: 'blog_post_show', methods: ['GET'])]
    public function show(BlogPost $post): Response
    {
        return $this->render('blog_post/show.html.twig', ['post' => $post]);
    }

    #[Route('/{id}/delete', name: 'blog_post_delete', methods: ['POST'])]
    public function delete(Request $request, BlogPost $post, EntityManagerInterface $em): Response
    {
        if ($this->isCsrfTokenValid('delete' . $post->getId(), $request->request->get('_token'))) {
            $em->remove($post);
            $em->flush();
        }
        return $this->redirectToRoute('blog_post_index');
    }
}
"#;

fn setup_workspace() -> (Config, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    std::fs::create_dir_all(root.join(".git")).unwrap();
    for (path, content) in [
        (
            "src/Entity/BlogPost.php",
            "<?php\nnamespace App\\Entity;\n\nclass BlogPost\n{\n    private ?int $id = null;\n}\n",
        ),
        (
            "src/Controller/HomeController.php",
            "<?php\nclass HomeController\n{\n    #[Route('/', name: 'homepage')]\n    public function index(): Response {}\n}\n",
        ),
        ("scenarios.toml", SCENARIOS),
    ] {
        let full = root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    let config = Config::from_path(root).unwrap();
    config.ensure_dirs().unwrap();
    (config, temp_dir)
}

fn runner(config: &Config, base_url: &str) -> ScenarioRunner<OllamaClient> {
    let generation = GenerationConfig {
        base_url: base_url.to_string(),
        model: "test-model".into(),
        timeout_secs: 5,
        options: Map::new(),
    };
    let registry = Arc::new(ToolRegistry::with_defaults(ToolContext::from_config(config)));
    let collector = Arc::new(ContextCollector::new(
        registry,
        config.settings.context.clone(),
    ));
    let bridge = GenerationBridge::new(
        OllamaClient::from_config(&generation).unwrap(),
        collector,
        PromptBuilder::new(PromptOptions::default()),
        generation,
    );
    let repository = ScenarioRepository::load(&config.scenarios_path).unwrap();
    ScenarioRunner::new(bridge, repository)
}

#[tokio::test]
async fn test_context_run_beats_vanilla() {
    let (config, _temp) = setup_workspace();
    assert!(config.config_dir.join("config.toml").is_file());

    let mut server = mockito::Server::new_async().await;
    let contextual = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJsonString(r#"{"model": "test-model", "stream": false}"#.into()),
            Matcher::Regex("## Project Context".into()),
            Matcher::Regex("Available entities: BlogPost".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "response": CONTEXT_ANSWER,
                "eval_count": 420,
                "total_duration": 3_000_000_000u64
            })
            .to_string(),
        )
        .create_async()
        .await;
    let vanilla = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::Regex(r"expert developer\.\\n\\n## Your Task".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"response": "<?php echo 'posts';", "eval_count": 12, "total_duration": 1000000000}"#)
        .create_async()
        .await;

    let report = runner(&config, &server.url())
        .run_by_key("controller_crud")
        .await
        .unwrap();

    contextual.assert_async().await;
    vanilla.assert_async().await;

    assert!(!report.degraded());
    assert_eq!(report.scenario.task_type, TaskType::Controller);
    assert!(report.context_response.used_context);
    assert!(report.context_response.context.is_some());
    assert!(!report.vanilla_response.used_context);
    assert_eq!(report.context_response.token_count, 420);
    assert_eq!(report.diff.token_count_diff, 408);
    assert!((report.diff.response_time_diff - 2.0).abs() < 1e-9);

    let eval = &report.evaluation;
    assert_eq!(eval.scenario_id, "controller_crud");
    assert!(eval.context_utilization.context_used);
    assert_eq!(
        eval.context_utilization.entities.as_ref().unwrap().used_entities,
        vec!["BlogPost"]
    );
    assert!(eval.correctness_improvement() > 0.0);
    assert!(eval.compliance_improvement() > 0.0);
    assert!(eval.overall.context_score > eval.overall.vanilla_score);
    assert!(eval.overall.improvement_percentage_defined);
    assert_eq!(eval.basic.response_time_improvement, -200.0);
}

#[tokio::test]
async fn test_unknown_scenario_key() {
    let (config, _temp) = setup_workspace();
    let runner = runner(&config, "http://127.0.0.1:9");
    match runner.run_by_key("nope").await {
        Err(EvalError::ScenarioNotFound(key)) => assert_eq!(key, "nope"),
        other => panic!("unexpected: {:?}", other.map(|r| r.scenario.id)),
    }
}

#[tokio::test]
async fn test_failed_generation_degrades() {
    let (config, _temp) = setup_workspace();
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(503)
        .with_body("model is loading")
        .expect(2)
        .create_async()
        .await;

    let reports = runner(&config, &server.url())
        .run_by_category("entity")
        .await;

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.scenario.complexity, "low");
    assert!(report.degraded());
    assert_eq!(report.context_response.content, "");
    assert!(report.context_response.raw_metadata["error"]
        .as_str()
        .unwrap()
        .contains("503"));

    let overall = &report.evaluation.overall;
    assert_eq!(overall.context_score, 0.0);
    assert_eq!(overall.vanilla_score, 0.0);
    assert!(!overall.improvement_percentage_defined);
}
