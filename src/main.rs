use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use context_eval::config::{Config, ConfigFile};
use context_eval::context::ContextCollector;
use context_eval::generation::{GenerationBridge, OllamaClient};
use context_eval::mcp::{ToolCall, ToolContext, ToolRegistry};
use context_eval::output::{self, OutputFormat};
use context_eval::prompt::{PromptBuilder, PromptOptions};
use context_eval::scenario::{ScenarioRepository, ScenarioRunner, TaskType};

/// Compare model-generated Symfony code with and without project context
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format: plain or json
    #[arg(short, long, global = true, default_value = "plain")]
    output: OutputFormat,

    /// Config file to use instead of .context-eval/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project the tools introspect
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run evaluation scenarios against the model
    Run {
        #[arg(long, conflicts_with = "scenario")]
        category: Option<String>,
        /// Scenario key
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Collect and show the context a prompt would receive
    Context {
        prompt: String,
        #[arg(long, default_value = "general")]
        task_type: String,
        /// Explicit tool, repeatable
        #[arg(long = "tool")]
        tools: Vec<String>,
    },
    /// Invoke a single tool
    Call {
        tool: String,
        /// JSON arguments
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// List registered tools
    Tools,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let settings: ConfigFile = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            let detected = Config::detect()?;
            Config::with_settings(detected.project_root, settings)?
        }
        None => {
            let config = Config::detect()?;
            config.ensure_dirs()?;
            config
        }
    };
    if let Some(project) = &cli.project {
        config = config.with_target(project)?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs to stderr, stdout carries results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "context_eval=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::info!("Project root: {:?}", config.target_root);

    let registry = Arc::new(ToolRegistry::with_defaults(ToolContext::from_config(&config)));
    let format = cli.output;

    match cli.command {
        Command::Tools => {
            println!("{}", output::render_tools(&registry.list(), format));
        }
        Command::Call { tool, args } => {
            let arguments = serde_json::from_str(&args).context("--args must be valid JSON")?;
            let result = registry.execute(&ToolCall::new(tool, arguments));
            println!("{}", output::render_call_result(&result, format));
        }
        Command::Context {
            prompt,
            task_type,
            tools,
        } => {
            let collector = ContextCollector::new(registry, config.settings.context.clone());
            let task_type: TaskType = task_type.parse().unwrap_or_default();
            let bundle = collector.collect_smart_context(&prompt, task_type, &tools);
            println!("{}", output::render_bundle(&bundle, format));
        }
        Command::Run { category, scenario } => {
            let repository = ScenarioRepository::load(&config.scenarios_path)?;
            tracing::info!("Loaded {} scenarios", repository.len());

            let client = OllamaClient::from_config(&config.settings.generation)?;
            let collector = Arc::new(ContextCollector::new(
                registry,
                config.settings.context.clone(),
            ));
            let bridge = GenerationBridge::new(
                client,
                collector,
                PromptBuilder::new(PromptOptions::default()),
                config.settings.generation.clone(),
            );
            let runner = ScenarioRunner::new(bridge, repository);

            let reports = match (category, scenario) {
                (_, Some(key)) => vec![runner.run_by_key(&key).await?],
                (Some(category), None) => runner.run_by_category(&category).await,
                (None, None) => runner.run_all().await,
            };
            println!("{}", output::render_reports(&reports, format));
        }
    }

    Ok(())
}
