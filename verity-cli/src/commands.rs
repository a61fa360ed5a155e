//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::EvaluateAction;
use crate::PipelineAction;
use crate::SolversAction;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use verity_core::chat::{ChatOptions, ChatRunner};
use verity_core::config::{VerityConfig, init_workspace_config, load_config};
use verity_core::prompts::PromptCatalog;
use verity_core::providers::create_provider;
use verity_core::search::SerperSearch;
use verity_eval::{
    CheckerEvaluator, EvaluationInput, EvaluationRequest, LlmEvaluator, ResponseEvaluator,
};
use verity_solvers::{SolverContext, SolverRegistry, builtin_registry};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Evaluate { action } => handle_evaluate(action, workspace).await,
        Commands::Solvers { action } => handle_solvers(action),
        Commands::Pipeline { action } => handle_pipeline(action, workspace),
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load(workspace: &Path) -> anyhow::Result<VerityConfig> {
    let config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    Ok(config)
}

/// Wire the configured LLM provider, search client and prompts together.
fn build_context(config: VerityConfig) -> anyhow::Result<SolverContext> {
    let provider = create_provider(&config.llm).context("Failed to create the LLM provider")?;
    let search = SerperSearch::new(&config.search).context("Failed to create the search client")?;
    Ok(SolverContext {
        chat: ChatRunner::new(provider, ChatOptions::from(&config.llm)),
        search: Arc::new(search),
        prompts: Arc::new(PromptCatalog::builtin()?),
        config: Arc::new(config),
    })
}

async fn handle_evaluate(action: EvaluateAction, workspace: &Path) -> anyhow::Result<()> {
    let config = load(workspace)?;
    match action {
        EvaluateAction::Llm {
            model_name,
            input,
            output_dir,
            dataset_dir,
            datasets,
            no_analyze,
            no_report,
        } => {
            let ctx = build_context(config)?;
            let evaluator = LlmEvaluator::new(&ctx, &builtin_registry())?;
            let request = EvaluationRequest {
                model_name,
                input: EvaluationInput::Path(input),
                output_dir,
                dataset_dir,
                datasets,
                analyze: !no_analyze,
                save_report: !no_report,
            };
            let outcome = evaluator.evaluate(request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.result)?);
            println!("\nRun {} written to {}", outcome.run_id, outcome.run_dir.display());
            if let Some(report) = outcome.report_path {
                println!("Report: {}", report.display());
            }
            Ok(())
        }
        EvaluateAction::Response { text, question } => {
            let ctx = build_context(config)?;
            let evaluator =
                ResponseEvaluator::from_config(&ctx.config.pipeline, &builtin_registry(), &ctx)?;
            let evaluation = evaluator.evaluate(&text, question.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
            let usage = evaluator.usage();
            println!(
                "\nTokens: {} in / {} out",
                usage.input_tokens, usage.output_tokens
            );
            Ok(())
        }
        EvaluateAction::Checker { input, output_dir } => {
            let output_dir = output_dir.unwrap_or(config.evaluator.output_dir);
            let outcome = CheckerEvaluator::new(output_dir).evaluate_path(&input)?;
            println!("{}", serde_json::to_string_pretty(&outcome.result)?);
            println!("\nResult written to {}", outcome.result_path.display());
            Ok(())
        }
    }
}

fn handle_solvers(action: SolversAction) -> anyhow::Result<()> {
    match action {
        SolversAction::List => {
            let registry = builtin_registry();
            println!("Registered solvers ({}):", registry.len());
            for descriptor in registry.list_descriptors() {
                println!(
                    "  {} ({} -> {}) - {}",
                    descriptor.name, descriptor.input, descriptor.output, descriptor.description
                );
            }
            Ok(())
        }
    }
}

/// One line per configured stage with its effective field wiring.
fn describe_pipeline(config: &VerityConfig, registry: &SolverRegistry) -> Vec<String> {
    config
        .pipeline
        .solvers
        .iter()
        .enumerate()
        .map(|(i, spec)| match registry.get(&spec.name) {
            Some(descriptor) => format!(
                "{}. {}: {} -> {}",
                i + 1,
                spec.name,
                spec.input.as_deref().unwrap_or(&descriptor.input),
                spec.output.as_deref().unwrap_or(&descriptor.output)
            ),
            None => format!("{}. {}: (not registered)", i + 1, spec.name),
        })
        .collect()
}

fn handle_pipeline(action: PipelineAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        PipelineAction::Show => {
            let config = load(workspace)?;
            println!("Pipeline:");
            for line in describe_pipeline(&config, &builtin_registry()) {
                println!("  {}", line);
            }
            Ok(())
        }
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            match init_workspace_config(workspace)? {
                Some(path) => println!("Created default configuration at: {}", path.display()),
                None => println!(
                    "Configuration file already exists at: {}",
                    workspace.join(".verity").join("config.toml").display()
                ),
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
