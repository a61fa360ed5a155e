//! Configuration system for Verity.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/verity/config.toml` and/or `.verity/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default directory evaluation runs are written under.
pub const DEFAULT_OUTPUT_DIR: &str = "tmp/output/llm_evaluator";

/// Top-level configuration for Verity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerityConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub pipeline: PipelineConfig,
    pub evaluator: EvaluatorConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openai" or any OpenAI-compatible endpoint ("local", "azure", ...).
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Sampling temperature. Fact-checking prompts want determinism.
    pub temperature: f32,
    /// Maximum number of chat requests in flight for one solver batch.
    pub concurrency: usize,
    /// How many times a reply that should be JSON is re-requested before giving up.
    pub max_parse_attempts: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 2048,
            temperature: 0.0,
            concurrency: 5,
            max_parse_attempts: 3,
            timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0-2.0",
                self.temperature
            ));
        }
        if self.concurrency == 0 {
            warnings.push("concurrency is 0; requests will be issued one at a time".to_string());
        }
        if self.max_parse_attempts == 0 {
            warnings.push(
                "max_parse_attempts is 0; structured replies will never be requested".to_string(),
            );
        }
        warnings
    }
}

/// Exponential backoff settings for transient LLM failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Web search backend configuration (Serper).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Environment variable holding the Serper API key.
    pub api_key_env: String,
    /// Serper endpoint root.
    pub base_url: String,
    /// Snippets kept per query.
    pub snippet_cnt: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "SERPER_API_KEY".to_string(),
            base_url: "https://google.serper.dev".to_string(),
            snippet_cnt: 10,
            timeout_secs: 20,
        }
    }
}

/// One configured pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSpec {
    /// Registered solver name.
    pub name: String,
    /// Override for the state field the solver reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Override for the state field the solver writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Solver-specific arguments.
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl SolverSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
            output: None,
            args: serde_json::Map::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.args.insert(key.into(), value);
        self
    }
}

/// Ordered solver chain used for response evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub solvers: Vec<SolverSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            solvers: vec![
                SolverSpec::named("claim_extractor"),
                SolverSpec::named("claim_retriever"),
                SolverSpec::named("claim_verifier"),
            ],
        }
    }
}

/// Settings for the benchmark evaluators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Root directory runs are written under (`{output_dir}/{run_id}`).
    pub output_dir: PathBuf,
    /// Directory holding the benchmark `*.jsonl` files.
    pub dataset_dir: PathBuf,
    /// Datasets evaluated when none are requested explicitly.
    pub datasets: Vec<String>,
    /// Per-dataset cap for the LLM-backed evaluators; `0` means no cap.
    /// Snowballing is never capped.
    pub sample_limit: usize,
    /// Cosine similarity at which a sentence counts as an uncertainty expression.
    pub selfaware_threshold: f64,
    /// Model used to rate FreshQA answers; falls back to `llm.model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshqa_model: Option<String>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            dataset_dir: PathBuf::from("data"),
            datasets: [
                "snowballing",
                "selfaware",
                "freshqa",
                "factoolqa",
                "felm-wk",
                "factcheck-bench",
                "factscore-bio",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            sample_limit: 30,
            selfaware_threshold: 0.75,
            freshqa_model: None,
        }
    }
}

impl VerityConfig {
    /// Collect warnings from every section.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.llm.validate();
        if self.search.snippet_cnt == 0 {
            warnings.push("search.snippet_cnt is 0; retrieval will find no evidence".to_string());
        }
        if self.pipeline.solvers.is_empty() {
            warnings.push("pipeline.solvers is empty; response evaluation will fail".to_string());
        }
        if !(0.0..=1.0).contains(&self.evaluator.selfaware_threshold) {
            warnings.push(format!(
                "evaluator.selfaware_threshold ({}) is outside 0.0-1.0",
                self.evaluator.selfaware_threshold
            ));
        }
        warnings
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "verity", "verity")
}

/// Load configuration by merging layers.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `VERITY_`)
/// 3. Workspace-local config (`.verity/config.toml`)
/// 4. User config (`~/.config/verity/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&VerityConfig>,
) -> Result<VerityConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(VerityConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".verity").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // VERITY_LLM__MODEL, VERITY_SEARCH__SNIPPET_CNT, ...
    figment = figment.merge(Env::prefixed("VERITY_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration from an explicit file on top of the defaults.
pub fn load_config_file(path: &Path) -> Result<VerityConfig, Box<figment::Error>> {
    Figment::from(Serialized::defaults(VerityConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VERITY_").split("__"))
        .extract()
        .map_err(Box::new)
}

/// Check whether any Verity configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs()
        && dirs.config_dir().join("config.toml").exists()
    {
        return true;
    }
    workspace.is_some_and(|ws| ws.join(".verity").join("config.toml").exists())
}

/// Write the default configuration to `<workspace>/.verity/config.toml`.
///
/// Returns `Ok(None)` without touching anything when the file already exists.
pub fn init_workspace_config(workspace: &Path) -> std::io::Result<Option<PathBuf>> {
    let config_dir = workspace.join(".verity");
    std::fs::create_dir_all(&config_dir)?;
    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        return Ok(None);
    }
    let toml_str = toml::to_string_pretty(&VerityConfig::default())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&config_path, toml_str)?;
    Ok(Some(config_path))
}
