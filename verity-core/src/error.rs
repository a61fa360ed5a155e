//! Error types for the Verity core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering LLM calls, search, solvers, pipelines, datasets, and configuration.

use std::path::PathBuf;

/// Top-level error type for Verity.
#[derive(Debug, thiserror::Error)]
pub enum VerityError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from the web search backend.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search API key not set (env var '{var}')")]
    MissingApiKey { var: String },

    #[error("Search request failed: {message}")]
    Request { message: String },

    #[error("Search returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Search response parse error: {message}")]
    ResponseParse { message: String },
}

/// Errors raised while constructing or running a solver.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Solver not found: {name}")]
    NotFound { name: String },

    #[error("Solver already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Invalid arguments for solver '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("State field '{field}' is missing")]
    MissingField { field: String },

    #[error("State field '{field}' has unexpected shape: {reason}")]
    FieldType { field: String, reason: String },

    #[error("Solver '{name}' failed: {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("Solver '{name}' timed out after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },

    #[error("Solver '{name}' LLM call failed: {source}")]
    Llm {
        name: String,
        #[source]
        source: LlmError,
    },

    #[error("Solver '{name}' search failed: {source}")]
    Search {
        name: String,
        #[source]
        source: SearchError,
    },

    #[error("Solver '{name}' prompt failed: {source}")]
    Prompt {
        name: String,
        #[source]
        source: PromptError,
    },
}

/// Errors from pipeline assembly and execution.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Pipeline has no solvers")]
    Empty,

    #[error("Solver '{solver}' reads '{input}', which no earlier stage produces (available: {available})")]
    UnsatisfiedInput {
        solver: String,
        input: String,
        available: String,
    },

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: SolverError,
    },
}

/// Errors from loading and filtering evaluation data.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset {0} is not supported.")]
    Unsupported(String),

    #[error("The LLM responses should have 2 columns, found {found}")]
    ColumnCount { found: usize },

    #[error("The number of responses ({responses}) and questions ({questions}) should be the same")]
    LengthMismatch { responses: usize, questions: usize },

    #[error("Response index '{index}' is invalid: {reason}")]
    InvalidIndex { index: String, reason: String },

    #[error("Row {row} ({source_name}) is missing field '{field}'")]
    MissingField {
        row: usize,
        source_name: String,
        field: String,
    },

    #[error("Failed to parse {path} line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Dataset directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Unknown snowballing topic: {topic}")]
    UnknownTopic { topic: String },

    #[error("Row {row}: column '{column}' has unrecognised value '{value}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from prompt template lookup and rendering.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt template not found: {name}")]
    NotFound { name: String },

    #[error("Prompt '{name}' needs a value for '{{{placeholder}}}'")]
    MissingVariable { name: String, placeholder: String },

    #[error("Prompt catalog parse error: {message}")]
    Parse { message: String },
}

/// A type alias for results using the top-level `VerityError`.
pub type Result<T> = std::result::Result<T, VerityError>;
