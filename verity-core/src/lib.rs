//! # Verity Core
//!
//! Core library for the Verity fact-checking harness.
//! Provides the shared pipeline state, configuration, error types, the LLM
//! interface (brain) with its OpenAI-compatible provider, the batched chat
//! runner, the web search client, and prompt templates.

pub mod brain;
pub mod chat;
pub mod config;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod search;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{LlmProvider, MockLlmProvider};
pub use chat::{ChatOptions, ChatRunner, parse_json_reply};
pub use config::{
    EvaluatorConfig, LlmConfig, PipelineConfig, RetryConfig, SearchConfig, SolverSpec,
    VerityConfig,
};
pub use error::{
    ConfigError, DatasetError, LlmError, PipelineError, PromptError, Result, SearchError,
    SolverError, VerityError,
};
pub use prompts::{PromptCatalog, PromptTemplate};
pub use providers::{OpenAiCompatibleProvider, create_provider};
pub use search::{MockSearchEngine, SearchEngine, SearchSnippet, SerperSearch};
pub use types::{
    ClaimEvidence, ClaimRevision, ClaimVerdict, CompletionRequest, CompletionResponse, Evidence,
    FactCheckerState, Message, QUESTION_FIELD, RESPONSE_FIELD, Role, TokenUsage,
};
