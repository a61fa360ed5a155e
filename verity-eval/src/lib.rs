//! # Verity Eval
//!
//! Benchmark evaluators for LLM factuality: response/dataset loading,
//! snowballing, self-awareness, FreshQA and free-text fact-checking, the
//! end-to-end LLM evaluator, fact-checker scoring and the Markdown report.

pub mod checker;
pub mod dataset;
pub mod freetext;
pub mod freshqa;
pub mod llm;
pub mod loader;
pub mod metrics;
pub mod report;
pub mod response;
pub mod selfaware;
pub mod snowballing;

pub use checker::{CheckerEvaluator, CheckerOutcome, CheckerResult};
pub use dataset::{Dataset, FilteredResponses, filter_responses};
pub use freetext::{
    FreeTextAnalysis, FreeTextEvaluation, FreeTextEvaluator, FreeTextRecord, FreeTextResult,
};
pub use freshqa::{FreshQaEvaluation, FreshQaEvaluator, FreshQaResult};
pub use llm::{
    Analysis, CombinedResult, EvaluationInput, EvaluationOutcome, EvaluationRequest, LlmEvaluator,
};
pub use loader::{CombinedRow, ResponseSet, read_input};
pub use metrics::{BinaryMetrics, ClassScores, ConfusionMatrix};
pub use response::{ResponseEvaluation, ResponseEvaluator};
pub use selfaware::{SelfAwareEvaluation, SelfAwareResult, evaluate_selfaware};
pub use snowballing::{SnowballingEvaluation, TopicAccuracy, evaluate_snowballing};
