//! Built-in solvers.
//!
//! | name | reads | writes |
//! |------|-------|--------|
//! | `sentence_decomposer` | `response` | `sentences` |
//! | `claim_extractor` | `response` | `claims` |
//! | `claim_retriever` | `claims` | `claims_with_evidences` |
//! | `claim_verifier` | `claims_with_evidences` | `label`, `detail` |
//! | `claim_editor` | `detail` | `claim_info` |
//! | `concat_response_regenerator` | `claim_info` | `output` |

pub mod claim_editor;
pub mod claim_extractor;
pub mod claim_retriever;
pub mod claim_verifier;
pub mod concat_response_regenerator;
pub mod sentence_decomposer;

use crate::registry::{SolverArgs, SolverContext, arg_string};
use verity_core::chat::ChatRunner;
use verity_core::error::SolverError;
use verity_core::types::Evidence;

pub const SENTENCES: &str = "sentences";
pub const CLAIMS: &str = "claims";
pub const CLAIMS_WITH_EVIDENCES: &str = "claims_with_evidences";
pub const LABEL: &str = "label";
pub const DETAIL: &str = "detail";
pub const CLAIM_INFO: &str = "claim_info";
pub const OUTPUT: &str = "output";

/// The shared chat runner, switched to the `model` argument when one is given.
pub(crate) fn chat_for(
    solver: &str,
    args: &SolverArgs,
    ctx: &SolverContext,
) -> Result<ChatRunner, SolverError> {
    Ok(match arg_string(solver, args, "model")? {
        Some(model) => ctx.chat.with_model(Some(model)),
        None => ctx.chat.clone(),
    })
}

/// Evidence snippets as a bulleted block for prompts.
pub(crate) fn format_evidence(evidences: &[Evidence]) -> String {
    if evidences.is_empty() {
        return "- (no evidence found)".to_string();
    }
    evidences
        .iter()
        .map(|e| format!("- {}", e.content))
        .collect::<Vec<_>>()
        .join("\n")
}
