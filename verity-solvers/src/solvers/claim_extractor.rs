//! LLM-based decomposition of a response into atomic claims.

use crate::registry::{Solver, SolverArgs, SolverContext, SolverIo, SolverOutcome};
use crate::solvers::chat_for;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use verity_core::chat::ChatRunner;
use verity_core::error::SolverError;
use verity_core::prompts::{CLAIM_EXTRACTION, PromptCatalog};
use verity_core::types::FactCheckerState;

pub const NAME: &str = "claim_extractor";

/// Models answer either `{"claim": "..."}` objects or bare strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExtractedClaim {
    Object { claim: String },
    Text(String),
}

impl ExtractedClaim {
    fn into_text(self) -> String {
        match self {
            Self::Object { claim } | Self::Text(claim) => claim,
        }
    }
}

pub struct ClaimExtractor {
    io: SolverIo,
    chat: ChatRunner,
    prompts: Arc<PromptCatalog>,
}

pub fn factory(
    io: SolverIo,
    args: &SolverArgs,
    ctx: &SolverContext,
) -> Result<Arc<dyn Solver>, SolverError> {
    Ok(Arc::new(ClaimExtractor {
        io,
        chat: chat_for(NAME, args, ctx)?,
        prompts: ctx.prompts.clone(),
    }))
}

#[async_trait]
impl Solver for ClaimExtractor {
    fn name(&self) -> &str {
        NAME
    }

    fn io(&self) -> &SolverIo {
        &self.io
    }

    async fn solve(&self, state: &mut FactCheckerState) -> Result<SolverOutcome, SolverError> {
        let text: String = state.get_as(&self.io.input)?;
        let messages = self
            .prompts
            .render(CLAIM_EXTRACTION, &[("response", text.as_str())])
            .map_err(|source| SolverError::Prompt {
                name: NAME.to_string(),
                source,
            })?;

        let replies = self
            .chat
            .run_json::<Vec<ExtractedClaim>>(vec![messages])
            .await
            .map_err(|source| SolverError::Llm {
                name: NAME.to_string(),
                source,
            })?;

        let claims: Vec<String> = match replies.into_iter().next().flatten() {
            Some(items) => items
                .into_iter()
                .map(|item| item.into_text().trim().to_string())
                .filter(|claim| !claim.is_empty())
                .collect(),
            None => {
                warn!("Claim extraction reply could not be parsed; no claims extracted");
                Vec::new()
            }
        };

        info!(count = claims.len(), "Extracted claims");
        state.set(&self.io.output, claims)?;
        Ok(SolverOutcome::Continue)
    }
}
