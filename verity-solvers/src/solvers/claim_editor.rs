//! Rewrites non-factual claims so they agree with their evidence.

use crate::registry::{Solver, SolverArgs, SolverContext, SolverIo, SolverOutcome};
use crate::solvers::{chat_for, format_evidence};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use verity_core::chat::ChatRunner;
use verity_core::error::SolverError;
use verity_core::prompts::{CLAIM_REVISION, PromptCatalog};
use verity_core::types::{ClaimRevision, ClaimVerdict, FactCheckerState};

pub const NAME: &str = "claim_editor";

#[derive(Debug, Deserialize)]
struct RevisedText {
    text: String,
}

pub struct ClaimEditor {
    io: SolverIo,
    chat: ChatRunner,
    prompts: Arc<PromptCatalog>,
}

pub fn factory(
    io: SolverIo,
    args: &SolverArgs,
    ctx: &SolverContext,
) -> Result<Arc<dyn Solver>, SolverError> {
    Ok(Arc::new(ClaimEditor {
        io,
        chat: chat_for(NAME, args, ctx)?,
        prompts: ctx.prompts.clone(),
    }))
}

/// The verifier's correction, unless it is empty or a "none" placeholder.
fn usable_correction(verdict: &ClaimVerdict) -> Option<&str> {
    let correction = verdict.correction.trim();
    if correction.is_empty() || correction.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(correction)
    }
}

#[async_trait]
impl Solver for ClaimEditor {
    fn name(&self) -> &str {
        NAME
    }

    fn io(&self) -> &SolverIo {
        &self.io
    }

    async fn solve(&self, state: &mut FactCheckerState) -> Result<SolverOutcome, SolverError> {
        let verdicts: Vec<ClaimVerdict> = state.get_as(&self.io.input)?;

        let to_edit: Vec<&ClaimVerdict> = verdicts.iter().filter(|v| !v.factuality).collect();
        let batch = to_edit
            .iter()
            .map(|verdict| {
                let evidence = format_evidence(&verdict.evidences);
                self.prompts
                    .render(
                        CLAIM_REVISION,
                        &[
                            ("claim", verdict.claim.as_str()),
                            ("correction", usable_correction(verdict).unwrap_or("none")),
                            ("evidence", evidence.as_str()),
                        ],
                    )
                    .map_err(|source| SolverError::Prompt {
                        name: NAME.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut edits = self
            .chat
            .run_json::<RevisedText>(batch)
            .await
            .map_err(|source| SolverError::Llm {
                name: NAME.to_string(),
                source,
            })?
            .into_iter();

        let revisions: Vec<ClaimRevision> = verdicts
            .iter()
            .map(|verdict| {
                let edited_claim = if verdict.factuality {
                    verdict.claim.clone()
                } else {
                    match edits.next().flatten() {
                        Some(revised) if !revised.text.trim().is_empty() => {
                            revised.text.trim().to_string()
                        }
                        _ => {
                            warn!(
                                claim = %verdict.claim,
                                "Revision reply unusable; falling back to the verifier's correction"
                            );
                            usable_correction(verdict)
                                .unwrap_or(&verdict.claim)
                                .to_string()
                        }
                    }
                };
                ClaimRevision {
                    claim: verdict.claim.clone(),
                    edited_claim,
                    factuality: verdict.factuality,
                }
            })
            .collect();

        info!(
            claims = revisions.len(),
            edited = to_edit.len(),
            "Claim editing finished"
        );
        state.set(&self.io.output, revisions)?;
        Ok(SolverOutcome::Continue)
    }
}
