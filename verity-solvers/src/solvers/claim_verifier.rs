//! Evidence-grounded verification of each claim.

use crate::registry::{Solver, SolverArgs, SolverContext, SolverIo, SolverOutcome, arg_string};
use crate::solvers::{DETAIL, chat_for, format_evidence};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use verity_core::chat::ChatRunner;
use verity_core::error::SolverError;
use verity_core::prompts::{PromptCatalog, VERIFICATION};
use verity_core::types::{ClaimEvidence, ClaimVerdict, FactCheckerState};

pub const NAME: &str = "claim_verifier";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Factuality {
    Flag(bool),
    Text(String),
}

impl Factuality {
    fn is_factual(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Text(text) => matches!(text.trim().to_lowercase().as_str(), "true" | "yes"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerdictReply {
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    correction: Option<String>,
    factuality: Factuality,
}

/// Writes one [`ClaimVerdict`] per claim to `detail` and the conjunction of
/// their factuality to the output field.
pub struct ClaimVerifier {
    io: SolverIo,
    chat: ChatRunner,
    prompts: Arc<PromptCatalog>,
}

pub fn factory(
    io: SolverIo,
    args: &SolverArgs,
    ctx: &SolverContext,
) -> Result<Arc<dyn Solver>, SolverError> {
    let detail = arg_string(NAME, args, "detail_field")?.unwrap_or_else(|| DETAIL.to_string());
    Ok(Arc::new(ClaimVerifier {
        io: io.also_writing(detail),
        chat: chat_for(NAME, args, ctx)?,
        prompts: ctx.prompts.clone(),
    }))
}

impl ClaimVerifier {
    fn detail_field(&self) -> &str {
        self.io.also_writes.first().map_or(DETAIL, String::as_str)
    }
}

#[async_trait]
impl Solver for ClaimVerifier {
    fn name(&self) -> &str {
        NAME
    }

    fn io(&self) -> &SolverIo {
        &self.io
    }

    async fn solve(&self, state: &mut FactCheckerState) -> Result<SolverOutcome, SolverError> {
        let claims: Vec<ClaimEvidence> = state.get_as(&self.io.input)?;

        let batch = claims
            .iter()
            .map(|item| {
                let evidence = format_evidence(&item.evidences);
                self.prompts
                    .render(
                        VERIFICATION,
                        &[("claim", item.claim.as_str()), ("evidence", evidence.as_str())],
                    )
                    .map_err(|source| SolverError::Prompt {
                        name: NAME.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let replies = self
            .chat
            .run_json::<VerdictReply>(batch)
            .await
            .map_err(|source| SolverError::Llm {
                name: NAME.to_string(),
                source,
            })?;

        let verdicts: Vec<ClaimVerdict> = claims
            .into_iter()
            .zip(replies)
            .map(|(item, reply)| match reply {
                Some(reply) => ClaimVerdict {
                    claim: item.claim,
                    reasoning: reply.reasoning,
                    error: reply.error.unwrap_or_default(),
                    correction: reply.correction.unwrap_or_default(),
                    factuality: reply.factuality.is_factual(),
                    evidences: item.evidences,
                },
                None => {
                    warn!(
                        claim = %item.claim,
                        "Verification reply could not be parsed; marking claim non-factual"
                    );
                    ClaimVerdict {
                        claim: item.claim,
                        reasoning: "The verification reply could not be parsed.".to_string(),
                        error: String::new(),
                        correction: String::new(),
                        factuality: false,
                        evidences: item.evidences,
                    }
                }
            })
            .collect();

        let label = verdicts.iter().all(|v| v.factuality);
        let false_claims = verdicts.iter().filter(|v| !v.factuality).count();
        info!(
            claims = verdicts.len(),
            false_claims,
            label,
            "Verification finished"
        );

        state.set(self.detail_field(), &verdicts)?;
        state.set(&self.io.output, label)?;
        Ok(SolverOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_core::brain::MockLlmProvider;
    use verity_core::chat::ChatOptions;
    use verity_core::types::Evidence;

    fn verifier(mock: Arc<MockLlmProvider>) -> ClaimVerifier {
        ClaimVerifier {
            io: SolverIo::new("claims_with_evidences", "label").also_writing(DETAIL),
            chat: ChatRunner::new(
                mock,
                ChatOptions {
                    concurrency: 1,
                    max_parse_attempts: 1,
                    ..ChatOptions::default()
                },
            ),
            prompts: Arc::new(PromptCatalog::builtin().unwrap()),
        }
    }

    fn claim(text: &str, evidence: &str) -> ClaimEvidence {
        ClaimEvidence {
            claim: text.to_string(),
            evidences: vec![Evidence {
                query: text.to_string(),
                content: evidence.to_string(),
                source: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_label_is_conjunction_of_verdicts() {
        let mock = Arc::new(MockLlmProvider::new());
        mock.queue_text(
            r#"{"reasoning": "ok", "error": "none", "correction": "none", "factuality": true}"#,
        );
        mock.queue_text(r#"{"reasoning": "wrong year", "error": "year", "correction": "It opened in 1889.", "factuality": "False"}"#);

        let mut state = FactCheckerState::new("r", None);
        state
            .set(
                "claims_with_evidences",
                vec![
                    claim("Paris is in France.", "Paris is the capital of France."),
                    claim("The tower opened in 1901.", "The tower opened in 1889."),
                ],
            )
            .unwrap();
        verifier(mock.clone()).solve(&mut state).await.unwrap();

        assert_eq!(state.get_as::<bool>("label").unwrap(), false);
        let detail: Vec<ClaimVerdict> = state.get_as("detail").unwrap();
        assert!(detail[0].factuality);
        assert!(!detail[1].factuality);
        assert_eq!(detail[1].correction, "It opened in 1889.");
        assert_eq!(detail[1].evidences[0].content, "The tower opened in 1889.");

        let requests = mock.requests();
        assert!(
            requests[1].messages[1]
                .content
                .contains("- The tower opened in 1889.")
        );
    }

    #[tokio::test]
    async fn test_unparsable_verdict_is_non_factual() {
        let mock = Arc::new(MockLlmProvider::with_fallback("maybe?"));
        let mut state = FactCheckerState::new("r", None);
        state
            .set("claims_with_evidences", vec![claim("x", "y")])
            .unwrap();
        verifier(mock).solve(&mut state).await.unwrap();
        assert_eq!(state.get_as::<bool>("label").unwrap(), false);
    }

    #[tokio::test]
    async fn test_no_claims_is_factual() {
        let mock = Arc::new(MockLlmProvider::new());
        let mut state = FactCheckerState::new("r", None);
        state
            .set("claims_with_evidences", Vec::<ClaimEvidence>::new())
            .unwrap();
        verifier(mock).solve(&mut state).await.unwrap();
        assert_eq!(state.get_as::<bool>("label").unwrap(), true);
        assert_eq!(
            state.get_as::<Vec<ClaimVerdict>>("detail").unwrap(),
            Vec::new()
        );
    }
}
