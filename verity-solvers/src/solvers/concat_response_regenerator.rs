//! Rebuilds a document from edited claims.

use crate::registry::{Solver, SolverArgs, SolverContext, SolverIo, SolverOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use verity_core::error::SolverError;
use verity_core::types::{ClaimRevision, FactCheckerState};

pub const NAME: &str = "concat_response_regenerator";

/// Joins every `edited_claim` with a single space.
pub struct ConcatResponseRegenerator {
    io: SolverIo,
}

pub fn factory(
    io: SolverIo,
    _args: &SolverArgs,
    _ctx: &SolverContext,
) -> Result<Arc<dyn Solver>, SolverError> {
    Ok(Arc::new(ConcatResponseRegenerator { io }))
}

#[async_trait]
impl Solver for ConcatResponseRegenerator {
    fn name(&self) -> &str {
        NAME
    }

    fn io(&self) -> &SolverIo {
        &self.io
    }

    async fn solve(&self, state: &mut FactCheckerState) -> Result<SolverOutcome, SolverError> {
        let claim_info: Vec<ClaimRevision> = state.get_as(&self.io.input)?;
        let document = claim_info
            .iter()
            .map(|c| c.edited_claim.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();
        state.set(&self.io.output, document)?;
        Ok(SolverOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revision(edited: &str) -> ClaimRevision {
        ClaimRevision {
            claim: String::new(),
            edited_claim: edited.to_string(),
            factuality: true,
        }
    }

    #[tokio::test]
    async fn test_joins_edited_claims() {
        let solver = ConcatResponseRegenerator {
            io: SolverIo::new("claim_info", "output"),
        };
        let mut state = FactCheckerState::new("r", None);
        state
            .set(
                "claim_info",
                vec![revision("Paris is in France."), revision("It is large. ")],
            )
            .unwrap();
        solver.solve(&mut state).await.unwrap();
        assert_eq!(
            state.get_as::<String>("output").unwrap(),
            "Paris is in France. It is large."
        );
    }

    #[tokio::test]
    async fn test_empty_claim_info_yields_empty_document() {
        let solver = ConcatResponseRegenerator {
            io: SolverIo::new("claim_info", "output"),
        };
        let mut state = FactCheckerState::new("r", None);
        state.set("claim_info", Vec::<ClaimRevision>::new()).unwrap();
        solver.solve(&mut state).await.unwrap();
        assert_eq!(state.get_as::<String>("output").unwrap(), "");
    }
}
