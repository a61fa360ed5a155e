//! Evidence retrieval: query generation plus web search per claim.

use crate::registry::{Solver, SolverArgs, SolverContext, SolverIo, SolverOutcome, arg_usize};
use crate::solvers::chat_for;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use verity_core::chat::ChatRunner;
use verity_core::error::SolverError;
use verity_core::prompts::{PromptCatalog, QUERY_GENERATION};
use verity_core::search::SearchEngine;
use verity_core::types::{ClaimEvidence, Evidence, FactCheckerState};

pub const NAME: &str = "claim_retriever";

/// Snippets kept per query unless `snippet_cnt` is given.
pub const DEFAULT_SNIPPET_CNT: usize = 10;

pub struct ClaimRetriever {
    io: SolverIo,
    chat: ChatRunner,
    search: Arc<dyn SearchEngine>,
    prompts: Arc<PromptCatalog>,
    snippet_cnt: usize,
}

pub fn factory(
    io: SolverIo,
    args: &SolverArgs,
    ctx: &SolverContext,
) -> Result<Arc<dyn Solver>, SolverError> {
    Ok(Arc::new(ClaimRetriever {
        io,
        chat: chat_for(NAME, args, ctx)?,
        search: ctx.search.clone(),
        prompts: ctx.prompts.clone(),
        snippet_cnt: arg_usize(NAME, args, "snippet_cnt", DEFAULT_SNIPPET_CNT)?,
    }))
}

impl ClaimRetriever {
    async fn generate_queries(&self, claims: &[String]) -> Result<Vec<Vec<String>>, SolverError> {
        let batch = claims
            .iter()
            .map(|claim| {
                self.prompts
                    .render(QUERY_GENERATION, &[("claim", claim.as_str())])
                    .map_err(|source| SolverError::Prompt {
                        name: NAME.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let replies = self
            .chat
            .run_json::<Vec<String>>(batch)
            .await
            .map_err(|source| SolverError::Llm {
                name: NAME.to_string(),
                source,
            })?;

        Ok(claims
            .iter()
            .zip(replies)
            .map(|(claim, reply)| {
                let queries: Vec<String> = reply
                    .unwrap_or_default()
                    .into_iter()
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .collect();
                if queries.is_empty() {
                    warn!(claim = %claim, "No queries generated; searching the claim itself");
                    vec![claim.clone()]
                } else {
                    queries
                }
            })
            .collect())
    }
}

#[async_trait]
impl Solver for ClaimRetriever {
    fn name(&self) -> &str {
        NAME
    }

    fn io(&self) -> &SolverIo {
        &self.io
    }

    async fn solve(&self, state: &mut FactCheckerState) -> Result<SolverOutcome, SolverError> {
        let claims: Vec<String> = state.get_as(&self.io.input)?;
        let queries = self.generate_queries(&claims).await?;

        let mut results = Vec::with_capacity(claims.len());
        for (claim, claim_queries) in claims.into_iter().zip(queries) {
            let merged_query = claim_queries.join(" ");
            let per_query = self
                .search
                .search_all(&claim_queries)
                .await
                .map_err(|source| SolverError::Search {
                    name: NAME.to_string(),
                    source,
                })?;

            let evidences: Vec<Evidence> = per_query
                .into_iter()
                .flat_map(|snippets| snippets.into_iter().take(self.snippet_cnt))
                .map(|snippet| Evidence {
                    query: merged_query.clone(),
                    content: snippet.content,
                    source: snippet.source,
                })
                .collect();
            debug!(claim = %claim, evidences = evidences.len(), "Retrieved evidence");
            results.push(ClaimEvidence { claim, evidences });
        }

        info!(claims = results.len(), "Evidence retrieval finished");
        state.set(&self.io.output, results)?;
        Ok(SolverOutcome::Continue)
    }
}
