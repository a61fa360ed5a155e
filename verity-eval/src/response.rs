//! Fact-check a single response with the configured solver pipeline.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use verity_core::config::PipelineConfig;
use verity_core::error::Result;
use verity_core::types::{ClaimVerdict, FactCheckerState, TokenUsage};
use verity_core::ChatRunner;
use verity_solvers::solvers::{
    CLAIMS, DETAIL, LABEL, OUTPUT, claim_extractor, claim_verifier, concat_response_regenerator,
};
use verity_solvers::{Pipeline, PipelineRun, SolverContext, SolverRegistry};

/// What the pipeline concluded about one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvaluation {
    /// `None` when no stage produced a label.
    pub label: Option<bool>,
    pub detail: Vec<ClaimVerdict>,
    pub claims: Vec<String>,
    /// Revised text, when the chain includes a regenerator.
    pub output: Option<String>,
    pub stages: Vec<String>,
    pub halted_at: Option<String>,
    /// Every field the stages wrote.
    pub state: serde_json::Value,
}

impl ResponseEvaluation {
    pub fn true_claims(&self) -> usize {
        self.detail.iter().filter(|v| v.factuality).count()
    }

    pub fn false_claims(&self) -> usize {
        self.detail.iter().filter(|v| !v.factuality).count()
    }

    fn from_run(run: PipelineRun, fields: &ResultFields) -> Result<Self> {
        let state = &run.state;
        Ok(Self {
            label: optional_field(state, &fields.label)?,
            detail: optional_field(state, &fields.detail)?.unwrap_or_default(),
            claims: optional_field(state, &fields.claims)?.unwrap_or_default(),
            output: optional_field(state, &fields.output)?,
            state: state.to_json(),
            stages: run.completed_stages,
            halted_at: run.halted_at,
        })
    }
}

fn optional_field<T: DeserializeOwned>(state: &FactCheckerState, name: &str) -> Result<Option<T>> {
    if state.contains(name) {
        Ok(Some(state.get_as(name)?))
    } else {
        Ok(None)
    }
}

/// State fields the evaluation is read from, following the pipeline's wiring.
#[derive(Debug, Clone, PartialEq)]
struct ResultFields {
    label: String,
    detail: String,
    claims: String,
    output: String,
}

impl ResultFields {
    fn resolve(pipeline: &Pipeline) -> Self {
        let output_of = |solver: &str, default: &str| {
            pipeline
                .last_io(solver)
                .map_or_else(|| default.to_string(), |io| io.output.clone())
        };
        let verifier = pipeline.last_io(claim_verifier::NAME);
        Self {
            label: output_of(claim_verifier::NAME, LABEL),
            detail: verifier
                .and_then(|io| io.also_writes.first().cloned())
                .unwrap_or_else(|| DETAIL.to_string()),
            claims: output_of(claim_extractor::NAME, CLAIMS),
            output: output_of(concat_response_regenerator::NAME, OUTPUT),
        }
    }
}

/// Runs one pipeline over responses and tracks the tokens it spends.
#[derive(Clone)]
pub struct ResponseEvaluator {
    pipeline: Arc<Pipeline>,
    fields: Arc<ResultFields>,
    chat: ChatRunner,
}

impl ResponseEvaluator {
    pub fn new(pipeline: Arc<Pipeline>, chat: ChatRunner) -> Self {
        let fields = Arc::new(ResultFields::resolve(&pipeline));
        Self {
            pipeline,
            fields,
            chat,
        }
    }

    /// Build the configured pipeline from `registry`.
    pub fn from_config(
        config: &PipelineConfig,
        registry: &SolverRegistry,
        ctx: &SolverContext,
    ) -> Result<Self> {
        let pipeline = Pipeline::build(&config.solvers, registry, ctx)?;
        info!(stages = pipeline.len(), "Response evaluator ready");
        Ok(Self::new(Arc::new(pipeline), ctx.chat.clone()))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Tokens spent so far by every stage sharing this evaluator's runner.
    pub fn usage(&self) -> TokenUsage {
        self.chat.usage()
    }

    pub async fn evaluate(
        &self,
        response: &str,
        question: Option<&str>,
    ) -> Result<ResponseEvaluation> {
        let run = self.pipeline.run(response, question).await?;
        ResponseEvaluation::from_run(run, &self.fields)
    }
}
