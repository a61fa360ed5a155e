//! Ordered solver chains.
//!
//! A [`Pipeline`] is assembled from solver specs and validated up front: each
//! stage must read a field that is either an initial field (`response`,
//! `question`) or written by an earlier stage.

use crate::registry::{Solver, SolverContext, SolverIo, SolverOutcome, SolverRegistry};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use verity_core::config::SolverSpec;
use verity_core::error::{PipelineError, SolverError};
use verity_core::types::{FactCheckerState, QUESTION_FIELD, RESPONSE_FIELD};

/// The outcome of running a pipeline over one response.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub state: FactCheckerState,
    pub completed_stages: Vec<String>,
    /// The stage that returned [`SolverOutcome::Halt`], if any.
    pub halted_at: Option<String>,
}

/// A validated chain of solvers.
pub struct Pipeline {
    stages: Vec<Arc<dyn Solver>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.describe())
            .finish()
    }
}

impl Pipeline {
    /// Instantiate every spec in order and check the field wiring.
    pub fn build(
        specs: &[SolverSpec],
        registry: &SolverRegistry,
        ctx: &SolverContext,
    ) -> Result<Self, PipelineError> {
        let stages = specs
            .iter()
            .map(|spec| {
                registry
                    .build(spec, ctx)
                    .map_err(|source| PipelineError::Stage {
                        stage: spec.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_stages(stages)
    }

    /// Assemble already-built solvers, applying the same validation as [`Pipeline::build`].
    pub fn from_stages(stages: Vec<Arc<dyn Solver>>) -> Result<Self, PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut available: BTreeSet<String> = [RESPONSE_FIELD, QUESTION_FIELD]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for stage in &stages {
            let io = stage.io();
            if !available.contains(&io.input) {
                return Err(PipelineError::UnsatisfiedInput {
                    solver: stage.name().to_string(),
                    input: io.input.clone(),
                    available: available.iter().cloned().collect::<Vec<_>>().join(", "),
                });
            }
            available.insert(io.output.clone());
            available.extend(io.also_writes.iter().cloned());
        }

        Ok(Self { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Each stage's name with its resolved field wiring, in run order.
    pub fn stage_io(&self) -> impl Iterator<Item = (&str, &SolverIo)> {
        self.stages.iter().map(|stage| (stage.name(), stage.io()))
    }

    /// Wiring of the last stage named `solver`.
    pub fn last_io(&self, solver: &str) -> Option<&SolverIo> {
        self.stage_io()
            .filter(|(name, _)| *name == solver)
            .map(|(_, io)| io)
            .last()
    }

    /// One `name: input -> output` line per stage.
    pub fn describe(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|stage| {
                let io = stage.io();
                let mut outputs = vec![io.output.as_str()];
                outputs.extend(io.also_writes.iter().map(String::as_str));
                format!("{}: {} -> {}", stage.name(), io.input, outputs.join(", "))
            })
            .collect()
    }

    /// Run every stage over a fresh state for `response`.
    pub async fn run(
        &self,
        response: &str,
        question: Option<&str>,
    ) -> Result<PipelineRun, PipelineError> {
        let state = FactCheckerState::new(response, question.map(String::from));
        self.run_state(state).await
    }

    /// Run every stage over an existing state.
    pub async fn run_state(
        &self,
        mut state: FactCheckerState,
    ) -> Result<PipelineRun, PipelineError> {
        let mut completed_stages = Vec::with_capacity(self.stages.len());
        let mut halted_at = None;

        for stage in &self.stages {
            let name = stage.name().to_string();
            let timeout = stage.timeout();
            info!(stage = %name, input = %stage.io().input, "Running solver");

            let result = match tokio::time::timeout(timeout, stage.solve(&mut state)).await {
                Ok(result) => result,
                Err(_) => Err(SolverError::Timeout {
                    name: name.clone(),
                    timeout_secs: timeout.as_secs(),
                }),
            };
            let outcome = result.map_err(|source| PipelineError::Stage {
                stage: name.clone(),
                source,
            })?;

            debug!(stage = %name, output = %stage.io().output, "Solver finished");
            completed_stages.push(name.clone());
            if outcome == SolverOutcome::Halt {
                warn!(stage = %name, "Solver halted the pipeline");
                halted_at = Some(name);
                break;
            }
        }

        Ok(PipelineRun {
            state,
            completed_stages,
            halted_at,
        })
    }
}
