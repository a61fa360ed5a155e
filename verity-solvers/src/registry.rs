//! Solver registry: named solver factories and the stages built from them.
//!
//! Solvers are registered at startup with their default input and output
//! field names. A [`SolverSpec`] from configuration selects a solver by name,
//! may rename its fields, and carries solver-specific arguments.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use verity_core::chat::ChatRunner;
use verity_core::config::{SolverSpec, VerityConfig};
use verity_core::error::SolverError;
use verity_core::prompts::PromptCatalog;
use verity_core::search::SearchEngine;
use verity_core::types::FactCheckerState;

/// Solver-specific arguments from configuration.
pub type SolverArgs = Map<String, Value>;

/// Builds a solver instance from its resolved field names, arguments and context.
pub type SolverFactory =
    fn(SolverIo, &SolverArgs, &SolverContext) -> Result<Arc<dyn Solver>, SolverError>;

/// The state fields a solver reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverIo {
    pub input: String,
    pub output: String,
    /// Fields written besides `output`.
    pub also_writes: Vec<String>,
}

impl SolverIo {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            also_writes: Vec::new(),
        }
    }

    pub fn also_writing(mut self, field: impl Into<String>) -> Self {
        self.also_writes.push(field.into());
        self
    }
}

/// What the pipeline should do after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverOutcome {
    Continue,
    /// Stop the chain; later stages are skipped.
    Halt,
}

/// Trait that all solvers must implement.
#[async_trait]
pub trait Solver: Send + Sync {
    /// The registered name of this solver.
    fn name(&self) -> &str;

    /// The fields this instance reads and writes.
    fn io(&self) -> &SolverIo;

    /// Read `io().input` from the state and write `io().output`.
    async fn solve(&self, state: &mut FactCheckerState) -> Result<SolverOutcome, SolverError>;

    /// Maximum execution time before timeout.
    fn timeout(&self) -> Duration {
        Duration::from_secs(600)
    }
}

/// Shared services handed to every solver factory.
#[derive(Clone)]
pub struct SolverContext {
    pub chat: ChatRunner,
    pub search: Arc<dyn SearchEngine>,
    pub prompts: Arc<PromptCatalog>,
    pub config: Arc<VerityConfig>,
}

/// A registered solver: its default wiring and how to build it.
#[derive(Clone)]
pub struct SolverDescriptor {
    pub name: String,
    pub input: String,
    pub output: String,
    pub description: String,
    pub factory: SolverFactory,
}

impl SolverDescriptor {
    pub fn new(
        name: &str,
        input: &str,
        output: &str,
        description: &str,
        factory: SolverFactory,
    ) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            description: description.to_string(),
            factory,
        }
    }
}

impl std::fmt::Debug for SolverDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverDescriptor")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

/// The solver registry holds every registered solver descriptor.
pub struct SolverRegistry {
    solvers: HashMap<String, SolverDescriptor>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self {
            solvers: HashMap::new(),
        }
    }

    /// Register a solver. Returns error if a solver with the same name is already registered.
    pub fn register(&mut self, descriptor: SolverDescriptor) -> Result<(), SolverError> {
        if self.solvers.contains_key(&descriptor.name) {
            return Err(SolverError::AlreadyRegistered {
                name: descriptor.name,
            });
        }
        debug!(
            solver = %descriptor.name,
            input = %descriptor.input,
            output = %descriptor.output,
            "Registering solver"
        );
        self.solvers.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Unregister a solver by name.
    pub fn unregister(&mut self, name: &str) -> Result<(), SolverError> {
        if self.solvers.remove(name).is_none() {
            return Err(SolverError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SolverDescriptor> {
        self.solvers.get(name)
    }

    /// All descriptors, sorted by name.
    pub fn list_descriptors(&self) -> Vec<&SolverDescriptor> {
        let mut descriptors: Vec<&SolverDescriptor> = self.solvers.values().collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// All registered names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.solvers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    /// Instantiate the solver a spec names, applying its field overrides.
    pub fn build(
        &self,
        spec: &SolverSpec,
        ctx: &SolverContext,
    ) -> Result<Arc<dyn Solver>, SolverError> {
        let descriptor = self.get(&spec.name).ok_or_else(|| SolverError::NotFound {
            name: spec.name.clone(),
        })?;
        let io = SolverIo::new(
            spec.input.as_deref().unwrap_or(&descriptor.input),
            spec.output.as_deref().unwrap_or(&descriptor.output),
        );
        debug!(solver = %spec.name, input = %io.input, output = %io.output, "Building solver");
        (descriptor.factory)(io, &spec.args, ctx)
    }
}

impl Default for SolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read an optional non-negative integer argument.
pub fn arg_usize(
    solver: &str,
    args: &SolverArgs,
    key: &str,
    default: usize,
) -> Result<usize, SolverError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| SolverError::InvalidArguments {
                name: solver.to_string(),
                reason: format!("'{}' must be a non-negative integer, got {}", key, value),
            }),
    }
}

/// Read an optional string argument.
pub fn arg_string(
    solver: &str,
    args: &SolverArgs,
    key: &str,
) -> Result<Option<String>, SolverError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(SolverError::InvalidArguments {
            name: solver.to_string(),
            reason: format!("'{}' must be a string, got {}", key, other),
        }),
    }
}
