//! # Verity Solvers
//!
//! The solver registry, the pipeline that chains solvers over a shared
//! fact-checking state, and the built-in claim processing solvers.

pub mod pipeline;
pub mod registry;
pub mod solvers;

pub use pipeline::{Pipeline, PipelineRun};
pub use registry::{
    Solver, SolverArgs, SolverContext, SolverDescriptor, SolverFactory, SolverIo, SolverOutcome,
    SolverRegistry,
};

use solvers::{
    CLAIM_INFO, CLAIMS, CLAIMS_WITH_EVIDENCES, DETAIL, LABEL, OUTPUT, SENTENCES, claim_editor,
    claim_extractor, claim_retriever, claim_verifier, concat_response_regenerator,
    sentence_decomposer,
};
use verity_core::types::RESPONSE_FIELD;

/// Register all built-in solvers.
pub fn register_builtin_solvers(registry: &mut SolverRegistry) {
    let descriptors = vec![
        SolverDescriptor::new(
            sentence_decomposer::NAME,
            RESPONSE_FIELD,
            SENTENCES,
            "Splits the response into sentences",
            sentence_decomposer::factory,
        ),
        SolverDescriptor::new(
            claim_extractor::NAME,
            RESPONSE_FIELD,
            CLAIMS,
            "Extracts atomic factual claims with the LLM",
            claim_extractor::factory,
        ),
        SolverDescriptor::new(
            claim_retriever::NAME,
            CLAIMS,
            CLAIMS_WITH_EVIDENCES,
            "Generates search queries per claim and collects evidence snippets",
            claim_retriever::factory,
        ),
        SolverDescriptor::new(
            claim_verifier::NAME,
            CLAIMS_WITH_EVIDENCES,
            LABEL,
            "Judges each claim against its evidence; writes per-claim detail and an overall label",
            claim_verifier::factory,
        ),
        SolverDescriptor::new(
            claim_editor::NAME,
            DETAIL,
            CLAIM_INFO,
            "Rewrites non-factual claims using the verifier's correction and evidence",
            claim_editor::factory,
        ),
        SolverDescriptor::new(
            concat_response_regenerator::NAME,
            CLAIM_INFO,
            OUTPUT,
            "Joins edited claims into a revised document",
            concat_response_regenerator::factory,
        ),
    ];

    for descriptor in descriptors {
        if let Err(e) = registry.register(descriptor) {
            tracing::warn!("Failed to register solver: {}", e);
        }
    }
}

/// A registry with every built-in solver.
pub fn builtin_registry() -> SolverRegistry {
    let mut registry = SolverRegistry::new();
    register_builtin_solvers(&mut registry);
    registry
}
