//! Integration tests for complete solver chains.
//!
//! Runs the built-in solvers end to end against the scripted LLM and the
//! canned search engine: extraction → retrieval → verification → editing →
//! regeneration.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use verity_core::brain::MockLlmProvider;
use verity_core::chat::{ChatOptions, ChatRunner};
use verity_core::config::{SolverSpec, VerityConfig};
use verity_core::error::PipelineError;
use verity_core::prompts::PromptCatalog;
use verity_core::search::{MockSearchEngine, SearchSnippet};
use verity_core::types::{ClaimRevision, ClaimVerdict};
use verity_solvers::{Pipeline, SolverContext, builtin_registry};

fn context(mock: Arc<MockLlmProvider>, search: Arc<MockSearchEngine>) -> SolverContext {
    SolverContext {
        chat: ChatRunner::new(
            mock,
            ChatOptions {
                concurrency: 1,
                max_parse_attempts: 1,
                ..ChatOptions::default()
            },
        ),
        search,
        prompts: Arc::new(PromptCatalog::builtin().unwrap()),
        config: Arc::new(VerityConfig::default()),
    }
}

fn full_chain() -> Vec<SolverSpec> {
    [
        "claim_extractor",
        "claim_retriever",
        "claim_verifier",
        "claim_editor",
        "concat_response_regenerator",
    ]
    .iter()
    .map(|name| SolverSpec::named(*name))
    .collect()
}

// ── Default pipeline ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_default_pipeline_labels_response() {
    let mock = Arc::new(MockLlmProvider::new());
    // extraction
    mock.queue_text(r#"[{"claim": "Water boils at 100 C at sea level."}]"#);
    // query generation
    mock.queue_text(r#"["water boiling point sea level"]"#);
    // verification
    mock.queue_text(
        r#"{"reasoning": "Matches evidence.", "error": "none", "correction": "none", "factuality": true}"#,
    );

    let search = Arc::new(MockSearchEngine::new().with_default(vec![SearchSnippet::new(
        "Water boils at 100 degrees Celsius at sea level.",
        None,
    )]));
    let ctx = context(mock.clone(), search.clone());
    let pipeline =
        Pipeline::build(&VerityConfig::default().pipeline.solvers, &builtin_registry(), &ctx)
            .unwrap();

    let run = pipeline
        .run("Water boils at 100 C at sea level.", None)
        .await
        .unwrap();

    assert_eq!(
        run.completed_stages,
        vec!["claim_extractor", "claim_retriever", "claim_verifier"]
    );
    assert!(run.state.get_as::<bool>("label").unwrap());
    assert_eq!(search.queries(), vec!["water boiling point sea level"]);
    assert_eq!(mock.request_count(), 3);
}

// ── Full revision chain ──────────────────────────────────────────────────

#[tokio::test]
async fn test_full_chain_rewrites_false_claims() {
    let mock = Arc::new(MockLlmProvider::new());
    mock.queue_text(
        r#"[{"claim": "Marie Curie won two Nobel Prizes."}, {"claim": "Marie Curie was born in Paris."}]"#,
    );
    mock.queue_text(r#"["Marie Curie Nobel Prizes"]"#);
    mock.queue_text(r#"["Marie Curie birthplace"]"#);
    mock.queue_text(
        r#"{"reasoning": "Physics 1903, Chemistry 1911.", "error": "none", "correction": "none", "factuality": true}"#,
    );
    mock.queue_text(r#"{"reasoning": "She was born in Warsaw.", "error": "birthplace", "correction": "Marie Curie was born in Warsaw.", "factuality": false}"#);
    mock.queue_text(r#"{"text": "Marie Curie was born in Warsaw."}"#);

    let search = Arc::new(
        MockSearchEngine::new()
            .with_result(
                "Marie Curie Nobel Prizes",
                vec![SearchSnippet::new("Curie won the 1903 and 1911 Nobel Prizes.", None)],
            )
            .with_result(
                "Marie Curie birthplace",
                vec![SearchSnippet::new("Born in Warsaw, 1867.", None)],
            ),
    );
    let ctx = context(mock.clone(), search);
    let pipeline = Pipeline::build(&full_chain(), &builtin_registry(), &ctx).unwrap();
    assert_eq!(
        pipeline.describe(),
        vec![
            "claim_extractor: response -> claims",
            "claim_retriever: claims -> claims_with_evidences",
            "claim_verifier: claims_with_evidences -> label, detail",
            "claim_editor: detail -> claim_info",
            "concat_response_regenerator: claim_info -> output",
        ]
    );

    let run = pipeline
        .run(
            "Marie Curie won two Nobel Prizes and was born in Paris.",
            Some("Tell me about Marie Curie."),
        )
        .await
        .unwrap();

    assert!(!run.state.get_as::<bool>("label").unwrap());
    let detail: Vec<ClaimVerdict> = run.state.get_as("detail").unwrap();
    assert_eq!(detail.len(), 2);
    assert_eq!(detail[1].evidences[0].content, "Born in Warsaw, 1867.");

    let info: Vec<ClaimRevision> = run.state.get_as("claim_info").unwrap();
    assert_eq!(info[1].edited_claim, "Marie Curie was born in Warsaw.");
    assert_eq!(
        run.state.get_as::<String>("output").unwrap(),
        "Marie Curie won two Nobel Prizes. Marie Curie was born in Warsaw."
    );
    assert_eq!(mock.request_count(), 6);
}

// ── Wiring validation ────────────────────────────────────────────────────

#[test]
fn test_editor_without_verifier_is_rejected() {
    let mock = Arc::new(MockLlmProvider::new());
    let ctx = context(mock, Arc::new(MockSearchEngine::new()));
    let specs = vec![
        SolverSpec::named("claim_extractor"),
        SolverSpec::named("claim_editor"),
    ];
    match Pipeline::build(&specs, &builtin_registry(), &ctx) {
        Err(PipelineError::UnsatisfiedInput { solver, input, .. }) => {
            assert_eq!(solver, "claim_editor");
            assert_eq!(input, "detail");
        }
        other => panic!("expected UnsatisfiedInput, got {:?}", other.map(|p| p.describe())),
    }
}

#[test]
fn test_field_overrides_rewire_chain() {
    let mock = Arc::new(MockLlmProvider::new());
    let ctx = context(mock, Arc::new(MockSearchEngine::new()));
    let specs = vec![
        SolverSpec {
            output: Some("atomic_claims".into()),
            ..SolverSpec::named("claim_extractor")
        },
        SolverSpec {
            input: Some("atomic_claims".into()),
            ..SolverSpec::named("claim_retriever")
        }
        .with_arg("snippet_cnt", serde_json::json!(3)),
    ];
    let pipeline = Pipeline::build(&specs, &builtin_registry(), &ctx).unwrap();
    assert_eq!(
        pipeline.describe()[1],
        "claim_retriever: atomic_claims -> claims_with_evidences"
    );
}

#[test]
fn test_invalid_solver_argument_is_rejected() {
    let mock = Arc::new(MockLlmProvider::new());
    let ctx = context(mock, Arc::new(MockSearchEngine::new()));
    let specs = vec![
        SolverSpec::named("claim_extractor"),
        SolverSpec::named("claim_retriever").with_arg("snippet_cnt", serde_json::json!("ten")),
    ];
    assert!(matches!(
        Pipeline::build(&specs, &builtin_registry(), &ctx),
        Err(PipelineError::Stage { .. })
    ));
}

// ── Sentence decomposition ───────────────────────────────────────────────

#[tokio::test]
async fn test_sentence_decomposer_needs_no_services() {
    let mock = Arc::new(MockLlmProvider::new());
    let ctx = context(mock.clone(), Arc::new(MockSearchEngine::new()));
    let pipeline = Pipeline::build(
        &[SolverSpec::named("sentence_decomposer")],
        &builtin_registry(),
        &ctx,
    )
    .unwrap();
    let run = pipeline.run("One fact. Another fact.", None).await.unwrap();
    assert_eq!(
        run.state.get_as::<Vec<String>>("sentences").unwrap(),
        vec!["One fact.", "Another fact."]
    );
    assert_eq!(mock.request_count(), 0);
}
