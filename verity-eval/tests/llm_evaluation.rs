//! Integration tests for complete evaluation runs.
//!
//! Builds a small benchmark directory and a responses CSV on disk, then runs
//! the LLM evaluator against the scripted LLM and the canned search engine.

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use verity_core::brain::MockLlmProvider;
use verity_core::chat::{ChatOptions, ChatRunner};
use verity_core::config::VerityConfig;
use verity_core::error::{DatasetError, VerityError};
use verity_core::prompts::PromptCatalog;
use verity_core::search::{MockSearchEngine, SearchSnippet};
use verity_eval::snowballing::ALL_TOPICS;
use verity_eval::{CombinedResult, EvaluationInput, EvaluationRequest, LlmEvaluator, ResponseSet};
use verity_solvers::{SolverContext, builtin_registry};

const DATASET: &str = r#"{"source": "snowballing", "topic": "Primality Testing", "question": "Is 10733 a prime number?"}
{"source": "snowballing", "topic": "US Senator Search", "question": "Was there ever a US senator that represented Alabama and whose alma mater was MIT?"}
{"source": "selfaware-SelfAware", "ability_to_test": "answerable: False", "question": "What will the weather be like in 2090?"}
{"source": "selfaware-hotpot_dev", "ability_to_test": "answerable: True", "question": "What is the capital of France?"}
{"source": "freshqa", "question": "Who is the CEO of Example Corp?", "reference_answer": ["Ada Lovelace"]}
{"source": "felm-wk", "prompt": "Is water wet?"}
"#;

const RESPONSES: &str = "index,response
0,\"Yes, 10733 is a prime number.\"
1,\"No, there was never such a senator.\"
2,The answer is unknown.
3,Paris.
4,The CEO is Ada Lovelace.
5,Water is wet.
";

fn workspace() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("questions.jsonl"), DATASET).unwrap();
    let csv = dir.path().join("responses.csv");
    fs::write(&csv, RESPONSES).unwrap();
    (dir, data, csv)
}

fn evaluator(mock: Arc<MockLlmProvider>) -> LlmEvaluator {
    let ctx = SolverContext {
        chat: ChatRunner::new(
            mock,
            ChatOptions {
                concurrency: 1,
                max_parse_attempts: 1,
                ..ChatOptions::default()
            },
        ),
        search: Arc::new(MockSearchEngine::new().with_default(vec![SearchSnippet::new(
            "Water is a liquid that makes things wet.",
            Some("https://example.com/water".to_string()),
        )])),
        prompts: Arc::new(PromptCatalog::builtin().unwrap()),
        config: Arc::new(VerityConfig::default()),
    };
    LlmEvaluator::new(&ctx, &builtin_registry()).unwrap()
}

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count()
}

// ── Full run ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_run_writes_every_artifact() {
    let (dir, data, csv) = workspace();
    let mock = Arc::new(MockLlmProvider::new());
    // freshqa rating
    mock.queue_text("The response names the right person.\ncredited: yes");
    // felm-wk: extraction, query generation, verification
    mock.queue_text(r#"[{"claim": "Water is wet."}]"#);
    mock.queue_text(r#"["is water wet"]"#);
    mock.queue_text(
        r#"{"reasoning": "Supported.", "error": "none", "correction": "none", "factuality": true}"#,
    );

    let evaluator = evaluator(mock.clone());
    let mut request = EvaluationRequest::new("test-model", EvaluationInput::Path(csv));
    request.output_dir = Some(dir.path().join("out"));
    request.dataset_dir = Some(data);
    request.datasets = vec![
        "snowballing".into(),
        "selfaware".into(),
        "freshqa".into(),
        "felm-wk".into(),
    ];

    let outcome = evaluator.evaluate(request).await.unwrap();
    assert_eq!(outcome.run_dir, dir.path().join("out").join(evaluator.run_id()));

    let result = &outcome.result;
    let all = result.snowballing.as_ref().unwrap()[ALL_TOPICS];
    assert_eq!((all.correct, all.total), (2, 2));
    let selfaware = result.selfaware.unwrap();
    assert_eq!(selfaware.accuracy, 1.0);
    assert_eq!(selfaware.true_positives, 1);
    assert_eq!(result.freshqa.unwrap().correct, 1);
    let felm = result.freetext["felm-wk"];
    assert_eq!((felm.claims, felm.true_claims, felm.false_claims), (1, 1, 0));
    assert_eq!(felm.factual_responses, 1);
    assert_eq!(mock.request_count(), 4);

    let run_dir = &outcome.run_dir;
    assert_eq!(line_count(&run_dir.join("snowballing_output.jsonl")), 2);
    assert_eq!(line_count(&run_dir.join("selfaware_output.jsonl")), 2);
    assert_eq!(line_count(&run_dir.join("freshqa_output.jsonl")), 1);
    assert_eq!(line_count(&run_dir.join("felm-wk_output.jsonl")), 1);

    let saved: CombinedResult =
        serde_json::from_str(&fs::read_to_string(run_dir.join("result.json")).unwrap()).unwrap();
    assert_eq!(&saved, result);
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(run_dir.join("result.json")).unwrap()).unwrap();
    assert!(raw["freetext"]["felm-wk"]["claims"].is_number());

    let analysis: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(run_dir.join("analysis.json")).unwrap()).unwrap();
    assert_eq!(
        analysis["freetext"]["felm-wk"],
        serde_json::json!({
            "true_claims": 1,
            "false_claims": 0,
            "factual_responses": 1,
            "non_factual_responses": 0
        })
    );
    assert!(analysis["snowballing"].is_object());
    let freetext_analysis = &outcome.analysis.as_ref().unwrap().freetext["felm-wk"];
    assert_eq!(freetext_analysis.true_claims, 1);
    let report = fs::read_to_string(outcome.report_path.unwrap()).unwrap();
    assert!(report.contains("# LLM factuality report: test-model"));
    assert!(report.contains("| felm-wk | 1 | 1 | 1 | 0 |"));
}

// ── Options ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_without_analysis_or_report() {
    let (dir, data, _) = workspace();
    let responses = ResponseSet::from_responses(
        [
            "Yes.",
            "No.",
            "Unknown.",
            "Paris.",
            "Ada.",
            "Water is wet.",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    );
    let evaluator = evaluator(Arc::new(MockLlmProvider::new()));
    let mut request = EvaluationRequest::new("m", EvaluationInput::Responses(responses));
    request.output_dir = Some(dir.path().join("out"));
    request.dataset_dir = Some(data);
    request.datasets = vec!["snowballing".into()];
    request.analyze = false;
    request.save_report = false;

    let outcome = evaluator.evaluate(request).await.unwrap();
    assert!(outcome.analysis.is_none());
    assert!(outcome.report_path.is_none());
    assert!(outcome.result.selfaware.is_none());
    assert!(outcome.run_dir.join("result.json").is_file());
    assert!(!outcome.run_dir.join("analysis.json").exists());
    assert!(!outcome.run_dir.join("report.md").exists());
}

// ── Input validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_response_count_must_match_questions() {
    let (dir, data, _) = workspace();
    let evaluator = evaluator(Arc::new(MockLlmProvider::new()));
    let mut request = EvaluationRequest::new(
        "m",
        EvaluationInput::Responses(ResponseSet::from_responses(vec!["only one".into()])),
    );
    request.output_dir = Some(dir.path().join("out"));
    request.dataset_dir = Some(data);
    request.datasets = vec!["snowballing".into()];

    let err = evaluator.evaluate(request).await.unwrap_err();
    assert!(matches!(
        err,
        VerityError::Dataset(DatasetError::LengthMismatch {
            responses: 1,
            questions: 6
        })
    ));
}

#[tokio::test]
async fn test_csv_with_three_columns_is_rejected() {
    let (dir, data, _) = workspace();
    let csv = dir.path().join("bad.csv");
    fs::write(&csv, "index,response,model\n0,a,m\n").unwrap();
    let evaluator = evaluator(Arc::new(MockLlmProvider::new()));
    let mut request = EvaluationRequest::new("m", EvaluationInput::Path(csv));
    request.output_dir = Some(dir.path().join("out"));
    request.dataset_dir = Some(data);

    let err = evaluator.evaluate(request).await.unwrap_err();
    assert!(matches!(
        err,
        VerityError::Dataset(DatasetError::ColumnCount { found: 3 })
    ));
}
