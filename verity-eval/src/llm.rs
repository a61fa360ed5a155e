//! End-to-end evaluation of one model's responses across the benchmarks.
//!
//! A run loads the responses and the benchmark questions, evaluates each
//! requested dataset in order and writes everything under
//! `{output_dir}/{run_id}`:
//!
//! * `{dataset}_output.jsonl` per dataset
//! * `result.json` with the combined result
//! * `analysis.json` and `report.md` when requested

use crate::dataset::{Dataset, FilteredResponses, filter_responses};
use crate::freetext::{FreeTextAnalysis, FreeTextEvaluator, FreeTextResult};
use crate::freshqa::{FreshQaAnalysis, FreshQaEvaluator, FreshQaResult};
use crate::loader::{ResponseSet, read_input};
use crate::report;
use crate::response::ResponseEvaluator;
use crate::selfaware::{SelfAwareAnalysis, SelfAwareResult, evaluate_selfaware};
use crate::snowballing::{SnowballingAnalysis, TopicAccuracy, evaluate_snowballing};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use verity_core::config::VerityConfig;
use verity_core::error::Result;
use verity_solvers::{SolverContext, SolverRegistry};

/// Where the model's responses come from.
#[derive(Debug, Clone)]
pub enum EvaluationInput {
    /// A two-column CSV file.
    Path(PathBuf),
    Responses(ResponseSet),
}

#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub model_name: String,
    pub input: EvaluationInput,
    /// Defaults to `evaluator.output_dir`.
    pub output_dir: Option<PathBuf>,
    /// Defaults to `evaluator.dataset_dir`.
    pub dataset_dir: Option<PathBuf>,
    /// Empty means `evaluator.datasets`.
    pub datasets: Vec<String>,
    pub analyze: bool,
    pub save_report: bool,
}

impl EvaluationRequest {
    pub fn new(model_name: impl Into<String>, input: EvaluationInput) -> Self {
        Self {
            model_name: model_name.into(),
            input,
            output_dir: None,
            dataset_dir: None,
            datasets: Vec::new(),
            analyze: true,
            save_report: true,
        }
    }
}

/// Results of every evaluated dataset; free-text datasets sit under `freetext`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snowballing: Option<BTreeMap<String, TopicAccuracy>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selfaware: Option<SelfAwareResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshqa: Option<FreshQaResult>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub freetext: BTreeMap<String, FreeTextResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snowballing: Option<SnowballingAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selfaware: Option<SelfAwareAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshqa: Option<FreshQaAnalysis>,
    /// True and false claim counts per free-text dataset.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub freetext: BTreeMap<String, FreeTextAnalysis>,
}

#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub result: CombinedResult,
    pub analysis: Option<Analysis>,
    pub report_path: Option<PathBuf>,
}

/// Evaluates a model's responses over the benchmark datasets.
pub struct LlmEvaluator {
    run_id: String,
    config: Arc<VerityConfig>,
    freshqa: FreshQaEvaluator,
    freetext: FreeTextEvaluator,
}

impl LlmEvaluator {
    /// Build the evaluators from the shared solver context.
    ///
    /// The free-text datasets are checked with `ctx.config.pipeline`.
    pub fn new(ctx: &SolverContext, registry: &SolverRegistry) -> Result<Self> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let config = ctx.config.clone();
        let freshqa = FreshQaEvaluator::new(
            &ctx.chat,
            ctx.prompts.clone(),
            config.evaluator.freshqa_model.clone(),
        );
        let freetext = FreeTextEvaluator::new(ResponseEvaluator::from_config(
            &config.pipeline,
            registry,
            ctx,
        )?);
        info!(run_id = %run_id, "LLM evaluator initialized");
        Ok(Self {
            run_id,
            config,
            freshqa,
            freetext,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn limited<'a, T>(&self, samples: &'a [T]) -> &'a [T] {
        match self.config.evaluator.sample_limit {
            0 => samples,
            limit => &samples[..samples.len().min(limit)],
        }
    }

    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationOutcome> {
        info!(model = %request.model_name, "Evaluating LLM responses");
        let evaluator_config = &self.config.evaluator;

        let names = if request.datasets.is_empty() {
            evaluator_config.datasets.clone()
        } else {
            request.datasets.clone()
        };
        let datasets = Dataset::parse_list(&names)?;

        let output_dir = request
            .output_dir
            .clone()
            .unwrap_or_else(|| evaluator_config.output_dir.clone());
        let dataset_dir = request
            .dataset_dir
            .clone()
            .unwrap_or_else(|| evaluator_config.dataset_dir.clone());
        let run_dir = output_dir.join(&self.run_id);
        fs::create_dir_all(&run_dir)?;

        let responses = match &request.input {
            EvaluationInput::Path(path) => ResponseSet::from_csv_path(path)?,
            EvaluationInput::Responses(set) => set.clone(),
        };
        let rows = read_input(&responses, &dataset_dir)?;
        info!(rows = rows.len(), "Combined data loaded");

        let mut result = CombinedResult::default();
        let mut analysis = Analysis::default();
        for dataset in datasets {
            info!(dataset = %dataset, "Evaluating responses for dataset");
            let output_path = run_dir.join(format!("{}_output.jsonl", dataset));
            match filter_responses(&rows, dataset)? {
                FilteredResponses::Snowballing(samples) => {
                    let eval = evaluate_snowballing(&samples)?;
                    write_jsonl(&output_path, &eval.output_rows())?;
                    analysis.snowballing = Some(eval.analyze());
                    result.snowballing = Some(eval.result);
                }
                FilteredResponses::SelfAware(samples) => {
                    let eval = evaluate_selfaware(
                        self.limited(&samples),
                        evaluator_config.selfaware_threshold,
                    );
                    write_jsonl(&output_path, &eval.output_rows())?;
                    analysis.selfaware = Some(eval.analyze());
                    result.selfaware = Some(eval.result);
                }
                FilteredResponses::FreshQa(samples) => {
                    let eval = self.freshqa.evaluate(self.limited(&samples)).await?;
                    write_jsonl(&output_path, &eval.output_rows())?;
                    analysis.freshqa = Some(eval.analyze());
                    result.freshqa = Some(eval.result);
                }
                FilteredResponses::FreeText(samples) => {
                    let eval = self.freetext.evaluate(self.limited(&samples)).await;
                    write_jsonl(&output_path, &eval.records)?;
                    analysis.freetext.insert(dataset.to_string(), eval.analyze());
                    result.freetext.insert(dataset.to_string(), eval.result);
                }
            }
            info!(dataset = %dataset, "Finished evaluating responses for dataset");
        }

        fs::write(
            run_dir.join("result.json"),
            serde_json::to_string_pretty(&result)?,
        )?;

        let analysis = if request.analyze {
            info!("Analyzing the results");
            fs::write(
                run_dir.join("analysis.json"),
                serde_json::to_string_pretty(&analysis)?,
            )?;
            Some(analysis)
        } else {
            None
        };

        let report_path = if request.save_report {
            info!("Creating the report");
            let markdown = report::render(
                &request.model_name,
                &self.run_id,
                chrono::Utc::now(),
                &result,
                analysis.as_ref(),
            );
            let path = run_dir.join("report.md");
            fs::write(&path, markdown)?;
            Some(path)
        } else {
            None
        };

        info!(run_dir = %run_dir.display(), "LLM evaluation finished");
        Ok(EvaluationOutcome {
            run_id: self.run_id.clone(),
            run_dir,
            result,
            analysis,
            report_path,
        })
    }
}

/// One JSON document per line.
pub(crate) fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
