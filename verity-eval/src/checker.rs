//! Scoring a fact-checker's verdicts against gold labels.
//!
//! Input is a CSV with `label` and `prediction` columns holding boolean-ish
//! values.

use crate::metrics::{BinaryMetrics, ClassScores};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;
use verity_core::error::{DatasetError, Result};

const LABEL_COLUMN: &str = "label";
const PREDICTION_COLUMN: &str = "prediction";

/// `true/false`, `1/0`, `yes/no` and `t/f`, case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "t" | "y" => Some(true),
        "false" | "0" | "no" | "f" | "n" => Some(false),
        _ => None,
    }
}

/// `(label, prediction)` pairs from CSV content; `origin` only labels errors.
pub fn read_checker_csv<R: Read>(reader: R, origin: &Path) -> Result<Vec<(bool, bool)>> {
    let csv_error = |message: String| DatasetError::Csv {
        path: origin.to_path_buf(),
        message,
    };
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers().map_err(|e| csv_error(e.to_string()))?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| csv_error(format!("missing '{}' column", name)))
    };
    let label_at = column(LABEL_COLUMN)?;
    let prediction_at = column(PREDICTION_COLUMN)?;

    let mut pairs = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(e.to_string()))?;
        let cell = |at: usize, name: &str| {
            let raw = record.get(at).unwrap_or("");
            parse_bool(raw).ok_or_else(|| DatasetError::InvalidValue {
                row,
                column: name.to_string(),
                value: raw.to_string(),
            })
        };
        pairs.push((cell(label_at, LABEL_COLUMN)?, cell(prediction_at, PREDICTION_COLUMN)?));
    }
    Ok(pairs)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerResult {
    pub total: usize,
    pub accuracy: f64,
    /// Scores with factual (`True`) claims as the positive class.
    #[serde(rename = "True")]
    pub true_class: ClassScores,
    /// Scores with non-factual (`False`) claims as the positive class.
    #[serde(rename = "False")]
    pub false_class: ClassScores,
    pub counts: BinaryMetrics,
}

impl CheckerResult {
    pub fn from_pairs(pairs: &[(bool, bool)]) -> Self {
        let counts = BinaryMetrics::from_pairs(pairs.iter().copied(), &true);
        Self {
            total: counts.total(),
            accuracy: counts.accuracy(),
            true_class: counts.class_scores(),
            false_class: counts.flipped().class_scores(),
            counts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckerOutcome {
    pub run_id: String,
    pub result: CheckerResult,
    pub result_path: PathBuf,
}

/// Scores fact-checker output and writes `checker_result.json` under its run id.
pub struct CheckerEvaluator {
    run_id: String,
    output_dir: PathBuf,
}

impl CheckerEvaluator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        info!(run_id = %run_id, "Checker evaluator initialized");
        Self {
            run_id,
            output_dir: output_dir.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn evaluate_path(&self, input: &Path) -> Result<CheckerOutcome> {
        info!(path = %input.display(), "Reading fact-checker predictions");
        let file = fs::File::open(input).map_err(|source| DatasetError::Io {
            path: input.to_path_buf(),
            source,
        })?;
        let pairs = read_checker_csv(file, input)?;
        self.evaluate_pairs(&pairs)
    }

    pub fn evaluate_pairs(&self, pairs: &[(bool, bool)]) -> Result<CheckerOutcome> {
        let result = CheckerResult::from_pairs(pairs);
        let run_dir = self.output_dir.join(&self.run_id);
        fs::create_dir_all(&run_dir)?;
        let result_path = run_dir.join("checker_result.json");
        fs::write(&result_path, serde_json::to_string_pretty(&result)?)?;
        info!(
            total = result.total,
            accuracy = result.accuracy,
            path = %result_path.display(),
            "Checker evaluation finished"
        );
        Ok(CheckerOutcome {
            run_id: self.run_id.clone(),
            result,
            result_path,
        })
    }
}
