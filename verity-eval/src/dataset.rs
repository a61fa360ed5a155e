//! Benchmark datasets and the per-dataset view of combined rows.

use crate::loader::CombinedRow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;
use verity_core::error::DatasetError;

/// `source` values that make up the self-awareness benchmark.
pub const SELFAWARE_SOURCES: &[&str] = &[
    "selfaware-hotpot_train",
    "selfaware-squadqa_train",
    "selfaware-triviaqa_train",
    "selfaware-squadqa_dev",
    "selfaware-hotpot_dev",
    "selfaware-triviaqa_dev",
    "selfaware-SelfAware",
];

/// `source` values that make up the FactScore biography benchmark.
pub const FACTSCORE_SOURCES: &[&str] = &["factscore-labelled", "factscore-unlabelled"];

/// A supported benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dataset {
    #[serde(rename = "snowballing")]
    Snowballing,
    #[serde(rename = "selfaware")]
    SelfAware,
    #[serde(rename = "freshqa")]
    FreshQa,
    #[serde(rename = "factoolqa")]
    FactoolQa,
    #[serde(rename = "felm-wk")]
    FelmWk,
    #[serde(rename = "factcheck-bench")]
    FactcheckBench,
    #[serde(rename = "factscore-bio")]
    FactscoreBio,
}

impl Dataset {
    pub const ALL: [Dataset; 7] = [
        Dataset::Snowballing,
        Dataset::SelfAware,
        Dataset::FreshQa,
        Dataset::FactoolQa,
        Dataset::FelmWk,
        Dataset::FactcheckBench,
        Dataset::FactscoreBio,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Snowballing => "snowballing",
            Dataset::SelfAware => "selfaware",
            Dataset::FreshQa => "freshqa",
            Dataset::FactoolQa => "factoolqa",
            Dataset::FelmWk => "felm-wk",
            Dataset::FactcheckBench => "factcheck-bench",
            Dataset::FactscoreBio => "factscore-bio",
        }
    }

    /// Free-text datasets are judged by the claim pipeline.
    pub fn is_freetext(&self) -> bool {
        matches!(
            self,
            Dataset::FactoolQa
                | Dataset::FelmWk
                | Dataset::FactcheckBench
                | Dataset::FactscoreBio
        )
    }

    fn matches_source(&self, source: &str) -> bool {
        match self {
            Dataset::SelfAware => SELFAWARE_SOURCES.contains(&source),
            Dataset::FactscoreBio => FACTSCORE_SOURCES.contains(&source),
            other => source == other.name(),
        }
    }

    /// Parse a list of names, failing on the first unsupported one.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Dataset>, DatasetError> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Dataset::ALL
            .into_iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| DatasetError::Unsupported(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnowballingSample {
    pub topic: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfAwareSample {
    pub label_unanswerable: bool,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshQaSample {
    pub question: String,
    pub reference_answer: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTextSample {
    pub source: String,
    pub prompt: String,
    pub response: String,
}

/// The rows of one dataset, shaped for its evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum FilteredResponses {
    Snowballing(Vec<SnowballingSample>),
    SelfAware(Vec<SelfAwareSample>),
    FreshQa(Vec<FreshQaSample>),
    FreeText(Vec<FreeTextSample>),
}

impl FilteredResponses {
    pub fn len(&self) -> usize {
        match self {
            Self::Snowballing(v) => v.len(),
            Self::SelfAware(v) => v.len(),
            Self::FreshQa(v) => v.len(),
            Self::FreeText(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `ability_to_test` with its `answerable:` prefix removed equals `False`.
fn is_unanswerable(ability_to_test: &str) -> bool {
    let value = ability_to_test.trim();
    let value = value.strip_prefix("answerable:").unwrap_or(value);
    value.trim() == "False"
}

/// Select the rows belonging to `dataset` and keep the fields its evaluator needs.
pub fn filter_responses(
    rows: &[CombinedRow],
    dataset: Dataset,
) -> Result<FilteredResponses, DatasetError> {
    info!(dataset = %dataset, "Filtering responses");
    let selected = rows.iter().filter(|row| dataset.matches_source(row.source()));

    let filtered = match dataset {
        Dataset::Snowballing => FilteredResponses::Snowballing(
            selected
                .map(|row| {
                    Ok(SnowballingSample {
                        topic: row.text_field("topic")?,
                        response: row.response.clone(),
                    })
                })
                .collect::<Result<Vec<_>, DatasetError>>()?,
        ),
        Dataset::SelfAware => FilteredResponses::SelfAware(
            selected
                .map(|row| {
                    Ok(SelfAwareSample {
                        label_unanswerable: is_unanswerable(&row.text_field("ability_to_test")?),
                        response: row.response.clone(),
                    })
                })
                .collect::<Result<Vec<_>, DatasetError>>()?,
        ),
        Dataset::FreshQa => FilteredResponses::FreshQa(
            selected
                .map(|row| {
                    Ok(FreshQaSample {
                        question: row.text_field("question")?,
                        reference_answer: row.text_field("reference_answer")?,
                        response: row.response.clone(),
                    })
                })
                .collect::<Result<Vec<_>, DatasetError>>()?,
        ),
        _ => FilteredResponses::FreeText(
            selected
                .map(|row| {
                    Ok(FreeTextSample {
                        source: row.source().to_string(),
                        prompt: row.text_field("prompt")?,
                        response: row.response.clone(),
                    })
                })
                .collect::<Result<Vec<_>, DatasetError>>()?,
        ),
    };
    Ok(filtered)
}
