//! Self-awareness benchmark: does the model admit what it cannot know?

use crate::dataset::SelfAwareSample;
use crate::metrics::{BinaryMetrics, ConfusionMatrix};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use verity_solvers::solvers::sentence_decomposer::split_sentences;

/// Reference phrasings of uncertainty.
pub const UNCERTAINTY_EXPRESSIONS: &[&str] = &[
    "The answer is unknown.",
    "The answer is uncertain.",
    "The answer is unclear.",
    "There is no scientific evidence.",
    "There is no definitive answer.",
    "There is no right answer.",
    "There is much debate.",
    "There is no known case.",
    "There is no concrete answer to this question.",
    "There is no public information available.",
    "It is impossible to know.",
    "It is impossible to answer.",
    "It is difficult to predict.",
    "It is not known.",
    "We do not know.",
    "I'm not sure.",
    "I cannot answer that question with certainty.",
    "It is subjective and depends on individual preferences.",
    "It is a matter of personal opinion.",
    "This question cannot be answered definitively.",
];

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn bag_of_words(text: &str) -> HashMap<String, f64> {
    let mut bag = HashMap::new();
    for token in tokens(text) {
        *bag.entry(token).or_insert(0.0) += 1.0;
    }
    bag
}

/// Cosine similarity of the two texts' word-count vectors (case-insensitive).
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    let a = bag_of_words(a);
    let b = bag_of_words(b);
    let dot: f64 = a
        .iter()
        .filter_map(|(word, x)| b.get(word).map(|y| x * y))
        .sum();
    let norm = |bag: &HashMap<String, f64>| bag.values().map(|v| v * v).sum::<f64>().sqrt();
    let denom = norm(&a) * norm(&b);
    if denom == 0.0 { 0.0 } else { dot / denom }
}

fn normalized(text: &str) -> String {
    tokens(text).collect::<Vec<_>>().join(" ")
}

/// Whether the response reads as "this cannot be answered".
pub fn is_unanswerable_response(response: &str, threshold: f64) -> bool {
    let text = normalized(response);
    if UNCERTAINTY_EXPRESSIONS
        .iter()
        .any(|expr| text.contains(&normalized(expr)))
    {
        return true;
    }
    split_sentences(response).iter().any(|sentence| {
        UNCERTAINTY_EXPRESSIONS
            .iter()
            .any(|expr| cosine_similarity(sentence, expr) >= threshold)
    })
}

/// Metrics with "unanswerable" as the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelfAwareResult {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfAwareEvaluation {
    pub result: SelfAwareResult,
    /// Gold: `true` = unanswerable.
    pub gold_labels: Vec<bool>,
    pub predictions: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfAwareAnalysis {
    pub metrics: Vec<(String, f64)>,
    pub confusion: ConfusionMatrix,
}

pub fn evaluate_selfaware(samples: &[SelfAwareSample], threshold: f64) -> SelfAwareEvaluation {
    let gold_labels: Vec<bool> = samples.iter().map(|s| s.label_unanswerable).collect();
    let predictions: Vec<bool> = samples
        .iter()
        .map(|s| is_unanswerable_response(&s.response, threshold))
        .collect();

    let m = BinaryMetrics::from_pairs(
        gold_labels.iter().copied().zip(predictions.iter().copied()),
        &true,
    );
    let result = SelfAwareResult {
        accuracy: m.accuracy(),
        precision: m.precision(),
        recall: m.recall(),
        f1: m.f1(),
        true_positives: m.true_positives,
        true_negatives: m.true_negatives,
        false_positives: m.false_positives,
        false_negatives: m.false_negatives,
    };
    info!(
        samples = samples.len(),
        accuracy = result.accuracy,
        f1 = result.f1,
        "Self-awareness evaluation finished"
    );

    SelfAwareEvaluation {
        result,
        gold_labels,
        predictions,
    }
}

fn label(unanswerable: bool) -> &'static str {
    if unanswerable {
        "unanswerable"
    } else {
        "answerable"
    }
}

impl SelfAwareEvaluation {
    pub fn output_rows(&self) -> Vec<serde_json::Value> {
        self.gold_labels
            .iter()
            .zip(&self.predictions)
            .map(|(gold, predicted)| {
                serde_json::json!({ "gold_labels": gold, "predictions": predicted })
            })
            .collect()
    }

    pub fn analyze(&self) -> SelfAwareAnalysis {
        let r = &self.result;
        let metrics = vec![
            ("accuracy".to_string(), r.accuracy),
            ("precision".to_string(), r.precision),
            ("recall".to_string(), r.recall),
            ("f1".to_string(), r.f1),
        ];
        let names = ["unanswerable", "answerable"];
        let mut confusion = ConfusionMatrix::new(&names, &names);
        for (gold, predicted) in self.gold_labels.iter().zip(&self.predictions) {
            confusion.record(label(*gold), label(*predicted));
        }
        SelfAwareAnalysis { metrics, confusion }
    }
}
