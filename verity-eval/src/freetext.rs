//! Free-text datasets: every response goes through the claim pipeline.

use crate::dataset::FreeTextSample;
use crate::metrics::ratio;
use crate::response::ResponseEvaluator;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};
use verity_core::types::TokenUsage;

/// The pipeline's findings for one free-text response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeTextRecord {
    pub source: String,
    pub prompt: String,
    pub response: String,
    pub claims: Vec<String>,
    pub true_claims: usize,
    pub false_claims: usize,
    pub label: Option<bool>,
    pub halted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate over one dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FreeTextResult {
    pub responses: usize,
    pub claims: usize,
    pub true_claims: usize,
    pub false_claims: usize,
    pub false_claim_ratio: f64,
    pub factual_responses: usize,
    pub failed_responses: usize,
    pub elapsed_secs: f64,
    pub token_usage: TokenUsage,
}

impl FreeTextResult {
    fn from_records(
        records: &[FreeTextRecord],
        elapsed_secs: f64,
        token_usage: TokenUsage,
    ) -> Self {
        let true_claims = records.iter().map(|r| r.true_claims).sum();
        let false_claims = records.iter().map(|r| r.false_claims).sum();
        Self {
            responses: records.len(),
            claims: records.iter().map(|r| r.claims.len()).sum(),
            true_claims,
            false_claims,
            false_claim_ratio: ratio(false_claims, true_claims + false_claims),
            factual_responses: records.iter().filter(|r| r.label == Some(true)).count(),
            failed_responses: records.iter().filter(|r| r.error.is_some()).count(),
            elapsed_secs,
            token_usage,
        }
    }
}

/// Claim counts per dataset, the free-text entry of `analysis.json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FreeTextAnalysis {
    pub true_claims: usize,
    pub false_claims: usize,
    pub factual_responses: usize,
    pub non_factual_responses: usize,
}

impl From<&FreeTextResult> for FreeTextAnalysis {
    fn from(result: &FreeTextResult) -> Self {
        Self {
            true_claims: result.true_claims,
            false_claims: result.false_claims,
            factual_responses: result.factual_responses,
            non_factual_responses: result.responses
                - result.factual_responses
                - result.failed_responses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeTextEvaluation {
    pub result: FreeTextResult,
    pub records: Vec<FreeTextRecord>,
}

impl FreeTextEvaluation {
    pub fn analyze(&self) -> FreeTextAnalysis {
        FreeTextAnalysis::from(&self.result)
    }
}

pub struct FreeTextEvaluator {
    evaluator: ResponseEvaluator,
}

impl FreeTextEvaluator {
    pub fn new(evaluator: ResponseEvaluator) -> Self {
        Self { evaluator }
    }

    /// Fact-check every sample in order; the prompt is passed as the question.
    ///
    /// A response whose pipeline run fails is recorded with its error.
    pub async fn evaluate(&self, samples: &[FreeTextSample]) -> FreeTextEvaluation {
        let started = Instant::now();
        let usage_before = self.evaluator.usage();
        let mut records = Vec::with_capacity(samples.len());

        for (i, sample) in samples.iter().enumerate() {
            let mut record = FreeTextRecord {
                source: sample.source.clone(),
                prompt: sample.prompt.clone(),
                response: sample.response.clone(),
                claims: Vec::new(),
                true_claims: 0,
                false_claims: 0,
                label: None,
                halted_at: None,
                error: None,
            };
            match self
                .evaluator
                .evaluate(&sample.response, Some(&sample.prompt))
                .await
            {
                Ok(eval) => {
                    record.true_claims = eval.true_claims();
                    record.false_claims = eval.false_claims();
                    record.claims = eval.claims;
                    record.label = eval.label;
                    record.halted_at = eval.halted_at;
                }
                Err(e) => {
                    warn!(index = i, source = %sample.source, error = %e, "Fact-checking failed");
                    record.error = Some(e.to_string());
                }
            }
            records.push(record);
        }

        let usage_after = self.evaluator.usage();
        let token_usage = TokenUsage {
            input_tokens: usage_after.input_tokens - usage_before.input_tokens,
            output_tokens: usage_after.output_tokens - usage_before.output_tokens,
        };
        let result = FreeTextResult::from_records(
            &records,
            started.elapsed().as_secs_f64(),
            token_usage,
        );
        info!(
            responses = result.responses,
            claims = result.claims,
            false_claims = result.false_claims,
            failed = result.failed_responses,
            "Free-text evaluation finished"
        );
        FreeTextEvaluation { result, records }
    }
}
