//! FreshQA: questions about a changing world, graded by an LLM rater.

use crate::dataset::FreshQaSample;
use crate::metrics::ratio;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};
use verity_core::error::Result;
use verity_core::prompts::{FRESHQA_RATING, PromptCatalog};
use verity_core::ChatRunner;

static CREDITED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)credited\s*:\s*\**\s*(yes|no)\b").expect("credited pattern is valid")
});

static VERDICT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(incorrect|correct)\b").expect("verdict pattern is valid")
});

/// Read the rater's verdict; `true` = credited.
///
/// An explicit `credited: yes/no` line wins, then the last "correct" or
/// "incorrect" in the reply. Anything else is incorrect.
pub fn parse_rating(reply: &str) -> bool {
    if let Some(caps) = CREDITED.captures_iter(reply).last() {
        return caps[1].eq_ignore_ascii_case("yes");
    }
    VERDICT_WORD
        .captures_iter(reply)
        .last()
        .is_some_and(|caps| caps[1].eq_ignore_ascii_case("correct"))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreshQaResult {
    pub accuracy: f64,
    pub correct: usize,
    pub incorrect: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshQaEvaluation {
    pub result: FreshQaResult,
    pub raw_evaluations: Vec<String>,
    pub predictions: Vec<bool>,
}

/// Shares of credited and uncredited answers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreshQaAnalysis {
    pub correct_share: f64,
    pub incorrect_share: f64,
}

impl FreshQaEvaluation {
    pub fn output_rows(&self) -> Vec<serde_json::Value> {
        self.raw_evaluations
            .iter()
            .zip(&self.predictions)
            .map(|(raw, predicted)| {
                serde_json::json!({ "raw_evaluations": raw, "predictions": predicted })
            })
            .collect()
    }

    pub fn analyze(&self) -> FreshQaAnalysis {
        FreshQaAnalysis {
            correct_share: ratio(self.result.correct, self.result.total),
            incorrect_share: ratio(self.result.incorrect, self.result.total),
        }
    }
}

/// Grades FreshQA responses with the rating prompt.
pub struct FreshQaEvaluator {
    chat: ChatRunner,
    prompts: Arc<PromptCatalog>,
}

impl FreshQaEvaluator {
    /// `rater_model` overrides the runner's model for rating calls.
    pub fn new(
        chat: &ChatRunner,
        prompts: Arc<PromptCatalog>,
        rater_model: Option<String>,
    ) -> Self {
        let chat = match rater_model {
            Some(model) => chat.with_model(Some(model)),
            None => chat.clone(),
        };
        Self { chat, prompts }
    }

    pub async fn evaluate(&self, samples: &[FreshQaSample]) -> Result<FreshQaEvaluation> {
        let batch = samples
            .iter()
            .map(|s| {
                self.prompts.render(
                    FRESHQA_RATING,
                    &[
                        ("question", s.question.as_str()),
                        ("reference_answer", s.reference_answer.as_str()),
                        ("response", s.response.as_str()),
                    ],
                )
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(
            samples = samples.len(),
            model = %self.chat.model_name(),
            "Rating FreshQA responses"
        );
        let raw_evaluations = self.chat.run_text(batch).await?;
        let predictions: Vec<bool> = raw_evaluations.iter().map(|r| parse_rating(r)).collect();

        let unrated = raw_evaluations
            .iter()
            .filter(|r| !CREDITED.is_match(r) && !VERDICT_WORD.is_match(r))
            .count();
        if unrated > 0 {
            warn!(unrated, "Rater replies without a verdict were scored incorrect");
        }

        let correct = predictions.iter().filter(|p| **p).count();
        let total = predictions.len();
        let result = FreshQaResult {
            accuracy: ratio(correct, total),
            correct,
            incorrect: total - correct,
            total,
        };
        info!(accuracy = result.accuracy, "FreshQA evaluation finished");

        Ok(FreshQaEvaluation {
            result,
            raw_evaluations,
            predictions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_core::brain::MockLlmProvider;
    use verity_core::chat::ChatOptions;

    #[test]
    fn test_parse_credited_line() {
        assert!(parse_rating("The answer matches.\ncredited: yes"));
        assert!(!parse_rating("Outdated, the CEO changed.\nCredited: No"));
        assert!(parse_rating("It is incorrect to say otherwise.\ncredited: **yes**"));
    }

    #[test]
    fn test_parse_verdict_words() {
        assert!(parse_rating("The response is correct."));
        assert!(!parse_rating("Correct name, but the date is incorrect."));
        assert!(!parse_rating("I cannot tell."));
    }

    fn sample(question: &str, reference: &str, response: &str) -> FreshQaSample {
        FreshQaSample {
            question: question.to_string(),
            reference_answer: reference.to_string(),
            response: response.to_string(),
        }
    }

    #[tokio::test]
    async fn test_evaluate_scores_in_order() {
        let mock = Arc::new(MockLlmProvider::new());
        mock.queue_text("Matches.\ncredited: yes");
        mock.queue_text("Wrong year.\ncredited: no");
        mock.queue_text("No verdict here");
        let chat = ChatRunner::new(
            mock.clone(),
            ChatOptions {
                concurrency: 1,
                ..ChatOptions::default()
            },
        );
        let evaluator = FreshQaEvaluator::new(
            &chat,
            Arc::new(PromptCatalog::builtin().unwrap()),
            Some("rater-model".to_string()),
        );

        let samples = vec![
            sample("Who won?", "Ada", "Ada won."),
            sample("When?", "2024", "In 2019."),
            sample("Where?", "Oslo", "Somewhere."),
        ];
        let eval = evaluator.evaluate(&samples).await.unwrap();
        assert_eq!(eval.predictions, vec![true, false, false]);
        assert_eq!(eval.result.correct, 1);
        assert_eq!(eval.result.incorrect, 2);
        assert!((eval.result.accuracy - 1.0 / 3.0).abs() < 1e-12);

        let requests = mock.requests();
        assert_eq!(requests[0].model.as_deref(), Some("rater-model"));
        assert!(requests[1].messages[1].content.contains("correct answer(s): 2024"));

        let analysis = eval.analyze();
        assert!((analysis.correct_share + analysis.incorrect_share - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_evaluate_empty() {
        let chat = ChatRunner::new(Arc::new(MockLlmProvider::new()), ChatOptions::default());
        let evaluator =
            FreshQaEvaluator::new(&chat, Arc::new(PromptCatalog::builtin().unwrap()), None);
        let eval = evaluator.evaluate(&[]).await.unwrap();
        assert_eq!(eval.result.total, 0);
        assert_eq!(eval.result.accuracy, 0.0);
    }
}
