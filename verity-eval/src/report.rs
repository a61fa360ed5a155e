//! Markdown summary of an evaluation run.

use crate::llm::{Analysis, CombinedResult};
use crate::snowballing::{ALL_TOPICS, TOPICS};
use chrono::{DateTime, Utc};
use std::fmt::Write;

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Render the report for one run.
pub fn render(
    model_name: &str,
    run_id: &str,
    generated_at: DateTime<Utc>,
    result: &CombinedResult,
    analysis: Option<&Analysis>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# LLM factuality report: {}\n", model_name);
    let _ = writeln!(out, "- Run: `{}`", run_id);
    let _ = writeln!(
        out,
        "- Generated: {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if let Some(snowballing) = &result.snowballing {
        out.push_str("## Snowballing\n\n");
        out.push_str("| Topic | Accuracy | Correct | Total |\n|---|---:|---:|---:|\n");
        let topics = TOPICS
            .iter()
            .map(|(topic, _)| *topic)
            .chain(std::iter::once(ALL_TOPICS));
        for topic in topics {
            if let Some(acc) = snowballing.get(topic) {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} |",
                    topic,
                    percent(acc.accuracy),
                    acc.correct,
                    acc.total
                );
            }
        }
        if let Some(a) = analysis.and_then(|a| a.snowballing.as_ref()) {
            out.push_str("\nConfusion matrix:\n\n");
            out.push_str(&a.confusion.to_markdown());
        }
        out.push('\n');
    }

    if let Some(selfaware) = &result.selfaware {
        out.push_str("## Self-awareness\n\n");
        out.push_str("Unanswerable questions are the positive class.\n\n");
        out.push_str("| Metric | Value |\n|---|---:|\n");
        for (name, value) in [
            ("Accuracy", selfaware.accuracy),
            ("Precision", selfaware.precision),
            ("Recall", selfaware.recall),
            ("F1", selfaware.f1),
        ] {
            let _ = writeln!(out, "| {} | {} |", name, percent(value));
        }
        if let Some(a) = analysis.and_then(|a| a.selfaware.as_ref()) {
            out.push_str("\nConfusion matrix:\n\n");
            out.push_str(&a.confusion.to_markdown());
        }
        out.push('\n');
    }

    if let Some(freshqa) = &result.freshqa {
        out.push_str("## FreshQA\n\n");
        let _ = writeln!(
            out,
            "{} of {} answers credited ({}); {} incorrect.\n",
            freshqa.correct,
            freshqa.total,
            percent(freshqa.accuracy),
            freshqa.incorrect
        );
    }

    if !result.freetext.is_empty() {
        out.push_str("## Free-text fact-checking\n\n");
        out.push_str(
            "| Dataset | Responses | Claims | True | False | False ratio | Factual responses | Failed | Tokens |\n\
             |---|---:|---:|---:|---:|---:|---:|---:|---:|\n",
        );
        for (dataset, r) in &result.freetext {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                dataset,
                r.responses,
                r.claims,
                r.true_claims,
                r.false_claims,
                percent(r.false_claim_ratio),
                r.factual_responses,
                r.failed_responses,
                r.token_usage.total()
            );
        }
        out.push('\n');
    }

    out
}
