//! Rule-based sentence segmentation.

use crate::registry::{Solver, SolverArgs, SolverContext, SolverIo, SolverOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use verity_core::error::SolverError;
use verity_core::types::FactCheckerState;

pub const NAME: &str = "sentence_decomposer";

/// Tokens that end with a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "etc", "e.g", "i.e", "cf",
    "al", "approx", "inc", "ltd", "co", "corp", "dept", "est", "fig", "no", "vol", "gen", "gov",
    "sen", "rep", "col", "lt", "sgt", "capt", "u.s", "u.k", "u.n", "jan", "feb", "mar", "apr",
    "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

/// Splits `response` into sentences.
pub struct SentenceDecomposer {
    io: SolverIo,
}

pub fn factory(
    io: SolverIo,
    _args: &SolverArgs,
    _ctx: &SolverContext,
) -> Result<Arc<dyn Solver>, SolverError> {
    Ok(Arc::new(SentenceDecomposer { io }))
}

#[async_trait]
impl Solver for SentenceDecomposer {
    fn name(&self) -> &str {
        NAME
    }

    fn io(&self) -> &SolverIo {
        &self.io
    }

    async fn solve(&self, state: &mut FactCheckerState) -> Result<SolverOutcome, SolverError> {
        let text: String = state.get_as(&self.io.input)?;
        let sentences = split_sentences(&text);
        info!(count = sentences.len(), "The document is split into sentences");
        state.set(&self.io.output, sentences)?;
        Ok(SolverOutcome::Continue)
    }
}

/// Split text into trimmed, non-empty sentences.
///
/// Line breaks always end a sentence. Inside a line, a run of `.`, `!` or `?`
/// (plus closing quotes or brackets) ends a sentence when it is followed by
/// whitespace and the next word does not start in lower case. A period after
/// a known abbreviation or a single-letter initial does not end a sentence;
/// decimals never do since the period is not followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for line in text.lines() {
        split_line(line, &mut sentences);
    }
    sentences
}

fn split_line(line: &str, out: &mut Vec<String>) {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if !is_terminator(c) {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && (is_terminator(chars[j].1) || is_closing(chars[j].1)) {
            j += 1;
        }

        let boundary = if j == chars.len() {
            true
        } else {
            chars[j].1.is_whitespace()
                && next_word_starts_sentence(&chars[j..])
                && !(c == '.' && ends_with_abbreviation(&line[..pos]))
        };

        if boundary {
            let end = chars.get(j).map_or(line.len(), |&(p, _)| p);
            push_trimmed(&line[start..end], out);
            start = end;
        }
        i = j;
    }
    push_trimmed(&line[start..], out);
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}')
}

fn next_word_starts_sentence(rest: &[(usize, char)]) -> bool {
    match rest.iter().map(|&(_, c)| c).find(|c| !c.is_whitespace()) {
        Some(c) => !c.is_lowercase(),
        None => true,
    }
}

fn ends_with_abbreviation(before_dot: &str) -> bool {
    let token = before_dot
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| matches!(c, '(' | '[' | '"' | '\'' | '\u{201C}'));
    if token.is_empty() {
        return false;
    }
    let mut letters = token.chars();
    if let (Some(first), None) = (letters.next(), letters.next())
        && first.is_alphabetic()
        && first.is_uppercase()
    {
        return true;
    }
    let lower = token.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str())
}

fn push_trimmed(segment: &str, out: &mut Vec<String>) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_split() {
        assert_eq!(
            split_sentences("The sky is blue. Grass is green! Is water wet?"),
            vec!["The sky is blue.", "Grass is green!", "Is water wet?"]
        );
    }

    #[test]
    fn test_abbreviations_and_initials() {
        assert_eq!(
            split_sentences("Dr. Smith met J. K. Rowling in the U.S. in 2001. They talked."),
            vec![
                "Dr. Smith met J. K. Rowling in the U.S. in 2001.",
                "They talked."
            ]
        );
    }

    #[test]
    fn test_decimals_and_lowercase_continuation() {
        assert_eq!(
            split_sentences("Pi is about 3.14 and e is approx. 2.72. Both are irrational."),
            vec![
                "Pi is about 3.14 and e is approx. 2.72.",
                "Both are irrational."
            ]
        );
    }

    #[test]
    fn test_closing_quotes_stay_with_sentence() {
        assert_eq!(
            split_sentences("He said \"stop.\" Then he left."),
            vec!["He said \"stop.\"", "Then he left."]
        );
    }

    #[test]
    fn test_line_breaks_and_blank_lines() {
        assert_eq!(
            split_sentences("First line\n\n  Second line.  \nThird"),
            vec!["First line", "Second line.", "Third"]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n\t").is_empty());
    }

    #[tokio::test]
    async fn test_solver_writes_sentences() {
        let solver = SentenceDecomposer {
            io: SolverIo::new("response", "sentences"),
        };
        let mut state = FactCheckerState::new("One. Two.", None);
        solver.solve(&mut state).await.unwrap();
        let sentences: Vec<String> = state.get_as("sentences").unwrap();
        assert_eq!(sentences, vec!["One.", "Two."]);
    }
}
