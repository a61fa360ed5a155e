//! Property-based tests for sentence segmentation using proptest.

use proptest::prelude::*;
use verity_solvers::solvers::sentence_decomposer::split_sentences;

fn non_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

proptest! {
    #[test]
    fn split_preserves_all_visible_characters(text in "[A-Za-z0-9 .!?,'\"\n]{0,200}") {
        let sentences = split_sentences(&text);
        prop_assert_eq!(non_whitespace(&sentences.concat()), non_whitespace(&text));
    }

    #[test]
    fn split_yields_trimmed_non_empty_sentences(text in "[A-Za-z .!?\n]{0,200}") {
        for sentence in split_sentences(&text) {
            prop_assert!(!sentence.is_empty());
            prop_assert_eq!(sentence.trim(), sentence.as_str());
        }
    }

    #[test]
    fn split_of_generated_sentences_recovers_them(
        words in prop::collection::vec("[A-Z][a-z]{2,8}q( [a-z]{2,8}q){0,5}", 1..8)
    ) {
        let sentences: Vec<String> = words.iter().map(|w| format!("{}.", w)).collect();
        let text = sentences.join(" ");
        let split = split_sentences(&text);
        // Words end in 'q' so none of them reads as an abbreviation.
        prop_assert_eq!(split, sentences);
    }

    #[test]
    fn split_never_breaks_decimals(int in 0u32..10_000, frac in 0u32..1000) {
        let text = format!("The value is {}.{} units.", int, frac);
        prop_assert_eq!(split_sentences(&text).len(), 1);
    }
}
