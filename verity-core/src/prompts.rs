//! Prompt templates for the claim pipeline and the FreshQA rater.
//!
//! The built-in catalog is a YAML document mapping a prompt name to a
//! `system` and a `user` template. Placeholders are written `{name}` and are
//! filled in a single pass, so substituted text is never re-expanded.

use crate::error::PromptError;
use crate::types::Message;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const CLAIM_EXTRACTION: &str = "claim_extraction";
pub const QUERY_GENERATION: &str = "query_generation";
pub const VERIFICATION: &str = "verification";
pub const CLAIM_REVISION: &str = "claim_revision";
pub const FRESHQA_RATING: &str = "freshqa_rating";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

const BUILTIN_PROMPTS: &str = r#"
claim_extraction:
  system: |
    You are a brilliant assistant who breaks text into atomic, self-contained factual claims.
  user: |
    Decompose the text below into a list of atomic claims. Each claim must be a single
    verifiable statement of fact that can be understood without the rest of the text.
    Replace pronouns with the entities they refer to. Skip opinions, questions and
    statements that carry no factual content.

    Answer with a JSON list of objects, each with a single key "claim", for example:
    [{"claim": "Paris is the capital of France."}]

    Text: {response}
query_generation:
  system: |
    You are a query generator that designs search queries to verify a factual claim.
  user: |
    Write two Google search queries whose results would help verify the claim below.
    The first query should restate the claim; the second should target the detail most
    likely to be wrong.

    Answer with a JSON list of strings, for example:
    ["Paris capital of France", "capital city of France"]

    Claim: {claim}
verification:
  system: |
    You are a careful fact-checker. You judge a claim only against the evidence you are given.
  user: |
    Decide whether the claim is factual given the evidence. When the evidence contradicts
    the claim, explain the error and propose a corrected claim.

    Answer with a JSON object with the keys "reasoning", "error", "correction" and
    "factuality" (true or false), for example:
    {"reasoning": "The evidence states ...", "error": "none", "correction": "none", "factuality": true}

    Claim: {claim}
    Evidence:
    {evidence}
claim_revision:
  system: |
    You are an editor who rewrites incorrect statements so they agree with the evidence.
  user: |
    Rewrite the claim so that it is consistent with the evidence. Keep its wording as
    close to the original as possible and change only what is wrong.

    Answer with a JSON object with a single key "text", for example:
    {"text": "Paris is the capital of France."}

    Claim: {claim}
    Suggested correction: {correction}
    Evidence:
    {evidence}
freshqa_rating:
  system: |
    You are a grader of answers to questions about the present-day world.
  user: |
    Please evaluate the response to the question under a relaxed evaluation, where
    hallucinations, outdated information and ill-formed answers are allowed, as long as
    the primary answer is accurate. Compare the response with the correct answers.

    question: {question}
    correct answer(s): {reference_answer}
    response: {response}

    Explain your reasoning in one or two sentences, then finish with a line of the form
    "credited: yes" or "credited: no".
"#;

/// A two-part chat prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    #[serde(skip)]
    pub name: String,
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    /// Fill both templates and return the `[system, user]` conversation.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<Vec<Message>, PromptError> {
        Ok(vec![
            Message::system(self.fill(&self.system, vars)?.trim_end()),
            Message::user(self.fill(&self.user, vars)?.trim_end()),
        ])
    }

    /// Placeholder names used by the user template, in order of first use.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.user) {
            let name = caps[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn fill(&self, template: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let mut missing: Option<String> = None;
        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            match vars.iter().find(|(k, _)| *k == key) {
                Some((_, value)) => value.to_string(),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    caps[0].to_string()
                }
            }
        });
        match missing {
            Some(placeholder) => Err(PromptError::MissingVariable {
                name: self.name.clone(),
                placeholder,
            }),
            None => Ok(rendered.into_owned()),
        }
    }
}

/// Named prompt templates.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    templates: BTreeMap<String, PromptTemplate>,
}

impl PromptCatalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, PromptError> {
        Self::from_yaml(BUILTIN_PROMPTS)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PromptError> {
        let mut templates: BTreeMap<String, PromptTemplate> =
            serde_yaml::from_str(yaml).map_err(|e| PromptError::Parse {
                message: e.to_string(),
            })?;
        for (name, template) in templates.iter_mut() {
            template.name = name.clone();
        }
        Ok(Self { templates })
    }

    pub fn get(&self, name: &str) -> Result<&PromptTemplate, PromptError> {
        self.templates.get(name).ok_or_else(|| PromptError::NotFound {
            name: name.to_string(),
        })
    }

    /// Shorthand for `get(name)?.render(vars)`.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<Vec<Message>, PromptError> {
        self.get(name)?.render(vars)
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }
}
