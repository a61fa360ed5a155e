//! Core type definitions for Verity.
//!
//! Defines the chat message types exchanged with LLM providers, the
//! fact-checking state that solvers read from and write to, and the
//! claim-level records solvers produce.

use crate::error::SolverError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Represents a participant role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Token usage statistics from an LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }

    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A request to the LLM for completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    /// Per-request model override.
    pub model: Option<String>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            temperature: 0.0,
            max_tokens: None,
            model: None,
        }
    }
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

/// The result of an LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Field name every state starts with.
pub const RESPONSE_FIELD: &str = "response";
/// Field name set when the state carries the prompting question.
pub const QUESTION_FIELD: &str = "question";

/// Shared mutable state threaded through a solver pipeline.
///
/// Solvers communicate only through named fields. Values are stored as JSON
/// so any serializable type can be handed from one stage to the next; typed
/// access goes through [`FactCheckerState::get_as`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckerState {
    question: Option<String>,
    response: String,
    fields: BTreeMap<String, Value>,
}

impl FactCheckerState {
    pub fn new(response: impl Into<String>, question: Option<String>) -> Self {
        let response = response.into();
        let mut fields = BTreeMap::new();
        fields.insert(RESPONSE_FIELD.to_string(), Value::String(response.clone()));
        if let Some(q) = &question {
            fields.insert(QUESTION_FIELD.to_string(), Value::String(q.clone()));
        }
        Self {
            question,
            response,
            fields,
        }
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Read a field and deserialize it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, SolverError> {
        let value = self.fields.get(name).ok_or_else(|| SolverError::MissingField {
            field: name.to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| SolverError::FieldType {
            field: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Store a field, replacing any previous value.
    ///
    /// Writing `response` also updates the response accessor so the two never diverge.
    pub fn set<T: Serialize>(&mut self, name: &str, value: T) -> Result<(), SolverError> {
        let value = serde_json::to_value(value).map_err(|e| SolverError::FieldType {
            field: name.to_string(),
            reason: e.to_string(),
        })?;
        if name == RESPONSE_FIELD {
            match &value {
                Value::String(s) => self.response = s.clone(),
                other => {
                    return Err(SolverError::FieldType {
                        field: name.to_string(),
                        reason: format!("response must be a string, got {}", other),
                    });
                }
            }
        }
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Snapshot of every field as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// One piece of retrieved evidence for a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// The search query (or merged queries) that surfaced this snippet.
    pub query: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A claim paired with its evidence, in retrieval order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEvidence {
    pub claim: String,
    pub evidences: Vec<Evidence>,
}

/// The verifier's judgement on a single claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimVerdict {
    pub claim: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub correction: String,
    pub factuality: bool,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
}

/// A claim after the revision stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRevision {
    pub claim: String,
    pub edited_claim: String,
    pub factuality: bool,
}
