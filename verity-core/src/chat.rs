//! Batched chat execution with structured-reply coercion.
//!
//! Solvers and evaluators hand the runner a batch of conversations. Each
//! conversation is sent to the provider with bounded concurrency, and
//! replies that are expected to carry JSON are parsed, re-requesting when
//! the model answers with something unparsable.

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, Message, TokenUsage};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Knobs for a [`ChatRunner`].
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    /// Requests in flight at once; 0 is treated as 1.
    pub concurrency: usize,
    /// Attempts per conversation before a structured reply is given up on.
    pub max_parse_attempts: u32,
    /// Model override applied to every request.
    pub model: Option<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
            concurrency: 5,
            max_parse_attempts: 3,
            model: None,
        }
    }
}

impl From<&LlmConfig> for ChatOptions {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            concurrency: config.concurrency,
            max_parse_attempts: config.max_parse_attempts,
            model: None,
        }
    }
}

/// Runs batches of conversations against one provider.
#[derive(Clone)]
pub struct ChatRunner {
    provider: Arc<dyn LlmProvider>,
    options: ChatOptions,
    usage: Arc<Mutex<TokenUsage>>,
}

impl ChatRunner {
    pub fn new(provider: Arc<dyn LlmProvider>, options: ChatOptions) -> Self {
        Self {
            provider,
            options,
            usage: Arc::new(Mutex::new(TokenUsage::default())),
        }
    }

    /// A runner sharing this one's provider and usage counter but with a model override.
    pub fn with_model(&self, model: Option<String>) -> Self {
        let mut options = self.options.clone();
        options.model = model;
        Self {
            provider: self.provider.clone(),
            options,
            usage: self.usage.clone(),
        }
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub fn model_name(&self) -> &str {
        self.options
            .model
            .as_deref()
            .unwrap_or_else(|| self.provider.model_name())
    }

    /// Tokens consumed by every call made through this runner (and its clones).
    pub fn usage(&self) -> TokenUsage {
        *self.usage.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn send(&self, messages: Vec<Message>) -> Result<String, LlmError> {
        let request = CompletionRequest {
            messages,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            model: self.options.model.clone(),
        };
        let response = self.provider.complete(request).await?;
        self.usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .accumulate(&response.usage);
        Ok(response.content)
    }

    /// Send every conversation and return the raw replies in input order.
    ///
    /// The first provider error aborts the batch.
    pub async fn run_text(&self, batch: Vec<Vec<Message>>) -> Result<Vec<String>, LlmError> {
        debug!(batch = batch.len(), "Running chat batch");
        stream::iter(batch.into_iter().map(|messages| self.send(messages)))
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await
    }

    /// Send every conversation and parse each reply as JSON of type `T`.
    ///
    /// A reply that cannot be parsed is re-requested up to `max_parse_attempts`
    /// times; `None` marks a conversation that never produced a usable reply.
    pub async fn run_json<T: DeserializeOwned>(
        &self,
        batch: Vec<Vec<Message>>,
    ) -> Result<Vec<Option<T>>, LlmError> {
        debug!(batch = batch.len(), "Running structured chat batch");
        stream::iter(
            batch
                .into_iter()
                .map(|messages| self.send_structured::<T>(messages)),
        )
        .buffered(self.options.concurrency.max(1))
        .try_collect()
        .await
    }

    async fn send_structured<T: DeserializeOwned>(
        &self,
        messages: Vec<Message>,
    ) -> Result<Option<T>, LlmError> {
        for attempt in 1..=self.options.max_parse_attempts {
            let reply = self.send(messages.clone()).await?;
            match parse_json_reply::<T>(&reply) {
                Some(value) => return Ok(Some(value)),
                None => warn!(
                    attempt,
                    max = self.options.max_parse_attempts,
                    reply = %truncate(&reply, 200),
                    "Unparsable structured reply"
                ),
            }
        }
        Ok(None)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Parse a model reply as JSON, tolerating prose and code fences around it.
///
/// Tries the whole reply first, then every balanced `[...]` / `{...}` span
/// in order of appearance.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Option<T> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    json_candidates(trimmed)
        .into_iter()
        .find_map(|candidate| serde_json::from_str(candidate).ok())
}

/// Balanced bracket spans, skipping brackets inside string literals.
fn json_candidates(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    for (start, &b) in bytes.iter().enumerate() {
        if b != b'[' && b != b'{' {
            continue;
        }
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, &c) in bytes[start..].iter().enumerate() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                b'"' => in_string = true,
                b'[' | b'{' => depth += 1,
                b']' | b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&text[start..start + offset + 1]);
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    spans
}
