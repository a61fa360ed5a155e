//! Web search backends used for evidence retrieval.
//!
//! [`SerperSearch`] queries the Serper Google Search API and flattens the
//! answer box, knowledge graph and organic results into text snippets.

use crate::config::SearchConfig;
use crate::error::SearchError;
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Returned when a query produced nothing usable.
pub const NO_RESULT_SNIPPET: &str = "No good Google Search Result was found";

/// One search hit reduced to its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SearchSnippet {
    pub fn new(content: impl Into<String>, source: Option<String>) -> Self {
        Self {
            content: content.into(),
            source,
        }
    }
}

/// A web search backend.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Run one query.
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>, SearchError>;

    /// Run several queries concurrently, returning results in query order.
    async fn search_all(&self, queries: &[String]) -> Result<Vec<Vec<SearchSnippet>>, SearchError> {
        try_join_all(queries.iter().map(|q| self.search(q))).await
    }
}

/// Serper (google.serper.dev) search client.
pub struct SerperSearch {
    client: Client,
    base_url: String,
    api_key: String,
    snippet_cnt: usize,
}

impl SerperSearch {
    /// Build a client, reading the API key from `config.api_key_env`.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| SearchError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;
        Self::new_with_key(config, api_key)
    }

    pub fn new_with_key(config: &SearchConfig, api_key: String) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::Request {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            snippet_cnt: config.snippet_cnt,
        })
    }

    /// Use a different per-query snippet cap.
    pub fn with_snippet_cnt(mut self, snippet_cnt: usize) -> Self {
        self.snippet_cnt = snippet_cnt;
        self
    }

    /// Flatten a Serper response body into at most `snippet_cnt` snippets.
    pub fn parse_results(body: &Value, snippet_cnt: usize) -> Vec<SearchSnippet> {
        let mut snippets = Vec::new();

        if let Some(answer_box) = body.get("answerBox") {
            let direct = ["answer", "snippet", "snippetHighlighted"]
                .iter()
                .find_map(|key| match answer_box.get(*key) {
                    Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                    Some(Value::Array(items)) if !items.is_empty() => Some(
                        items
                            .iter()
                            .filter_map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(" "),
                    ),
                    _ => None,
                });
            if let Some(text) = direct {
                let link = answer_box
                    .get("link")
                    .and_then(|l| l.as_str())
                    .map(String::from);
                snippets.push(SearchSnippet::new(text.replace('\n', " "), link));
            }
        }

        if let Some(kg) = body.get("knowledgeGraph") {
            let title = kg.get("title").and_then(|t| t.as_str()).unwrap_or("");
            let link = kg
                .get("descriptionLink")
                .and_then(|l| l.as_str())
                .map(String::from);
            if let Some(entity_type) = kg.get("type").and_then(|t| t.as_str()) {
                snippets.push(SearchSnippet::new(
                    format!("{}: {}.", title, entity_type),
                    link.clone(),
                ));
            }
            if let Some(description) = kg.get("description").and_then(|d| d.as_str()) {
                snippets.push(SearchSnippet::new(description, link.clone()));
            }
            if let Some(attributes) = kg.get("attributes").and_then(|a| a.as_object()) {
                for (attribute, value) in attributes {
                    if let Some(v) = value.as_str() {
                        snippets.push(SearchSnippet::new(
                            format!("{} {}: {}.", title, attribute, v),
                            link.clone(),
                        ));
                    }
                }
            }
        }

        if let Some(organic) = body.get("organic").and_then(|o| o.as_array()) {
            for result in organic {
                if let Some(snippet) = result.get("snippet").and_then(|s| s.as_str()) {
                    let link = result.get("link").and_then(|l| l.as_str()).map(String::from);
                    snippets.push(SearchSnippet::new(snippet, link));
                }
            }
        }

        snippets.truncate(snippet_cnt);
        if snippets.is_empty() {
            snippets.push(SearchSnippet::new(NO_RESULT_SNIPPET, None));
        }
        snippets
    }
}

#[async_trait]
impl SearchEngine for SerperSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>, SearchError> {
        let url = format!("{}/search", self.base_url);
        debug!(query = %query, "Serper search");

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&json!({ "q": query }))
            .send()
            .await
            .map_err(|e| SearchError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| SearchError::Request {
            message: format!("Failed to read response body: {}", e),
        })?;
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| SearchError::ResponseParse {
            message: e.to_string(),
        })?;
        Ok(Self::parse_results(&body, self.snippet_cnt))
    }
}

/// Canned search results for tests and offline runs.
#[derive(Default)]
pub struct MockSearchEngine {
    results: HashMap<String, Vec<SearchSnippet>>,
    default: Vec<SearchSnippet>,
    queries: Mutex<Vec<String>>,
}

impl MockSearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every unknown query returns these snippets.
    pub fn with_default(mut self, snippets: Vec<SearchSnippet>) -> Self {
        self.default = snippets;
        self
    }

    pub fn with_result(mut self, query: &str, snippets: Vec<SearchSnippet>) -> Self {
        self.results.insert(query.to_string(), snippets);
        self
    }

    /// Queries received so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SearchEngine for MockSearchEngine {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>, SearchError> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.to_string());
        Ok(self
            .results
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}
