//! Chat completions over any OpenAI-compatible endpoint (OpenAI, Azure,
//! Ollama, vLLM, LM Studio).

use crate::brain::LlmProvider;
use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// "Please try again in 20s." / "try again in 1.5s"
static RETRY_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)try again in (\d+)(?:\.\d+)?\s*s").expect("retry hint pattern is valid")
});

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    provider: String,
    model: String,
    max_tokens: usize,
    timeout_secs: u64,
    retry: RetryConfig,
}

fn is_local(base_url: Option<&str>) -> bool {
    base_url.is_some_and(|u| u.contains("localhost") || u.contains("127.0.0.1"))
}

impl OpenAiCompatibleProvider {
    /// Resolve the key from `config.api_key_env`; local endpoints may run without one.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) => key,
            Err(_) if is_local(config.base_url.as_deref()) => {
                debug!(provider = %config.provider, "No API key for local endpoint");
                "local".to_string()
            }
            Err(_) => {
                return Err(LlmError::AuthFailed {
                    provider: format!(
                        "{} (env var '{}' not set)",
                        config.provider, config.api_key_env
                    ),
                });
            }
        };
        Self::new_with_key(config, api_key)
    }

    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            provider: config.provider.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            retry: config.retry.clone(),
        })
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> ChatBody<'a> {
        ChatBody {
            model: request.model.as_deref().unwrap_or(&self.model),
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
        }
    }

    /// Turn a successful reply body into a completion; the first choice wins.
    fn parse_reply(raw: &str, requested_model: &str) -> Result<CompletionResponse, LlmError> {
        let reply: ChatReply = serde_json::from_str(raw).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid completion body: {}", e),
        })?;
        let choice = reply
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Completion has no choices".to_string(),
            })?;
        let usage = reply.usage.unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
            model: reply.model.unwrap_or_else(|| requested_model.to_string()),
            finish_reason: choice.finish_reason,
        })
    }

    fn status_error(&self, status: StatusCode, body: &str) -> LlmError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!(status = %status, body = %body, "Completion request rejected");
                LlmError::AuthFailed {
                    provider: self.provider.clone(),
                }
            }
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
                retry_after_secs: retry_hint(body).unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {}: {}", status, body),
            },
        }
    }

    fn send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if e.is_connect() {
            LlmError::Connection {
                message: e.to_string(),
            }
        } else {
            LlmError::ApiRequest {
                message: format!("Request failed: {}", e),
            }
        }
    }

    async fn post(&self, body: &ChatBody<'_>) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            url = %url,
            model = %body.model,
            messages = body.messages.len(),
            "Posting completion"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let status = response.status();
        let raw = response.text().await.map_err(|e| self.send_error(e))?;

        if !status.is_success() {
            return Err(self.status_error(status, &raw));
        }
        Self::parse_reply(&raw, body.model)
    }
}

/// Seconds to wait, as suggested in a 429 error message.
fn retry_hint(body: &str) -> Option<u64> {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string());
    RETRY_HINT.captures(&message).and_then(|c| c[1].parse().ok())
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.body(&request);
        let body = &body;
        super::with_retry(&self.retry, move || self.post(body)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> LlmConfig {
        LlmConfig {
            api_key_env: "VERITY_TEST_OPENAI_KEY".to_string(),
            retry: RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            },
            ..LlmConfig::default()
        }
    }

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new_with_key(&test_config(), "sk".to_string()).unwrap()
    }

    #[test]
    fn test_body_serializes_messages_and_overrides() {
        let provider = provider();
        let mut request =
            CompletionRequest::new(vec![Message::system("Be terse"), Message::user("Hello")]);
        request.model = Some("gpt-4o".to_string());
        let body = serde_json::to_value(provider.body(&request)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
    }

    #[test]
    fn test_parse_reply() {
        let raw = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "[\"claim\"]"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        })
        .to_string();
        let resp = OpenAiCompatibleProvider::parse_reply(&raw, "gpt-4o-mini").unwrap();
        assert_eq!(resp.content, "[\"claim\"]");
        assert_eq!(resp.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(resp.usage.total(), 15);
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_reply_without_usage_or_model() {
        let raw = r#"{"choices": [{"message": {"content": null}}]}"#;
        let resp = OpenAiCompatibleProvider::parse_reply(raw, "local-model").unwrap();
        assert_eq!(resp.content, "");
        assert_eq!(resp.model, "local-model");
        assert_eq!(resp.usage.total(), 0);
    }

    #[test]
    fn test_parse_reply_no_choices() {
        assert!(matches!(
            OpenAiCompatibleProvider::parse_reply(r#"{"choices": []}"#, "gpt-4o"),
            Err(LlmError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_status_error_mapping() {
        let provider = provider();
        assert!(matches!(
            provider.status_error(StatusCode::UNAUTHORIZED, "Unauthorized"),
            LlmError::AuthFailed { .. }
        ));
        match provider.status_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Rate limit reached. Please try again in 20s."}}"#,
        ) {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 20),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
        match provider.status_error(StatusCode::TOO_MANY_REQUESTS, "slow down") {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 5),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
        match provider.status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom") {
            LlmError::ApiRequest { message } => assert!(message.contains("500")),
            other => panic!("Expected ApiRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_new_missing_key() {
        // SAFETY: test-only env var manipulation
        unsafe { std::env::remove_var("VERITY_TEST_OPENAI_KEY_MISSING") };
        let mut config = test_config();
        config.api_key_env = "VERITY_TEST_OPENAI_KEY_MISSING".to_string();
        assert!(matches!(
            OpenAiCompatibleProvider::new(&config),
            Err(LlmError::AuthFailed { .. })
        ));
    }

    #[test]
    fn test_local_provider_no_api_key_required() {
        let mut config = test_config();
        config.api_key_env = "VERITY_TEST_LOCAL_KEY_UNSET".to_string();
        config.base_url = Some("http://localhost:11434/v1/".to_string());
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
    }

    #[tokio::test]
    async fn test_complete_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "model": "gpt-4o-mini",
                    "choices": [{"message": {"content": "yes"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 1}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut config = test_config();
        config.base_url = Some(server.url());
        let provider = OpenAiCompatibleProvider::new_with_key(&config, "sk-test".into()).unwrap();
        let resp = provider
            .complete(CompletionRequest::new(vec![Message::user("Is 7 prime?")]))
            .await
            .unwrap();
        assert_eq!(resp.content, "yes");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_surfaces_auth_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;

        let mut config = test_config();
        config.base_url = Some(server.url());
        let provider = OpenAiCompatibleProvider::new_with_key(&config, "nope".into()).unwrap();
        let err = provider
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }
}
