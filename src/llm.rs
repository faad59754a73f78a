use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GrokConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
        }
    }
}

/// Messages for a single completion call. Built fresh for every inbound
/// message and dropped once the call returns.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
}

/// Anything that can turn a request into reply text.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Client for xAI's OpenAI-compatible chat completion endpoint.
pub struct GrokClient {
    client: reqwest::Client,
    config: GrokConfig,
}

impl GrokClient {
    pub fn new(config: GrokConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Completion for GrokClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: &request.messages,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.effective_base_url());

        debug!("Sending request to Grok: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Grok")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Grok API error ({}): {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Grok response malformed, expected JSON")?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("No response content from Grok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> GrokClient {
        GrokClient::new(GrokConfig {
            api_key: "xai-test".to_string(),
            base_url: format!("{}/v1/", server.url()),
            max_tokens: Some(256),
            ..GrokConfig::default()
        })
        .unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
        }
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer xai-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "grok-4",
                "max_tokens": 256,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [
                        {"index": 0, "message": {"role": "assistant", "content": "hello there"}},
                        {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let reply = client_for(&server).complete(&request()).await.unwrap();
        assert_eq!(reply, "hello there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("slow down"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[tokio::test]
    async fn test_no_choices_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(json!({ "choices": [] }).to_string())
            .create_async()
            .await;

        assert!(client_for(&server).complete(&request()).await.is_err());
    }

    #[test]
    fn test_max_tokens_omitted_when_unset() {
        let messages = vec![ChatMessage::user("x")];
        let body = serde_json::to_value(ChatRequest {
            model: "grok-4",
            messages: &messages,
            max_tokens: None,
        })
        .unwrap();
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["messages"][0]["content"], "x");
    }
}
