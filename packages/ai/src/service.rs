// ABOUTME: Review service interface and its HTTP chatbot implementation
// ABOUTME: Sends single-turn review requests and extracts the completion text

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

pub type ReviewResult<T> = Result<T, ReviewError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub completion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Black-box reviewer: turns in, completion out
#[async_trait]
pub trait ReviewService: Send + Sync {
    async fn request(&self, turns: Vec<ChatTurn>) -> ReviewResult<ReviewResponse>;
}

/// Chatbot endpoint of the remote app API
pub struct ChatbotClient {
    client: Client,
    url: String,
    token: String,
}

impl ChatbotClient {
    /// Create HTTP client with timeout configuration
    fn create_client(timeout: Duration) -> ReviewResult<Client> {
        Ok(Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?)
    }

    pub fn new(api_host: &str, item_id: &str, token: &str, timeout: Duration) -> ReviewResult<Self> {
        let url = format!(
            "{}/app-items/{}/chat-bot",
            api_host.trim_end_matches('/'),
            item_id
        );
        Ok(Self {
            client: Self::create_client(timeout)?,
            url,
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl ReviewService for ChatbotClient {
    async fn request(&self, turns: Vec<ChatTurn>) -> ReviewResult<ReviewResponse> {
        info!("Sending review request with {} turn(s)", turns.len());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&turns)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("Review request timed out");
                    ReviewError::ApiError("Review request timed out".to_string())
                } else {
                    error!("Review request failed: {}", e);
                    ReviewError::RequestFailed(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Review API error: {} - {}", status, error_text);
            return Err(ReviewError::ApiError(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReviewError::ParseError(e.to_string()))?;
        let parsed: ReviewResponse = serde_json::from_str(&body).map_err(|e| {
            error!(
                "Review response parsing failed: {}. Body snippet: {}",
                e,
                body.chars().take(200).collect::<String>()
            );
            ReviewError::ParseError(e.to_string())
        })?;

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ChatbotClient {
        ChatbotClient::new(&server.uri(), "item-1", "secret", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_turn_serialization() {
        let turn = ChatTurn::system("hello");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json, json!({"role": "system", "content": "hello"}));
    }

    #[tokio::test]
    async fn test_request_returns_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app-items/item-1/chat-bot"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!([{"role": "system", "content": "review this"}])))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"completion": "no", "model": "gpt-4o"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .request(vec![ChatTurn::system("review this")])
            .await
            .unwrap();

        assert_eq!(response.completion, "no");
        assert_eq!(response.model.as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn test_request_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .request(vec![ChatTurn::system("x")])
            .await;
        assert!(matches!(result, Err(ReviewError::ApiError(msg)) if msg.contains("overloaded")));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "no"})))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .request(vec![ChatTurn::system("x")])
            .await;
        assert!(matches!(result, Err(ReviewError::ParseError(_))));
    }
}
