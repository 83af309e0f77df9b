//! OpenAI-compatible chat-completions client.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions`. Non-streaming only: responders need the whole answer.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use urbanroute_config::LlmConfig;
use urbanroute_core::{Message, ResponderError};

/// Shared chat-completions client. Cloning is cheap.
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ResponderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResponderError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ResponderError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Whether an API key is available.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `messages` and return the first choice's text, trimmed.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        temperature: Option<f32>,
    ) -> Result<String, ResponderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ResponderError::NotConfigured("no LLM API key (set OPENAI_API_KEY)".into())
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = ApiRequest {
            model,
            messages: messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature,
            stream: false,
        };

        debug!(model, messages = messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResponderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ResponderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ResponderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "LLM endpoint returned error");
            return Err(ResponderError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ResponderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ResponderError::InvalidResponse("No choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

// --- OpenAI wire types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::Json;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    async fn echo_last(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let last = body["messages"]
            .as_array()
            .and_then(|m| m.last())
            .and_then(|m| m["content"].as_str())
            .unwrap_or_default()
            .to_string();
        Json(serde_json::json!({
            "model": body["model"],
            "choices": [{"message": {"role": "assistant", "content": format!("  {auth} | {last}\n")}}]
        }))
    }

    fn client(base_url: &str, key: Option<&str>) -> ChatClient {
        ChatClient::new(base_url, key.map(String::from), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn completion_returns_trimmed_first_choice() {
        let base = serve(axum::Router::new().route("/chat/completions", post(echo_last))).await;
        let chat = client(&base, Some("sk-test"));

        let reply = chat
            .complete("gpt-4o-mini", &[Message::user("Bonjour")], Some(0.0))
            .await
            .unwrap();
        assert_eq!(reply, "Bearer sk-test | Bonjour");
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let chat = client("http://127.0.0.1:9", None);
        assert!(!chat.is_configured());
        let err = chat.complete("m", &[Message::user("x")], None).await.unwrap_err();
        assert!(matches!(err, ResponderError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn status_codes_are_mapped() {
        let app = axum::Router::new()
            .route("/limited/chat/completions", post(|| async { StatusCode::TOO_MANY_REQUESTS }))
            .route("/denied/chat/completions", post(|| async { StatusCode::UNAUTHORIZED }))
            .route(
                "/broken/chat/completions",
                post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
            )
            .route(
                "/empty/chat/completions",
                post(|| async { Json(serde_json::json!({"choices": []})) }),
            );
        let base = serve(app).await;
        let msgs = [Message::user("x")];

        let err = client(&format!("{base}/limited"), Some("k"))
            .complete("m", &msgs, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResponderError::RateLimited { retry_after_secs: 5 }));

        let err = client(&format!("{base}/denied"), Some("k"))
            .complete("m", &msgs, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResponderError::AuthenticationFailed(_)));

        let err = client(&format!("{base}/broken"), Some("k"))
            .complete("m", &msgs, None)
            .await
            .unwrap_err();
        match err {
            ResponderError::Api { status_code, message } => {
                assert_eq!(status_code, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = client(&format!("{base}/empty"), Some("k"))
            .complete("m", &msgs, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResponderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let chat = client("http://127.0.0.1:9", Some("k"));
        let err = chat.complete("m", &[Message::user("x")], None).await.unwrap_err();
        assert!(matches!(err, ResponderError::Network(_)));
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let chat = client("http://localhost/v1/", Some(""));
        assert!(!chat.is_configured());
        assert_eq!(chat.base_url(), "http://localhost/v1");
    }
}
