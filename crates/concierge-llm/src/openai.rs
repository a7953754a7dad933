//! OpenAI-compatible chat completions provider (non-streaming).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use concierge_core::context::LlmContext;
use concierge_core::errors::GatewayError;
use concierge_core::provider::LlmProvider;
use concierge_core::security::ApiKey;

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
}

pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        info!(model = %config.model, base_url = %config.base_url, "OpenAI provider initialized");
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key.expose());
        let _ = headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| {
                GatewayError::AuthenticationFailed(format!("invalid authorization header: {e}"))
            })?,
        );
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_request<'a>(&'a self, context: &'a LlmContext) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(context.turns.len() + 1);
        if !context.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &context.system_prompt,
            });
        }
        messages.extend(context.turns.iter().map(|turn| ChatMessage {
            role: turn.role.as_str(),
            content: &turn.text,
        }));
        ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages,
        }
    }
}

/// Pull `error.message` out of an OpenAI error body, or fall back to the raw text.
fn parse_api_error(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

fn classify_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(Duration::ZERO)
    } else {
        GatewayError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, context: &LlmContext) -> Result<String, GatewayError> {
        debug!(model = %self.config.model, turns = context.turns.len(), "chat completion request");

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&self.build_request(context))
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            let err = GatewayError::from_status(status.as_u16(), parse_api_error(&body), retry_after);
            warn!(status = status.as_u16(), kind = err.error_kind(), "chat completion failed");
            return Err(err);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| GatewayError::InvalidResponse("no completion content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::messages::Turn;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: String) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiConfig {
            api_key: ApiKey::new("sk-test"),
            base_url,
            model: "gpt-4-turbo".into(),
            temperature: 0.0,
        })
    }

    fn context() -> LlmContext {
        LlmContext::new(
            "Eres el asistente digital del hotel.",
            vec![Turn::user("Hola"), Turn::assistant("¡Hola!"), Turn::user("¿Hay parking?")],
        )
    }

    #[test]
    fn request_puts_system_prompt_first() {
        let p = provider("http://localhost".into());
        let ctx = context();
        let req = p.build_request(&ctx);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][3]["content"], "¿Hay parking?");
        assert_eq!(json["messages"].as_array().unwrap().len(), 4);
        assert_eq!(json["model"], "gpt-4-turbo");
    }

    #[test]
    fn api_error_message_extracted() {
        assert_eq!(
            parse_api_error(r#"{"error": {"message": "Incorrect API key", "type": "invalid_request_error"}}"#),
            "Incorrect API key"
        );
        assert_eq!(parse_api_error("plain body"), "plain body");
    }

    #[tokio::test]
    async fn complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4-turbo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": " Sí, tenemos parking. "}}]
            })))
            .mount(&server)
            .await;

        let reply = provider(server.uri()).complete(&context()).await.unwrap();
        assert_eq!(reply, "Sí, tenemos parking.");
    }

    #[tokio::test]
    async fn complete_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&server)
            .await;

        let err = provider(server.uri()).complete(&context()).await.unwrap_err();
        assert!(matches!(err, GatewayError::AuthenticationFailed(ref m) if m.contains("Incorrect")));
    }

    #[tokio::test]
    async fn complete_rate_limited_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let err = provider(server.uri()).complete(&context()).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(7)
        ));
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = provider(server.uri()).complete(&context()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let err = provider("http://127.0.0.1:1".into())
            .complete(&context())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
