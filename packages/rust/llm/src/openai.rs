//! OpenAI-compatible `/chat/completions` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use supportflow_shared::{LlmConfig, Result, SupportFlowError};

use crate::{ChatModel, ChatRequest};

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("SupportFlow/", env!("CARGO_PKG_VERSION"));

/// Production [`ChatModel`] backed by an HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    /// Build a client for `api_base` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        api_base: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base = Url::parse(api_base).map_err(|e| {
            SupportFlowError::config(format!("invalid LLM api base '{api_base}': {e}"))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SupportFlowError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base.as_str().trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build a client from the `[llm]` config section and a resolved key.
    pub fn from_config(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        Self::new(
            &config.api_base,
            api_key,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "temperature": request.temperature,
            "messages": request.messages,
        });
        if request.json_output {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    #[instrument(skip_all, fields(model = %self.model, json = request.json_output))]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| SupportFlowError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SupportFlowError::Llm(format!(
                "HTTP {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| SupportFlowError::parse(format!("invalid completion payload: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SupportFlowError::Llm("completion has no message content".into()))?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiChat {
        OpenAiChat::new(
            &format!("{}/v1", server.uri()),
            "sk-test",
            "gpt-test",
            Duration::from_secs(5),
        )
        .expect("build client")
    }

    #[test]
    fn rejects_invalid_api_base() {
        let err = OpenAiChat::new("::nope", "k", "m", Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("invalid LLM api base"));
    }

    #[test]
    fn json_requests_set_response_format() {
        let chat = OpenAiChat::new("http://localhost:1/v1", "k", "m", Duration::from_secs(1))
            .unwrap();
        let body = chat.body(&ChatRequest::new("s", "u", 0.0).json());
        assert_eq!(body["response_format"]["type"], "json_object");
        let body = chat.body(&ChatRequest::new("s", "u", 0.7));
        assert!(body.get("response_format").is_none());
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({ "model": "gpt-test" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Hello!" } }]
            })))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete(&ChatRequest::new("system", "hi", 0.7))
            .await
            .expect("completion");
        assert_eq!(reply, "Hello!");
    }

    #[tokio::test]
    async fn http_error_is_llm_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(&ChatRequest::new("system", "hi", 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, SupportFlowError::Llm(_)));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(&ChatRequest::new("system", "hi", 0.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no message content"));
    }
}
