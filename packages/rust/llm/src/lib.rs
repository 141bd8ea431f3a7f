//! Chat-completion capability used by the classifier, drafter and validator.
//!
//! Stages only see the [`ChatModel`] trait; [`OpenAiChat`] is the production
//! implementation talking to any OpenAI-compatible `/chat/completions` API.

mod json;
mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use supportflow_shared::Result;

pub use json::extract_json_object;
pub use openai::OpenAiChat;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Speaker of a chat message sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

/// One prompt message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// Ask the endpoint to constrain output to a JSON object.
    pub json_output: bool,
}

impl ChatRequest {
    /// System instructions followed by one user turn.
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
            json_output: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A text-generation capability returning the assistant's raw reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the reply text verbatim.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Model identifier for tracing.
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_orders_messages() {
        let req = ChatRequest::new("be terse", "hello", 0.0).json();
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, ChatRole::System);
        assert_eq!(req.messages[1].content, "hello");
        assert!(req.json_output);
    }

    #[test]
    fn chat_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::system("x")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"x"}"#);
    }
}
