//! Chat completion providers used for quiz generation.

mod groq;

pub use groq::GroqProvider;

use crate::error::Result;
use async_trait::async_trait;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One chat completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// Ask the model for a JSON object response.
    pub json_mode: bool,
}

/// Trait for chat completion services.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Return the text of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Identifier used in logs and cache keys.
    fn model_id(&self) -> &str;
}
