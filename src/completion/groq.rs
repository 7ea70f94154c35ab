//! Groq chat completions through its OpenAI-compatible API.

use super::{ChatMessage, CompletionProvider, CompletionRequest, Role};
use crate::config::ApiSettings;
use crate::error::{Result, VidquizError};
use crate::http::transport_error;
use crate::openai::create_client;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

const SERVICE: &str = "Groq";

/// Chat completion provider backed by Groq.
pub struct GroqProvider {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl GroqProvider {
    pub fn new(api: &ApiSettings, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(&api.groq_base_url, api_key, api.request_timeout())?,
            model: api.groq_model.clone(),
        })
    }

    fn build_messages(request: &CompletionRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
        let build_error = |e: OpenAIError| VidquizError::InvalidInput(e.to_string());

        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(request.messages.len() + 1);
        if !request.system.trim().is_empty() {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(request.system.clone())
                    .build()
                    .map_err(build_error)?
                    .into(),
            );
        }

        for ChatMessage { role, content } in &request.messages {
            let message: ChatCompletionRequestMessage = match role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(content.clone())
                    .build()
                    .map_err(build_error)?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(content.clone())
                    .build()
                    .map_err(build_error)?
                    .into(),
            };
            messages.push(message);
        }

        Ok(messages)
    }
}

/// Map an async-openai error into the error taxonomy.
fn map_error(err: OpenAIError) -> VidquizError {
    match err {
        OpenAIError::Reqwest(e) => transport_error(SERVICE, e),
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.clone().unwrap_or_default();
            let code = api.code.clone().unwrap_or_default();
            let message = api.message.to_lowercase();

            if code == "invalid_api_key"
                || kind == "authentication_error"
                || message.contains("invalid api key")
            {
                VidquizError::Auth(format!("{} rejected the API key: {}", SERVICE, api.message))
            } else if kind == "server_error"
                || kind.contains("rate_limit")
                || code.contains("rate_limit")
                || message.contains("over capacity")
            {
                VidquizError::transient(SERVICE, api.message)
            } else {
                VidquizError::upstream(SERVICE, api.message)
            }
        }
        OpenAIError::JSONDeserialize(e) => {
            VidquizError::upstream(SERVICE, format!("malformed response: {}", e))
        }
        other => VidquizError::upstream(SERVICE, other.to_string()),
    }
}

#[async_trait]
impl CompletionProvider for GroqProvider {
    #[instrument(
        skip(self, request),
        fields(model = %self.model, messages = request.messages.len())
    )]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(Self::build_messages(request)?)
            .temperature(request.temperature);
        if request.json_mode {
            args.response_format(ResponseFormat::JsonObject);
        }
        let chat_request = args
            .build()
            .map_err(|e| VidquizError::InvalidInput(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(map_error)?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| VidquizError::transient(SERVICE, "empty completion returned"))?;

        debug!("Received completion of {} chars", text.len());
        Ok(text)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
