//! services/api/src/adapters/llm.rs
//!
//! This module contains the adapter for the chat language model.
//! It implements the `LanguageModel` port from the `core` crate.

use admissions_chat_core::domain::LlmUsage;
use admissions_chat_core::ports::{
    Completion, LanguageModel, MessageRole, ModelMessage, PortError, PortResult,
};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LanguageModel` using an OpenAI-compatible API.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn convert_message(message: &ModelMessage) -> Result<ChatCompletionRequestMessage, OpenAIError> {
        let converted = match message.role {
            MessageRole::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(message.content.clone())
                .build()?
                .into(),
            MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content.clone())
                .build()?
                .into(),
            MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content.clone())
                .build()?
                .into(),
        };
        Ok(converted)
    }
}

//=========================================================================================
// `LanguageModel` Trait Implementation
//=========================================================================================

#[async_trait]
impl LanguageModel for OpenAiChatAdapter {
    async fn complete(
        &self,
        messages: &[ModelMessage],
        max_output_tokens: u32,
        temperature: f32,
    ) -> PortResult<Completion> {
        let converted: Vec<ChatCompletionRequestMessage> = messages
            .iter()
            .map(Self::convert_message)
            .collect::<Result<_, _>>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(converted)
            .max_completion_tokens(max_output_tokens)
            .temperature(temperature)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let usage = response.usage.as_ref().map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        // An empty choice list or missing content is handed back as empty
        // text; the core decides what that means for the turn.
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }
}
