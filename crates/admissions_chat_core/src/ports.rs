//! crates/admissions_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{
    AuditEntry, Chat, ChatPatch, ConversationTurn, LlmUsage, TurnMeta, TurnRole,
};
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Chat Store Port
//=========================================================================================

#[async_trait]
pub trait ChatStore: Send + Sync {
    // --- Chat Management ---
    async fn create_chat(&self, user_id: Uuid, title: &str) -> PortResult<Chat>;

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat>;

    async fn list_chats(&self) -> PortResult<Vec<Chat>>;

    /// Applies the set fields of `patch` to the chat in a single update.
    async fn update_chat(&self, chat_id: Uuid, patch: ChatPatch) -> PortResult<Chat>;

    // --- Conversation Turns ---
    async fn append_turn(
        &self,
        chat_id: Uuid,
        role: TurnRole,
        content: &str,
        meta: Option<TurnMeta>,
    ) -> PortResult<ConversationTurn>;

    async fn turns_for_chat(&self, chat_id: Uuid, count: i64) -> PortResult<Vec<ConversationTurn>>;

    // --- Audit Trail ---
    /// Appends one audit row for a language model invocation.
    async fn record_audit(&self, entry: AuditEntry) -> PortResult<()>;
}

//=========================================================================================
// Language Model Port
//=========================================================================================

/// The role of one message handed to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One message in a language model request.
#[derive(Debug, Clone)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ModelMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The text and token accounting of one completed model invocation.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Option<LlmUsage>,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Invokes the model with a bounded output length and sampling temperature.
    async fn complete(
        &self,
        messages: &[ModelMessage],
        max_output_tokens: u32,
        temperature: f32,
    ) -> PortResult<Completion>;
}
