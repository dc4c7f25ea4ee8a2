//! crates/admissions_chat_core/src/generator.rs
//!
//! Reply generation over the `LanguageModel` port: assembles the
//! knowledge-grounded message list, invokes the model, and rejects empty
//! output. Persistence is the orchestrator's responsibility, not ours.

use crate::domain::{HistoryEntry, KnowledgeEntry, LlmUsage, TurnRole};
use crate::ports::{LanguageModel, MessageRole, ModelMessage};
use crate::prompts::{self, GENERATION_HISTORY_WINDOW};
use tracing::warn;

/// Output budget for the reply call.
pub const REPLY_MAX_OUTPUT_TOKENS: u32 = 500;

/// Sampling temperature for the reply call.
pub const REPLY_TEMPERATURE: f32 = 0.7;

/// Output budget for the one-off chat title call. Short titles only.
pub const TITLE_MAX_OUTPUT_TOKENS: u32 = 20;

const TITLE_TEMPERATURE: f32 = 0.7;
const TITLE_MAX_CHARS: usize = 60;

/// Title used when title generation fails for any reason.
pub const FALLBACK_CHAT_TITLE: &str = "Student Support Chat";

/// The reply-generating model call produced no usable content. Fatal to the
/// turn; the caller must not persist a message.
#[derive(Debug, thiserror::Error)]
#[error("Reply generation failed: {0}")]
pub struct GenerationError(pub String);

/// A successfully generated reply, plus what went into it for the audit row.
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub content: String,
    pub system_prompt: String,
    pub usage: Option<LlmUsage>,
}

/// Builds the full message list for the reply call: the knowledge-grounded
/// system prompt, the trailing history window, and the new user message.
///
/// History roles map as `student -> user` and anything else (bot or admin)
/// to `assistant`, preserving order.
pub fn build_reply_messages(
    relevant_entries: &[KnowledgeEntry],
    history: &[HistoryEntry],
    user_message: &str,
) -> Vec<ModelMessage> {
    let mut messages = Vec::with_capacity(history.len().min(GENERATION_HISTORY_WINDOW) + 2);

    messages.push(ModelMessage::new(
        MessageRole::System,
        prompts::system_prompt(relevant_entries),
    ));

    let window_start = history.len().saturating_sub(GENERATION_HISTORY_WINDOW);
    for entry in &history[window_start..] {
        let role = match entry.role {
            TurnRole::Student => MessageRole::User,
            _ => MessageRole::Assistant,
        };
        messages.push(ModelMessage::new(role, entry.content.clone()));
    }

    messages.push(ModelMessage::new(MessageRole::User, user_message));
    messages
}

/// Generates the bot reply for a new student message.
pub async fn generate_reply(
    model: &dyn LanguageModel,
    relevant_entries: &[KnowledgeEntry],
    history: &[HistoryEntry],
    user_message: &str,
) -> Result<GeneratedReply, GenerationError> {
    let messages = build_reply_messages(relevant_entries, history, user_message);
    let system_prompt = messages[0].content.clone();

    let completion = model
        .complete(&messages, REPLY_MAX_OUTPUT_TOKENS, REPLY_TEMPERATURE)
        .await
        .map_err(|e| GenerationError(e.to_string()))?;

    if completion.text.trim().is_empty() {
        return Err(GenerationError(
            "language model returned no content".to_string(),
        ));
    }

    Ok(GeneratedReply {
        content: completion.text,
        system_prompt,
        usage: completion.usage,
    })
}

/// Generates a short chat title from the first student message.
///
/// Never fails: any model error or empty output falls back to
/// [`FALLBACK_CHAT_TITLE`].
pub async fn generate_chat_title(model: &dyn LanguageModel, user_message: &str) -> String {
    let messages = vec![ModelMessage::new(
        MessageRole::User,
        prompts::chat_title_prompt(user_message),
    )];

    let raw = match model
        .complete(&messages, TITLE_MAX_OUTPUT_TOKENS, TITLE_TEMPERATURE)
        .await
    {
        Ok(completion) => completion.text,
        Err(e) => {
            warn!("Chat title generation failed, using fallback: {e}");
            return FALLBACK_CHAT_TITLE.to_string();
        }
    };

    let cleaned = clean_title(&raw);
    if cleaned.is_empty() {
        FALLBACK_CHAT_TITLE.to_string()
    } else {
        cleaned
    }
}

/// Strips quoting, capitalizes the first letter, and bounds the length.
fn clean_title(raw: &str) -> String {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`'))
        .take(TITLE_MAX_CHARS)
        .collect();

    let mut chars = stripped.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
