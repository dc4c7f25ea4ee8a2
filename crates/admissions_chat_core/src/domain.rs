//! crates/admissions_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a chat. `Escalated` marks the chat as needing
/// human admin attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Open,
    Escalated,
    Closed,
    CallBooked,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::Open => "open",
            ChatStatus::Escalated => "escalated",
            ChatStatus::Closed => "closed",
            ChatStatus::CallBooked => "call_booked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(ChatStatus::Open),
            "escalated" => Some(ChatStatus::Escalated),
            "closed" => Some(ChatStatus::Closed),
            "call_booked" => Some(ChatStatus::CallBooked),
            _ => None,
        }
    }
}

/// A student support chat.
///
/// `admin_taken_over` is the single point of truth for whether the AI may
/// act on this chat; the orchestrator re-reads it at the start of every turn.
#[derive(Debug, Clone)]
pub struct Chat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub status: ChatStatus,
    pub admin_taken_over: bool,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    Student,
    Bot,
    Admin,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::Student => "student",
            TurnRole::Bot => "bot",
            TurnRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(TurnRole::Student),
            "bot" => Some(TurnRole::Bot),
            "admin" => Some(TurnRole::Admin),
            _ => None,
        }
    }
}

/// One message within a chat. Immutable once created, ordered by creation
/// time within its chat.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: TurnRole,
    pub content: String,
    pub meta: Option<TurnMeta>,
    pub created_at: DateTime<Utc>,
}

/// Metadata stored alongside a bot turn, recording what went into the reply.
/// Serialized camelCase to match the stored wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnMeta {
    pub sources: Vec<String>,
    pub escalation_suggested: bool,
    pub booking_suggested: bool,
    pub model: String,
}

/// A minimal (role, content) view of a past turn, used for prompt building.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub role: TurnRole,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One static FAQ-like record used for retrieval-augmented reply generation.
#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    pub id: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub text: String,
}

/// The escalation judge's verdict. Deserialized from the model's JSON
/// output, which uses camelCase field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationVerdict {
    pub escalation_needed: bool,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub suggested_response: String,
}

/// Token accounting reported by the language model, folded into audit rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Parameters of one append-only audit row. One row is written per language
/// model invocation; rows are never mutated or deleted by the core.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub chat_id: Uuid,
    pub message_id: Option<Uuid>,
    pub model: String,
    pub prompt: String,
    pub context: String,
    pub response: String,
    pub usage: String,
}

/// Fields an `update_chat` call may change. Unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ChatPatch {
    pub title: Option<String>,
    pub status: Option<ChatStatus>,
    pub admin_taken_over: Option<bool>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Cheap, synchronous signals from the fast-path analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationSignals {
    pub escalation_suggested: bool,
    pub booking_suggested: bool,
}

/// The analysis half of a completed turn's result.
#[derive(Debug, Clone)]
pub struct TurnAnalysis {
    pub escalation_suggested: bool,
    pub booking_suggested: bool,
    pub escalation_analysis: Option<EscalationVerdict>,
}

/// What a completed turn hands back to the caller.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub message: ConversationTurn,
    pub sources: Vec<KnowledgeEntry>,
    pub analysis: TurnAnalysis,
}

/// Outcome of one AI turn.
///
/// `SkippedAdminActive` is a normal early exit, not an error: an admin holds
/// the chat, so the turn performed no model calls and no writes. Callers are
/// expected to silently no-op on it.
#[derive(Debug)]
pub enum TurnOutcome {
    Completed(TurnResult),
    SkippedAdminActive,
}
