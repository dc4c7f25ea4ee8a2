//! crates/admissions_chat_core/src/analysis.rs
//!
//! The fast-path conversation analyzer: a synchronous keyword heuristic that
//! produces cheap escalation/booking signals alongside every reply. The
//! slower LLM-backed judgment lives in `judge`.

use crate::domain::{ConversationSignals, HistoryEntry};

/// Conversations longer than this many turns get a booking suggestion
/// regardless of keywords.
pub const LONG_CONVERSATION_TURNS: usize = 6;

/// Distress/complaint language that suggests a human should step in.
const ESCALATION_KEYWORDS: &[&str] = &[
    "complaint",
    "problem",
    "issue",
    "error",
    "wrong",
    "mistake",
    "disappointed",
    "frustrated",
    "angry",
    "help me",
    "urgent",
    "not working",
    "doesn't work",
    "broken",
    "cannot",
    "can't",
];

/// Requests for personal contact that suggest offering a call.
const BOOKING_KEYWORDS: &[&str] = &[
    "speak to someone",
    "talk to",
    "meet with",
    "appointment",
    "call me",
    "phone call",
    "consultation",
    "discuss",
    "explain more",
    "detailed information",
    "one on one",
    "personal",
    "specific situation",
];

/// Determine whether escalation or booking should be suggested for the
/// latest message. Pure and deterministic; always succeeds.
pub fn analyze_message(user_message: &str, history: &[HistoryEntry]) -> ConversationSignals {
    let message_lower = user_message.to_lowercase();

    let escalation_suggested = ESCALATION_KEYWORDS
        .iter()
        .any(|keyword| message_lower.contains(keyword));

    let booking_suggested = BOOKING_KEYWORDS
        .iter()
        .any(|keyword| message_lower.contains(keyword))
        || history.len() > LONG_CONVERSATION_TURNS;

    ConversationSignals {
        escalation_suggested,
        booking_suggested,
    }
}
