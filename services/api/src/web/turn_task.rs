//! services/api/src/web/turn_task.rs
//!
//! The asynchronous "worker" function for one AI turn. Message intake hands
//! the turn to this task via `tokio::spawn` so a slow or failing model call
//! never blocks the HTTP response; the task is its own error boundary and
//! nothing here propagates back to the student-facing request.

use crate::web::state::AppState;
use admissions_chat_core::domain::{HistoryEntry, TurnOutcome};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Runs one AI turn for a freshly stored student message.
///
/// `history` is the conversation as it stood before that message. When a
/// turn deadline is configured, the whole turn (model calls and writes) runs
/// under it; a fired deadline is reported as a failed turn.
pub async fn run_ai_turn(
    app_state: Arc<AppState>,
    chat_id: Uuid,
    user_message: String,
    history: Vec<HistoryEntry>,
) {
    let start_time = Instant::now();
    info!("AI turn started for chat {chat_id}.");

    let turn = app_state
        .orchestrator
        .run_turn(chat_id, &user_message, &history);

    let outcome = match app_state.config.ai_turn_timeout {
        Some(deadline) => match tokio::time::timeout(deadline, turn).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(
                    "AI turn for chat {chat_id} exceeded the {deadline:?} deadline and was dropped."
                );
                return;
            }
        },
        None => turn.await,
    };

    match outcome {
        Ok(TurnOutcome::Completed(result)) => {
            info!(
                "AI turn for chat {chat_id} completed in {:?} (sources: {}, escalation suggested: {}, booking suggested: {}).",
                start_time.elapsed(),
                result.sources.len(),
                result.analysis.escalation_suggested,
                result.analysis.booking_suggested,
            );
        }
        Ok(TurnOutcome::SkippedAdminActive) => {
            info!("AI turn for chat {chat_id} skipped; an admin holds the chat.");
        }
        Err(e) => {
            error!("AI turn for chat {chat_id} failed: {e}");
        }
    }
}
