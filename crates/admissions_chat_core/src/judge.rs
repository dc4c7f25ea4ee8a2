//! crates/admissions_chat_core/src/judge.rs
//!
//! The LLM-backed escalation judge. Independently of the reply call, it asks
//! the model for a structured JSON verdict on whether a human should take
//! over. The judge is never allowed to fail a turn: model errors and
//! malformed output both degrade to a conservative fallback verdict.

use crate::domain::{EscalationVerdict, HistoryEntry, LlmUsage};
use crate::ports::{LanguageModel, MessageRole, ModelMessage};
use crate::prompts;
use tracing::warn;

/// Output budget for the judgment call. Kept small; the verdict is short JSON.
pub const JUDGMENT_MAX_OUTPUT_TOKENS: u32 = 300;

/// Sampling temperature for the judgment call. Low, to favor consistent
/// judgments across similar conversations.
pub const JUDGMENT_TEMPERATURE: f32 = 0.3;

/// Everything the judge produced for one turn: the verdict the orchestrator
/// acts on, plus the raw exchange for the audit row. `raw_response` is `None`
/// when the model call itself failed.
#[derive(Debug, Clone)]
pub struct JudgeReport {
    pub verdict: EscalationVerdict,
    pub prompt: String,
    pub raw_response: Option<String>,
    pub usage: Option<LlmUsage>,
}

impl JudgeReport {
    /// Whether the model actually produced output worth auditing.
    pub fn has_model_output(&self) -> bool {
        self.raw_response.is_some()
    }
}

/// Strictly parses the model's output into a typed verdict.
///
/// This is a plain typed branch rather than a catch-all: callers decide what
/// a failed parse means (the orchestrator substitutes [`fallback_verdict`]).
pub fn parse_verdict(raw: &str) -> Result<EscalationVerdict, serde_json::Error> {
    serde_json::from_str(raw.trim())
}

/// The verdict used when the judgment call fails or returns something other
/// than the expected JSON. Deliberately low-confidence and non-escalating, so
/// a broken judge can never flip chat status.
pub fn fallback_verdict() -> EscalationVerdict {
    EscalationVerdict {
        escalation_needed: false,
        confidence: 0.1,
        reasons: vec!["Parse error in escalation analysis".to_string()],
        suggested_response: "Continue with regular support".to_string(),
    }
}

/// Runs the escalation judgment for the latest user message.
///
/// Infallible by design: any failure is logged and replaced with the
/// fallback verdict so the surrounding turn keeps going.
pub async fn assess(
    model: &dyn LanguageModel,
    user_message: &str,
    history: &[HistoryEntry],
) -> JudgeReport {
    let prompt = prompts::escalation_prompt(user_message, history);
    let messages = vec![ModelMessage::new(MessageRole::User, prompt.clone())];

    let completion = match model
        .complete(&messages, JUDGMENT_MAX_OUTPUT_TOKENS, JUDGMENT_TEMPERATURE)
        .await
    {
        Ok(completion) => completion,
        Err(e) => {
            warn!("Escalation judgment call failed, using fallback verdict: {e}");
            return JudgeReport {
                verdict: fallback_verdict(),
                prompt,
                raw_response: None,
                usage: None,
            };
        }
    };

    let verdict = match parse_verdict(&completion.text) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(
                "Failed to parse escalation analysis ({e}); raw output: {}",
                completion.text
            );
            fallback_verdict()
        }
    };

    JudgeReport {
        verdict,
        prompt,
        raw_response: Some(completion.text),
        usage: completion.usage,
    }
}
