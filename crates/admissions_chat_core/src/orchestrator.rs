//! crates/admissions_chat_core/src/orchestrator.rs
//!
//! Drives one AI turn end to end: takeover gate, knowledge retrieval, reply
//! generation with the fast-path analysis, persistence joined with the
//! escalation judgment, the confidence policy, and the audit trail.
//!
//! Failure policy: anything that would leave the student without a reply
//! (generation, persisting the reply) fails the turn; book-keeping side
//! effects (status flip, audit rows) are logged and swallowed.

use crate::analysis::analyze_message;
use crate::domain::{
    AuditEntry, ChatPatch, ChatStatus, HistoryEntry, TurnAnalysis, TurnMeta, TurnOutcome,
    TurnResult, TurnRole,
};
use crate::generator::{self, GenerationError};
use crate::judge;
use crate::knowledge::{KnowledgeBase, DEFAULT_MAX_RESULTS};
use crate::ports::{ChatStore, LanguageModel, PortError};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A judge verdict only flips chat status when its confidence is strictly
/// above this threshold.
pub const ESCALATION_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// The primary error type for a conversation turn. Only outcomes that leave
/// the student without a reply surface here.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The chat could not be loaded at the takeover gate.
    #[error("Failed to load chat: {0}")]
    Chat(#[source] PortError),

    /// The reply-generating model call produced no usable content.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The bot reply could not be persisted.
    #[error("Failed to persist bot reply: {0}")]
    Persistence(#[source] PortError),
}

/// Coordinates one AI turn per incoming student message.
///
/// The orchestrator provides no per-chat serialization of its own: the
/// calling context is expected to fire one turn per incoming message.
pub struct TurnOrchestrator {
    store: Arc<dyn ChatStore>,
    model: Arc<dyn LanguageModel>,
    knowledge: KnowledgeBase,
    model_name: String,
}

impl TurnOrchestrator {
    pub fn new(
        store: Arc<dyn ChatStore>,
        model: Arc<dyn LanguageModel>,
        knowledge: KnowledgeBase,
        model_name: String,
    ) -> Self {
        Self {
            store,
            model,
            knowledge,
            model_name,
        }
    }

    /// Runs one AI turn for a new student message.
    ///
    /// The takeover gate is a fresh read of the chat row at the moment of
    /// deciding whether to run; admin intervention can land between message
    /// receipt and this call, so the flag is never cached across turns. If
    /// an admin takes over while this turn is already in flight, the turn is
    /// allowed to finish (benign race) and the next turn will skip.
    pub async fn run_turn(
        &self,
        chat_id: Uuid,
        user_message: &str,
        history: &[HistoryEntry],
    ) -> Result<TurnOutcome, TurnError> {
        let chat = self
            .store
            .get_chat(chat_id)
            .await
            .map_err(TurnError::Chat)?;

        if chat.admin_taken_over {
            info!("Chat {chat_id} is admin-held; skipping AI turn.");
            return Ok(TurnOutcome::SkippedAdminActive);
        }

        // Generation phase. The fast-path analysis is a pure function with
        // no ordering requirement relative to the model call.
        let relevant_entries = self.knowledge.search(user_message, DEFAULT_MAX_RESULTS);
        let signals = analyze_message(user_message, history);

        let reply = generator::generate_reply(
            self.model.as_ref(),
            &relevant_entries,
            history,
            user_message,
        )
        .await?;

        let meta = TurnMeta {
            sources: relevant_entries.iter().map(|e| e.id.clone()).collect(),
            escalation_suggested: signals.escalation_suggested,
            booking_suggested: signals.booking_suggested,
            model: self.model_name.clone(),
        };

        // Persist the reply and run the escalation judgment concurrently;
        // both must finish before the turn advances. The judge cannot fail
        // the turn, a failed reply write does.
        let (persisted, judge_report) = futures::join!(
            self.store
                .append_turn(chat_id, TurnRole::Bot, &reply.content, Some(meta.clone())),
            judge::assess(self.model.as_ref(), user_message, history),
        );
        let message = persisted.map_err(TurnError::Persistence)?;

        // Confidence policy. Best-effort: the reply has already been
        // delivered, so a failed status flip never rolls the turn back.
        let verdict = &judge_report.verdict;
        if verdict.escalation_needed && verdict.confidence > ESCALATION_CONFIDENCE_THRESHOLD {
            info!(
                "Escalation detected for chat {chat_id} (confidence: {})",
                verdict.confidence
            );
            let patch = ChatPatch {
                status: Some(ChatStatus::Escalated),
                last_message_at: Some(Utc::now()),
                ..ChatPatch::default()
            };
            if let Err(e) = self.store.update_chat(chat_id, patch).await {
                warn!("Failed to update chat {chat_id} status to escalated: {e}");
            }
        }

        self.record_reply_audit(
            chat_id,
            message.id,
            &reply,
            user_message,
            history.len(),
            relevant_entries.len(),
        )
        .await;
        if judge_report.has_model_output() {
            self.record_judgment_audit(chat_id, message.id, &judge_report, user_message, history.len())
                .await;
        }

        Ok(TurnOutcome::Completed(TurnResult {
            message,
            sources: relevant_entries,
            analysis: TurnAnalysis {
                escalation_suggested: signals.escalation_suggested,
                booking_suggested: signals.booking_suggested,
                escalation_analysis: Some(judge_report.verdict),
            },
        }))
    }

    async fn record_reply_audit(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        reply: &generator::GeneratedReply,
        user_message: &str,
        history_len: usize,
        sources_len: usize,
    ) {
        let entry = AuditEntry {
            chat_id,
            message_id: Some(message_id),
            model: self.model_name.clone(),
            prompt: reply.system_prompt.clone(),
            context: json!({
                "userMessage": user_message,
                "historyLength": history_len,
                "knowledgeBaseSources": sources_len,
            })
            .to_string(),
            response: reply.content.clone(),
            usage: serialize_usage(reply.usage.as_ref()),
        };
        if let Err(e) = self.store.record_audit(entry).await {
            warn!("Failed to record reply audit for chat {chat_id}: {e}");
        }
    }

    async fn record_judgment_audit(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        report: &judge::JudgeReport,
        user_message: &str,
        history_len: usize,
    ) {
        let entry = AuditEntry {
            chat_id,
            message_id: Some(message_id),
            model: self.model_name.clone(),
            prompt: report.prompt.clone(),
            context: json!({
                "userMessage": user_message,
                "conversationLength": history_len,
                "escalationAnalysis": "AI-powered analysis",
            })
            .to_string(),
            response: report.raw_response.clone().unwrap_or_default(),
            usage: serialize_usage(report.usage.as_ref()),
        };
        if let Err(e) = self.store.record_audit(entry).await {
            warn!("Failed to record judgment audit for chat {chat_id}: {e}");
        }
    }
}

fn serialize_usage(usage: Option<&crate::domain::LlmUsage>) -> String {
    usage
        .and_then(|u| serde_json::to_string(u).ok())
        .unwrap_or_else(|| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Chat, ConversationTurn, KnowledgeEntry};
    use crate::ports::{Completion, ModelMessage, PortResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    //=====================================================================================
    // Test doubles
    //=====================================================================================

    /// Hands out scripted completions in order and counts invocations.
    struct ScriptedModel {
        responses: Mutex<VecDeque<PortResult<Completion>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(responses: Vec<PortResult<Completion>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn text(text: &str) -> PortResult<Completion> {
            Ok(Completion {
                text: text.to_string(),
                usage: None,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(
            &self,
            _messages: &[ModelMessage],
            _max_output_tokens: u32,
            _temperature: f32,
        ) -> PortResult<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PortError::Unexpected("script exhausted".to_string())))
        }
    }

    /// Records every write the orchestrator makes against a single chat.
    struct RecordingStore {
        chat: Mutex<Chat>,
        turns: Mutex<Vec<ConversationTurn>>,
        audits: Mutex<Vec<AuditEntry>>,
        patches: Mutex<Vec<ChatPatch>>,
        get_calls: AtomicUsize,
        fail_append: bool,
        fail_update: bool,
        fail_audit: bool,
    }

    impl RecordingStore {
        fn new(chat: Chat) -> Self {
            Self {
                chat: Mutex::new(chat),
                turns: Mutex::new(Vec::new()),
                audits: Mutex::new(Vec::new()),
                patches: Mutex::new(Vec::new()),
                get_calls: AtomicUsize::new(0),
                fail_append: false,
                fail_update: false,
                fail_audit: false,
            }
        }
    }

    #[async_trait]
    impl ChatStore for RecordingStore {
        async fn create_chat(&self, _user_id: Uuid, _title: &str) -> PortResult<Chat> {
            Err(PortError::Unexpected("not used in tests".to_string()))
        }

        async fn get_chat(&self, _chat_id: Uuid) -> PortResult<Chat> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.chat.lock().unwrap().clone())
        }

        async fn list_chats(&self) -> PortResult<Vec<Chat>> {
            Ok(vec![self.chat.lock().unwrap().clone()])
        }

        async fn update_chat(&self, _chat_id: Uuid, patch: ChatPatch) -> PortResult<Chat> {
            if self.fail_update {
                return Err(PortError::Unexpected("update refused".to_string()));
            }
            let mut chat = self.chat.lock().unwrap();
            if let Some(status) = patch.status {
                chat.status = status;
            }
            if let Some(flag) = patch.admin_taken_over {
                chat.admin_taken_over = flag;
            }
            if let Some(at) = patch.last_message_at {
                chat.last_message_at = at;
            }
            self.patches.lock().unwrap().push(patch);
            Ok(chat.clone())
        }

        async fn append_turn(
            &self,
            chat_id: Uuid,
            role: TurnRole,
            content: &str,
            meta: Option<TurnMeta>,
        ) -> PortResult<ConversationTurn> {
            if self.fail_append {
                return Err(PortError::Unexpected("insert refused".to_string()));
            }
            let turn = ConversationTurn {
                id: Uuid::new_v4(),
                chat_id,
                role,
                content: content.to_string(),
                meta,
                created_at: Utc::now(),
            };
            self.turns.lock().unwrap().push(turn.clone());
            Ok(turn)
        }

        async fn turns_for_chat(
            &self,
            _chat_id: Uuid,
            _count: i64,
        ) -> PortResult<Vec<ConversationTurn>> {
            Ok(self.turns.lock().unwrap().clone())
        }

        async fn record_audit(&self, entry: AuditEntry) -> PortResult<()> {
            if self.fail_audit {
                return Err(PortError::Unexpected("audit refused".to_string()));
            }
            self.audits.lock().unwrap().push(entry);
            Ok(())
        }
    }

    //=====================================================================================
    // Fixtures
    //=====================================================================================

    fn open_chat() -> Chat {
        Chat {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Student Support Chat".to_string(),
            status: ChatStatus::Open,
            admin_taken_over: false,
            created_at: Utc::now(),
            last_message_at: Utc::now(),
        }
    }

    fn sample_knowledge() -> KnowledgeBase {
        KnowledgeBase::new(vec![KnowledgeEntry {
            id: "kb-fees".to_string(),
            title: "Tuition Fees".to_string(),
            keywords: vec!["tuition".to_string(), "fees".to_string()],
            text: "Undergraduate tuition is 9,250 GBP per year.".to_string(),
        }])
    }

    fn verdict_json(needed: bool, confidence: f64) -> String {
        json!({
            "escalationNeeded": needed,
            "confidence": confidence,
            "reasons": ["student is frustrated"],
            "suggestedResponse": "Hand over to an adviser",
        })
        .to_string()
    }

    fn orchestrator(
        store: Arc<RecordingStore>,
        model: Arc<ScriptedModel>,
    ) -> TurnOrchestrator {
        TurnOrchestrator::new(store, model, sample_knowledge(), "gpt-4o-mini".to_string())
    }

    //=====================================================================================
    // Tests
    //=====================================================================================

    #[tokio::test]
    async fn takeover_skips_with_zero_model_calls_and_zero_writes() {
        let mut chat = open_chat();
        chat.admin_taken_over = true;
        let chat_id = chat.id;
        let store = Arc::new(RecordingStore::new(chat));
        let model = Arc::new(ScriptedModel::new(vec![]));
        let orchestrator = orchestrator(store.clone(), model.clone());

        let outcome = orchestrator.run_turn(chat_id, "hello", &[]).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::SkippedAdminActive));
        assert_eq!(model.call_count(), 0);
        assert!(store.turns.lock().unwrap().is_empty());
        assert!(store.audits.lock().unwrap().is_empty());
        assert!(store.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn takeover_flag_is_read_fresh_each_turn() {
        let chat = open_chat();
        let chat_id = chat.id;
        let store = Arc::new(RecordingStore::new(chat));
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("First reply."),
            ScriptedModel::text(&verdict_json(false, 0.2)),
        ]));
        let orchestrator = orchestrator(store.clone(), model.clone());

        orchestrator.run_turn(chat_id, "hello", &[]).await.unwrap();
        store.chat.lock().unwrap().admin_taken_over = true;
        let outcome = orchestrator.run_turn(chat_id, "hello again", &[]).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::SkippedAdminActive));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 2);
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn normal_turn_persists_reply_with_sources_in_meta() {
        let chat = open_chat();
        let chat_id = chat.id;
        let store = Arc::new(RecordingStore::new(chat));
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("Tuition is 9,250 GBP per year [kb-fees]."),
            ScriptedModel::text(&verdict_json(false, 0.2)),
        ]));
        let orchestrator = orchestrator(store.clone(), model);

        let outcome = orchestrator
            .run_turn(
                chat_id,
                "What are the tuition fees for undergraduate programs?",
                &[],
            )
            .await
            .unwrap();

        let result = match outcome {
            TurnOutcome::Completed(result) => result,
            other => panic!("expected completed turn, got {other:?}"),
        };
        assert_eq!(result.sources[0].id, "kb-fees");

        let turns = store.turns.lock().unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, TurnRole::Bot);
        let meta = turns[0].meta.as_ref().unwrap();
        assert!(meta.sources.contains(&"kb-fees".to_string()));
        assert_eq!(meta.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn high_confidence_escalation_flips_status_and_writes_two_audits() {
        let chat = open_chat();
        let chat_id = chat.id;
        let store = Arc::new(RecordingStore::new(chat));
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("I understand your frustration; let me help."),
            ScriptedModel::text(&verdict_json(true, 0.85)),
        ]));
        let orchestrator = orchestrator(store.clone(), model);

        let outcome = orchestrator
            .run_turn(
                chat_id,
                "I am extremely frustrated, nothing is working, I need to speak to a human now",
                &[],
            )
            .await
            .unwrap();

        assert_eq!(store.chat.lock().unwrap().status, ChatStatus::Escalated);
        assert_eq!(store.audits.lock().unwrap().len(), 2);

        let result = match outcome {
            TurnOutcome::Completed(result) => result,
            other => panic!("expected completed turn, got {other:?}"),
        };
        let verdict = result.analysis.escalation_analysis.unwrap();
        assert!(verdict.escalation_needed);
        assert!(result.analysis.escalation_suggested);
    }

    #[tokio::test]
    async fn confidence_exactly_at_threshold_does_not_flip_status() {
        let chat = open_chat();
        let chat_id = chat.id;
        let store = Arc::new(RecordingStore::new(chat));
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("Reply."),
            ScriptedModel::text(&verdict_json(true, 0.7)),
        ]));
        let orchestrator = orchestrator(store.clone(), model);

        orchestrator.run_turn(chat_id, "hello", &[]).await.unwrap();

        assert_eq!(store.chat.lock().unwrap().status, ChatStatus::Open);
        assert!(store.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn confidence_just_above_threshold_flips_status() {
        let chat = open_chat();
        let chat_id = chat.id;
        let store = Arc::new(RecordingStore::new(chat));
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("Reply."),
            ScriptedModel::text(&verdict_json(true, 0.70001)),
        ]));
        let orchestrator = orchestrator(store.clone(), model);

        orchestrator.run_turn(chat_id, "hello", &[]).await.unwrap();

        assert_eq!(store.chat.lock().unwrap().status, ChatStatus::Escalated);
        let patches = store.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        assert!(patches[0].last_message_at.is_some());
    }

    #[tokio::test]
    async fn empty_reply_fails_the_turn_with_nothing_persisted() {
        let chat = open_chat();
        let chat_id = chat.id;
        let store = Arc::new(RecordingStore::new(chat));
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::text("")]));
        let orchestrator = orchestrator(store.clone(), model);

        let result = orchestrator.run_turn(chat_id, "hello", &[]).await;

        assert!(matches!(result, Err(TurnError::Generation(_))));
        assert!(store.turns.lock().unwrap().is_empty());
        assert!(store.audits.lock().unwrap().is_empty());
        assert!(store.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_judge_output_degrades_to_fallback_but_turn_completes() {
        let chat = open_chat();
        let chat_id = chat.id;
        let store = Arc::new(RecordingStore::new(chat));
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("Reply."),
            ScriptedModel::text("I would rather answer in prose."),
        ]));
        let orchestrator = orchestrator(store.clone(), model);

        let outcome = orchestrator.run_turn(chat_id, "hello", &[]).await.unwrap();

        let result = match outcome {
            TurnOutcome::Completed(result) => result,
            other => panic!("expected completed turn, got {other:?}"),
        };
        assert_eq!(
            result.analysis.escalation_analysis.unwrap(),
            judge::fallback_verdict()
        );
        // The reply still went out and no status flip happened.
        assert_eq!(store.turns.lock().unwrap().len(), 1);
        assert_eq!(store.chat.lock().unwrap().status, ChatStatus::Open);
        // Raw judge output existed, so both audit rows are written.
        assert_eq!(store.audits.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn judge_model_failure_skips_the_judgment_audit() {
        let chat = open_chat();
        let chat_id = chat.id;
        let store = Arc::new(RecordingStore::new(chat));
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("Reply."),
            Err(PortError::Unexpected("judge timed out".to_string())),
        ]));
        let orchestrator = orchestrator(store.clone(), model);

        let outcome = orchestrator.run_turn(chat_id, "hello", &[]).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Completed(_)));
        assert_eq!(store.audits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reply_persist_failure_fails_the_turn() {
        let chat = open_chat();
        let chat_id = chat.id;
        let mut store = RecordingStore::new(chat);
        store.fail_append = true;
        let store = Arc::new(store);
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("Reply."),
            ScriptedModel::text(&verdict_json(false, 0.2)),
        ]));
        let orchestrator = orchestrator(store.clone(), model);

        let result = orchestrator.run_turn(chat_id, "hello", &[]).await;

        assert!(matches!(result, Err(TurnError::Persistence(_))));
        assert!(store.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_update_failure_does_not_fail_the_turn() {
        let chat = open_chat();
        let chat_id = chat.id;
        let mut store = RecordingStore::new(chat);
        store.fail_update = true;
        let store = Arc::new(store);
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("Reply."),
            ScriptedModel::text(&verdict_json(true, 0.9)),
        ]));
        let orchestrator = orchestrator(store.clone(), model);

        let outcome = orchestrator.run_turn(chat_id, "hello", &[]).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Completed(_)));
        // Status is stale but the reply and audits still landed.
        assert_eq!(store.chat.lock().unwrap().status, ChatStatus::Open);
        assert_eq!(store.audits.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn audit_failure_does_not_fail_the_turn() {
        let chat = open_chat();
        let chat_id = chat.id;
        let mut store = RecordingStore::new(chat);
        store.fail_audit = true;
        let store = Arc::new(store);
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("Reply."),
            ScriptedModel::text(&verdict_json(false, 0.2)),
        ]));
        let orchestrator = orchestrator(store.clone(), model);

        let outcome = orchestrator.run_turn(chat_id, "hello", &[]).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Completed(_)));
        assert_eq!(store.turns.lock().unwrap().len(), 1);
    }
}
