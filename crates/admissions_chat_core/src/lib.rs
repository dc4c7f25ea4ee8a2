pub mod analysis;
pub mod domain;
pub mod generator;
pub mod judge;
pub mod knowledge;
pub mod orchestrator;
pub mod ports;
pub mod prompts;

pub use domain::{
    AuditEntry, Chat, ChatPatch, ChatStatus, ConversationSignals, ConversationTurn,
    EscalationVerdict, HistoryEntry, KnowledgeEntry, LlmUsage, TurnAnalysis, TurnMeta,
    TurnOutcome, TurnResult, TurnRole,
};
pub use generator::GenerationError;
pub use knowledge::KnowledgeBase;
pub use orchestrator::{TurnError, TurnOrchestrator, ESCALATION_CONFIDENCE_THRESHOLD};
pub use ports::{
    ChatStore, Completion, LanguageModel, MessageRole, ModelMessage, PortError, PortResult,
};
