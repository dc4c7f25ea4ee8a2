//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use admissions_chat_core::orchestrator::TurnOrchestrator;
use admissions_chat_core::ports::{ChatStore, LanguageModel};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub model: Arc<dyn LanguageModel>,
    pub orchestrator: Arc<TurnOrchestrator>,
    pub config: Arc<Config>,
}
