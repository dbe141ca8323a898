//! Per-session mutable state and the store seam that owns it.
//!
//! The core holds no global per-user maps: everything a session
//! accumulates lives in `SessionState`, fetched and persisted through the
//! `SessionStore` trait. Callers serialize access per session id (one
//! worker per session); the store only guards its own map.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::fsm::ConversationFsm;
use crate::types::{ChatMessage, SuggestionOutcome, SuggestionRecord};

/// Everything one session accumulates across turns.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub fsm: ConversationFsm,
    pub dialogue: Vec<ChatMessage>,
    pub suggestion_history: Vec<SuggestionRecord>,
    pub messages_since_suggest: u32,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            fsm: ConversationFsm::new(),
            dialogue: Vec::new(),
            suggestion_history: Vec::new(),
            messages_since_suggest: 0,
        }
    }

    /// Append a message and trim the window to `max_window` entries.
    pub fn push_message(&mut self, message: ChatMessage, max_window: usize) {
        self.dialogue.push(message);
        if self.dialogue.len() > max_window {
            let excess = self.dialogue.len() - max_window;
            self.dialogue.drain(..excess);
        }
    }

    /// Record a fresh pending suggestion and reset the cadence counter.
    pub fn record_suggestion(&mut self, practice_id: &str) {
        self.suggestion_history.push(SuggestionRecord {
            id: Uuid::new_v4().to_string(),
            practice_id: practice_id.to_string(),
            outcome: SuggestionOutcome::Pending,
            created_at: Utc::now(),
        });
        self.messages_since_suggest = 0;
    }

    /// Resolve the most recent pending suggestion. Returns false when
    /// there is nothing pending.
    pub fn resolve_last_suggestion(&mut self, outcome: SuggestionOutcome) -> bool {
        match self
            .suggestion_history
            .iter_mut()
            .rev()
            .find(|s| s.outcome == SuggestionOutcome::Pending)
        {
            Some(record) => {
                record.outcome = outcome;
                true
            }
            None => false,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Get/put session state by id. Implementations are shared across
/// sessions and must be `Send + Sync`; per-session write ordering is the
/// caller's contract.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> SessionState;
    async fn save(&self, session_id: &str, state: SessionState);
}

/// The in-memory implementation used by the core and by tests.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> SessionState {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn save(&self, session_id: &str, state: SessionState) {
        self.sessions
            .lock()
            .await
            .insert(session_id.to_string(), state);
    }
}
