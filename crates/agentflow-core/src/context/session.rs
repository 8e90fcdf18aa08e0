use super::state::Turn;
use crate::error::FlowError;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Stores conversation turns between runs, keyed by a caller-chosen session id.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Vec<Turn>, FlowError>;

    /// Replace the stored turns for `session_id`.
    async fn save(&self, session_id: &str, turns: &[Turn]) -> Result<(), FlowError>;

    async fn remove(&self, session_id: &str) -> Result<(), FlowError>;
}

/// Session store that lives as long as the value holding it.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
    max_turns: Option<usize>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the most recent `max` turns per session.
    pub fn with_max_turns(mut self, max: usize) -> Self {
        self.max_turns = Some(max);
        self
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Vec<Turn>, FlowError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, session_id: &str, turns: &[Turn]) -> Result<(), FlowError> {
        let skip = match self.max_turns {
            Some(max) => turns.len().saturating_sub(max),
            None => 0,
        };
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), turns[skip..].to_vec());
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), FlowError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}
