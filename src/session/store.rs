//! Process-lifetime storage for sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::Session;

/// Key used by surfaces that keep a single conversation per process
pub const DEFAULT_SESSION_KEY: &str = "default";

/// A session shared between the surface and the task running a turn.
///
/// Holding the lock for the whole turn keeps turns strictly sequential.
pub type SharedSession = Arc<Mutex<Session>>;

/// Key/value store holding sessions for as long as the process runs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session for `key`, creating and seeding it on first use.
    async fn get_or_init(&self, key: &str) -> SharedSession;

    /// Returns the session for `key` if it was ever initialized.
    async fn get(&self, key: &str) -> Option<SharedSession>;
}

/// In-memory [`SessionStore`]; nothing survives a restart.
pub struct MemorySessionStore {
    system_prompt: String,
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl MemorySessionStore {
    /// Creates an empty store whose sessions are seeded with `system_prompt`.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(super::DEFAULT_SYSTEM_PROMPT)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_init(&self, key: &str) -> SharedSession {
        if let Some(session) = self.sessions.read().await.get(key) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(self.system_prompt.clone()))))
            .clone()
    }

    async fn get(&self, key: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;

    #[tokio::test]
    async fn sessions_are_seeded_once_and_reused() {
        let store = MemorySessionStore::new("custom instruction");
        assert!(store.get(DEFAULT_SESSION_KEY).await.is_none());

        let first = store.get_or_init(DEFAULT_SESSION_KEY).await;
        first
            .lock()
            .await
            .append(ChatMessage::user().content("Hello").build());

        let again = store.get_or_init(DEFAULT_SESSION_KEY).await;
        assert!(Arc::ptr_eq(&first, &again));

        let session = again.lock().await;
        assert_eq!(session.len(), 2);
        assert_eq!(session.system_prompt(), "custom instruction");
    }
}
