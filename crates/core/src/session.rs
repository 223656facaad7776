use crate::models::{ChatMessage, Role};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub const DEFAULT_SESSION_ID: &str = "default";

/// Conversation history keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Snapshot of the history for `session_id`, creating an empty one when
    /// the id is new.
    async fn get_or_create(&self, session_id: &str) -> Vec<ChatMessage>;

    async fn append(&self, session_id: &str, role: Role, content: &str);

    /// Appends one user message followed by one assistant message.
    async fn record_turn(&self, session_id: &str, user: &str, assistant: &str) {
        self.append(session_id, Role::User, user).await;
        self.append(session_id, Role::Assistant, assistant).await;
    }
}

/// Process-lifetime store. Histories are never pruned and are lost on exit.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> Vec<ChatMessage> {
        if let Some(history) = self.sessions.read().await.get(session_id) {
            return history.clone();
        }

        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    async fn append(&self, session_id: &str, role: Role, content: &str) {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(ChatMessage {
                role,
                content: content.to_string(),
            });
    }

    async fn record_turn(&self, session_id: &str, user: &str, assistant: &str) {
        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(ChatMessage::user(user));
        history.push(ChatMessage::assistant(assistant));
    }
}
