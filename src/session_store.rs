//! Per-user session storage
//!
//! Sessions live in memory for the life of the process. Ordering of
//! read-modify-write cycles for one user is the runtime's job, not the
//! store's.

use crate::state_machine::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage for conversation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session for `user_id`, or a fresh main-menu session
    async fn get_or_create(&self, user_id: &str) -> Session;

    /// Replace the stored session for `session.user_id`
    async fn save(&self, session: Session);

    /// Number of users with a stored session
    async fn len(&self) -> usize;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get_or_create(&self, user_id: &str) -> Session {
        (**self).get_or_create(user_id).await
    }

    async fn save(&self, session: Session) {
        (**self).save(session).await;
    }

    async fn len(&self) -> usize {
        (**self).len().await
    }
}

/// Process-local session map
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, user_id: &str) -> Session {
        if let Some(session) = self.sessions.read().await.get(user_id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(user_id = %user_id, "Creating session");
                Session::new(user_id)
            })
            .clone()
    }

    async fn save(&self, session: Session) {
        tracing::debug!(user_id = %session.user_id, state = %session.state, "Saving session");
        self.sessions
            .write()
            .await
            .insert(session.user_id.clone(), session);
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
