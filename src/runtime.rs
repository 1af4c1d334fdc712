//! Runtime for executing conversations
//!
//! Every user gets a dedicated actor task fed by a channel, so messages from
//! one user are handled strictly in arrival order while different users run
//! concurrently.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::config::ThinkDelay;
use crate::directory::ClinicDirectory;
use crate::session_store::{InMemorySessionStore, SessionStore};
use crate::shutdown::Shutdown;
use crate::state_machine::ConversationState;
use crate::transport::webhook::MessageHandler;
use crate::transport::{ChatTransport, CloudApiTransport, InboundMessage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Type alias for production runtime with concrete implementations
pub type ProductionManager = RuntimeManager<InMemorySessionStore, CloudApiTransport>;

/// Per-user inbox depth before dispatch starts waiting
const INBOX_CAPACITY: usize = 32;

/// Handle to interact with a running user actor
pub struct SessionHandle {
    pub message_tx: mpsc::Sender<InboundMessage>,
}

/// What happened to a processed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// Replies were sent and the new state stored
    Committed {
        user_id: String,
        state: ConversationState,
    },
    /// A send failed; the stored session was left as it was
    SendFailed { user_id: String, error: String },
}

/// Manager for all per-user runtimes
pub struct RuntimeManager<S, T>
where
    S: SessionStore + 'static,
    T: ChatTransport + 'static,
{
    directory: Arc<ClinicDirectory>,
    store: Arc<S>,
    transport: Arc<T>,
    think_delay: ThinkDelay,
    shutdown: Shutdown,
    sessions: RwLock<HashMap<String, SessionHandle>>,
    events_tx: broadcast::Sender<RuntimeEvent>,
}

impl<S, T> RuntimeManager<S, T>
where
    S: SessionStore + 'static,
    T: ChatTransport + 'static,
{
    pub fn new(
        directory: Arc<ClinicDirectory>,
        store: Arc<S>,
        transport: Arc<T>,
        think_delay: ThinkDelay,
        shutdown: Shutdown,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(128);
        Self {
            directory,
            store,
            transport,
            think_delay,
            shutdown,
            sessions: RwLock::new(HashMap::new()),
            events_tx,
        }
    }

    /// Route an inbound message to its user's actor
    ///
    /// Status updates, group chats and blank texts are dropped here, before
    /// any session is touched. Never waits on the actor: a message for a full
    /// inbox is dropped.
    pub async fn dispatch(&self, message: InboundMessage) {
        if message.should_ignore() {
            tracing::debug!(
                from = %message.from,
                is_status = message.is_status,
                "Ignoring inbound message"
            );
            return;
        }
        if self.shutdown.is_triggered() {
            tracing::debug!(from = %message.from, "Shutting down, dropping message");
            return;
        }

        let user_id = message.user_id().to_string();
        let message_tx = self.get_or_spawn(&user_id).await;
        match message_tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    user_id = %user_id,
                    capacity = INBOX_CAPACITY,
                    "User inbox full, dropping message"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(user_id = %user_id, "User runtime is gone, dropping message");
                self.sessions.write().await.remove(&user_id);
            }
        }
    }

    /// Get or start the actor for a user
    async fn get_or_spawn(&self, user_id: &str) -> mpsc::Sender<InboundMessage> {
        // Check if already running
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(user_id) {
                if !handle.message_tx.is_closed() {
                    return handle.message_tx.clone();
                }
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(user_id) {
            if !handle.message_tx.is_closed() {
                return handle.message_tx.clone();
            }
        }

        let (message_tx, message_rx) = mpsc::channel(INBOX_CAPACITY);
        let runtime = SessionRuntime::new(
            user_id.to_string(),
            self.directory.clone(),
            self.store.clone(),
            self.transport.clone(),
            self.think_delay,
            self.shutdown.clone(),
            message_rx,
            self.events_tx.clone(),
        );

        let id = user_id.to_string();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::debug!(user_id = %id, "User runtime finished");
        });

        sessions.insert(
            user_id.to_string(),
            SessionHandle {
                message_tx: message_tx.clone(),
            },
        );
        tracing::info!(user_id = %user_id, active = sessions.len(), "Started user runtime");

        message_tx
    }

    /// Subscribe to processing outcomes
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events_tx.subscribe()
    }

    /// Number of users with a running actor
    pub async fn active_users(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

/// Log processing outcomes until every sender is gone
pub async fn log_events(mut events: broadcast::Receiver<RuntimeEvent>) {
    loop {
        match events.recv().await {
            Ok(RuntimeEvent::Committed { user_id, state }) => {
                tracing::debug!(user_id = %user_id, state = %state, "Session committed");
            }
            Ok(RuntimeEvent::SendFailed { user_id, error }) => {
                tracing::debug!(user_id = %user_id, error = %error, "Session left uncommitted");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[async_trait]
impl<S, T> MessageHandler for RuntimeManager<S, T>
where
    S: SessionStore + 'static,
    T: ChatTransport + 'static,
{
    async fn on_message(&self, message: InboundMessage) {
        self.dispatch(message).await;
    }
}
