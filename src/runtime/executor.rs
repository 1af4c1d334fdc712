//! Per-user conversation runtime

use super::RuntimeEvent;
use crate::config::ThinkDelay;
use crate::directory::ClinicDirectory;
use crate::replies;
use crate::session_store::SessionStore;
use crate::shutdown::Shutdown;
use crate::state_machine::{transition, Effect};
use crate::transport::{ChatTransport, InboundMessage, TransportError};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Generic user runtime that can work with any store and transport
pub struct SessionRuntime<S, T>
where
    S: SessionStore + 'static,
    T: ChatTransport + 'static,
{
    user_id: String,
    directory: Arc<ClinicDirectory>,
    store: Arc<S>,
    transport: Arc<T>,
    think_delay: ThinkDelay,
    shutdown: Shutdown,
    message_rx: mpsc::Receiver<InboundMessage>,
    events_tx: broadcast::Sender<RuntimeEvent>,
}

impl<S, T> SessionRuntime<S, T>
where
    S: SessionStore + 'static,
    T: ChatTransport + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        directory: Arc<ClinicDirectory>,
        store: Arc<S>,
        transport: Arc<T>,
        think_delay: ThinkDelay,
        shutdown: Shutdown,
        message_rx: mpsc::Receiver<InboundMessage>,
        events_tx: broadcast::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            user_id,
            directory,
            store,
            transport,
            think_delay,
            shutdown,
            message_rx,
            events_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(user_id = %self.user_id, "Starting user runtime");
        let token = self.shutdown.token();

        // Process messages one at a time, in arrival order
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                message = self.message_rx.recv() => match message {
                    Some(message) => self.process_message(message).await,
                    None => break,
                },
            }
        }

        tracing::debug!(user_id = %self.user_id, "User runtime stopped");
    }

    async fn process_message(&mut self, message: InboundMessage) {
        let chat_id = message.from.clone();

        if let Err(e) = self.transport.set_typing(&message).await {
            tracing::warn!(user_id = %self.user_id, error = %e, "Failed to show typing indicator");
        }
        if !self.think().await {
            tracing::debug!(user_id = %self.user_id, "Shutdown during think delay");
            return;
        }
        if let Err(e) = self.transport.clear_typing(&chat_id).await {
            tracing::warn!(user_id = %self.user_id, error = %e, "Failed to clear typing indicator");
        }

        let session = self.store.get_or_create(&self.user_id).await;
        let result = transition(&session, &self.directory, &message.body);
        if result.is_noop(&session) {
            return;
        }

        tracing::info!(
            user_id = %self.user_id,
            from = %session.state,
            to = %result.new_session.state,
            replies = result.effects.len(),
            "Conversation transition"
        );

        // Commit only once the user has actually seen the replies
        match self.execute_effects(&chat_id, &result.effects).await {
            Ok(()) => {
                let state = result.new_session.state;
                self.store.save(result.new_session).await;
                let _ = self.events_tx.send(RuntimeEvent::Committed {
                    user_id: self.user_id.clone(),
                    state,
                });
            }
            Err(e) => {
                tracing::error!(
                    user_id = %self.user_id,
                    state = %session.state,
                    error = %e,
                    "Failed to send reply, session not updated"
                );
                if e.is_auth() {
                    self.shutdown
                        .trigger_fatal(format!("Chat network rejected credentials: {e}"));
                } else {
                    self.apologize(&chat_id).await;
                }
                let _ = self.events_tx.send(RuntimeEvent::SendFailed {
                    user_id: self.user_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Simulated typing pause; `false` if shutdown interrupted it
    async fn think(&self) -> bool {
        let delay = self.think_delay.sample();
        if delay.is_zero() {
            return true;
        }
        let token = self.shutdown.token();
        tokio::select! {
            () = token.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    async fn execute_effects(&self, chat_id: &str, effects: &[Effect]) -> Result<(), TransportError> {
        for effect in effects {
            match effect {
                Effect::Reply { text } => self.transport.send_text(chat_id, text).await?,
            }
        }
        Ok(())
    }

    /// One best-effort apology; its own failure is only logged
    async fn apologize(&self, chat_id: &str) {
        if let Err(e) = self.transport.send_text(chat_id, &replies::apology()).await {
            tracing::error!(user_id = %self.user_id, error = %e, "Failed to send apology");
        }
    }
}
