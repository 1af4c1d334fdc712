//! Chat transport abstraction
//!
//! The bot only needs to send text, toggle a typing indicator and shut the
//! connection down. Inbound traffic arrives through the webhook router and is
//! handed to the runtime as [`InboundMessage`]s.

mod cloud_api;
pub mod webhook;

pub use cloud_api::CloudApiTransport;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Domain suffix WhatsApp uses for group chats
const GROUP_DOMAIN: &str = "g.us";

/// Transport failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// Credentials rejected; the operator has to re-provision the token
    #[error("Authentication with the chat network failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Chat API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    pub fn is_auth(&self) -> bool {
        matches!(self, TransportError::Auth(_))
    }
}

/// A message received from the chat network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Network-assigned message id, used for read receipts
    pub id: Option<String>,
    /// Chat identifier, `<user>@<domain>`
    pub from: String,
    pub body: String,
    /// Status broadcast (delivery receipts, stories) rather than a chat message
    pub is_status: bool,
}

impl InboundMessage {
    #[allow(dead_code)] // Used in tests
    pub fn text(from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: None,
            from: from.into(),
            body: body.into(),
            is_status: false,
        }
    }

    /// Session key: the part of the chat id before `@`
    pub fn user_id(&self) -> &str {
        user_id_of(&self.from)
    }

    pub fn is_group(&self) -> bool {
        self.from
            .split_once('@')
            .is_some_and(|(_, domain)| domain == GROUP_DOMAIN)
    }

    /// Status updates, group chats and blank texts never reach the state machine
    pub fn should_ignore(&self) -> bool {
        self.is_status || self.is_group() || self.body.trim().is_empty()
    }
}

/// Strip the domain from a chat identifier
pub fn user_id_of(chat_id: &str) -> &str {
    chat_id.split_once('@').map_or(chat_id, |(user, _)| user)
}

/// Outbound side of the chat network
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a plain text message to a chat
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError>;

    /// Show the "typing…" indicator in reply to `message`
    async fn set_typing(&self, message: &InboundMessage) -> Result<(), TransportError>;

    /// Hide the typing indicator
    async fn clear_typing(&self, chat_id: &str) -> Result<(), TransportError>;

    /// Release the connection; later sends fail with [`TransportError::Closed`]
    async fn close(&self);
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        (**self).send_text(chat_id, text).await
    }

    async fn set_typing(&self, message: &InboundMessage) -> Result<(), TransportError> {
        (**self).set_typing(message).await
    }

    async fn clear_typing(&self, chat_id: &str) -> Result<(), TransportError> {
        (**self).clear_typing(chat_id).await
    }

    async fn close(&self) {
        (**self).close().await;
    }
}
