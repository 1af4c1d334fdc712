//! WhatsApp Cloud API webhook
//!
//! Meta verifies the endpoint with a GET handshake, then POSTs change
//! notifications. Each notification can carry chat messages and delivery
//! statuses; both are turned into [`InboundMessage`]s and handed to the
//! registered [`MessageHandler`].

use super::{InboundMessage, GROUP_DOMAIN};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Domain appended to individual senders' phone numbers
const USER_DOMAIN: &str = "c.us";

/// Receiver of inbound chat traffic
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, message: InboundMessage);
}

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    pub verify_token: Arc<str>,
    pub handler: Arc<dyn MessageHandler>,
}

/// Create the webhook router
pub fn create_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Subscription handshake
// ============================================================

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

async fn verify_webhook(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyQuery>,
) -> impl IntoResponse {
    let token_ok = params.verify_token.as_deref() == Some(&*state.verify_token);
    match (params.mode.as_deref(), params.challenge) {
        (Some("subscribe"), Some(challenge)) if token_ok => {
            tracing::info!("Webhook subscription verified");
            (StatusCode::OK, challenge)
        }
        _ => {
            tracing::warn!(mode = ?params.mode, "Rejected webhook verification");
            (StatusCode::FORBIDDEN, "Invalid verify token".to_string())
        }
    }
}

// ============================================================
// Change notifications
// ============================================================

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<CloudMessage>,
    #[serde(default)]
    pub statuses: Vec<CloudStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CloudMessage {
    pub id: Option<String>,
    pub from: Option<String>,
    /// Present when the message was posted in a group
    pub group_id: Option<String>,
    pub text: Option<TextBody>,
    pub interactive: Option<Interactive>,
    pub button: Option<ButtonBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ButtonBody {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct Interactive {
    pub button_reply: Option<ReplyRow>,
    pub list_reply: Option<ReplyRow>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRow {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct CloudStatus {
    pub id: Option<String>,
    pub recipient_id: Option<String>,
    pub status: Option<String>,
}

impl CloudMessage {
    /// Text the user typed or the title of the option they tapped
    fn body(&self) -> String {
        if let Some(text) = &self.text {
            return text.body.clone();
        }
        if let Some(interactive) = &self.interactive {
            if let Some(row) = interactive.button_reply.as_ref().or(interactive.list_reply.as_ref()) {
                return row.title.clone();
            }
        }
        if let Some(button) = &self.button {
            return button.text.clone();
        }
        String::new()
    }

    /// `None` when the sender is missing
    fn into_inbound(self) -> Option<InboundMessage> {
        let body = self.body();
        let from = match (&self.group_id, &self.from) {
            (Some(group), _) => format!("{group}@{GROUP_DOMAIN}"),
            (None, Some(sender)) => format!("{sender}@{USER_DOMAIN}"),
            (None, None) => return None,
        };
        Some(InboundMessage {
            id: self.id,
            from,
            body,
            is_status: false,
        })
    }
}

impl CloudStatus {
    fn into_inbound(self) -> Option<InboundMessage> {
        let recipient = self.recipient_id?;
        Some(InboundMessage {
            id: self.id,
            from: format!("{recipient}@{USER_DOMAIN}"),
            body: self.status.unwrap_or_default(),
            is_status: true,
        })
    }
}

impl WebhookPayload {
    /// Flatten every message and status in the notification, skipping
    /// items without an addressable chat
    pub fn into_inbound(self) -> Vec<InboundMessage> {
        self.entry
            .into_iter()
            .flat_map(|entry| entry.changes)
            .flat_map(|change| {
                let ChangeValue { messages, statuses } = change.value;
                messages
                    .into_iter()
                    .filter_map(CloudMessage::into_inbound)
                    .chain(statuses.into_iter().filter_map(CloudStatus::into_inbound))
            })
            .collect()
    }
}

async fn receive_webhook(State(state): State<WebhookState>, body: Bytes) -> &'static str {
    // Always acknowledge, even unreadable notifications, so Meta does not redeliver
    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => {
            for message in payload.into_inbound() {
                state.handler.on_message(message).await;
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "Unreadable webhook notification");
        }
    }
    "EVENT_RECEIVED"
}
