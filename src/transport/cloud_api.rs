//! WhatsApp Cloud API transport

use super::{user_id_of, ChatTransport, InboundMessage, TransportError};
use crate::config::WhatsAppConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Graph API client bound to one business phone number
pub struct CloudApiTransport {
    client: Client,
    token: String,
    messages_url: String,
    phone_url: String,
    closed: AtomicBool,
}

impl CloudApiTransport {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;

        let base = config.api_base.trim_end_matches('/');
        Ok(Self {
            client,
            token: config.token.clone(),
            messages_url: format!("{base}/{}/messages", config.phone_number_id),
            phone_url: format!("{base}/{}", config.phone_number_id),
            closed: AtomicBool::new(false),
        })
    }

    /// Build the client and check the access token against the phone number
    pub async fn connect(config: &WhatsAppConfig) -> Result<Self, TransportError> {
        let transport = Self::new(config)?;

        let response = transport
            .client
            .get(&transport.phone_url)
            .bearer_auth(&transport.token)
            .send()
            .await
            .map_err(classify_request_error)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to read response: {e}")))?;
        check_status(status, body)?;

        tracing::info!(url = %transport.phone_url, "WhatsApp Cloud API credentials verified");
        Ok(transport)
    }

    async fn post(&self, body: &Value) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        check_status(status, text)
    }
}

fn classify_request_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        TransportError::Network(format!("Connection failed: {e}"))
    } else {
        TransportError::Network(format!("Request failed: {e}"))
    }
}

fn check_status(status: StatusCode, body: String) -> Result<(), TransportError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TransportError::Auth(body)),
        s => Err(TransportError::Api {
            status: s.as_u16(),
            body,
        }),
    }
}

fn text_message(to: &str, text: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": { "preview_url": false, "body": text }
    })
}

fn typing_indicator(message_id: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "status": "read",
        "message_id": message_id,
        "typing_indicator": { "type": "text" }
    })
}

#[async_trait]
impl ChatTransport for CloudApiTransport {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        let to = user_id_of(chat_id);
        tracing::debug!(to = %to, chars = text.chars().count(), "Sending text");
        self.post(&text_message(to, text)).await
    }

    async fn set_typing(&self, message: &InboundMessage) -> Result<(), TransportError> {
        let Some(id) = message.id.as_deref() else {
            return Ok(());
        };
        self.post(&typing_indicator(id)).await
    }

    async fn clear_typing(&self, _chat_id: &str) -> Result<(), TransportError> {
        // The Cloud API drops the indicator on the next reply or after 25s
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!("WhatsApp Cloud API transport closed");
        }
    }
}
