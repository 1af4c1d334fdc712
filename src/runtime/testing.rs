//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::{RuntimeEvent, RuntimeManager};
use crate::config::ThinkDelay;
use crate::directory::{ClinicDirectory, Professional};
use crate::session_store::InMemorySessionStore;
use crate::shutdown::Shutdown;
use crate::transport::{ChatTransport, InboundMessage, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// Mock Transport
// ============================================================================

/// Transport that records successful sends and can be told to fail
#[derive(Default)]
pub struct MockTransport {
    /// Outcomes for upcoming send attempts; empty means success
    outcomes: Mutex<VecDeque<Result<(), TransportError>>>,
    /// Record of delivered messages as (chat id, text)
    pub sent: Mutex<Vec<(String, String)>>,
    pub typing_started: AtomicUsize,
    pub typing_cleared: AtomicUsize,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next unscripted send attempt
    pub fn queue_outcome(&self, outcome: Result<(), TransportError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Texts delivered to one chat, in order
    pub fn sent_to(&self, chat_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let outcome = self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
        }
        outcome
    }

    async fn set_typing(&self, _message: &InboundMessage) -> Result<(), TransportError> {
        self.typing_started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_typing(&self, _chat_id: &str) -> Result<(), TransportError> {
        self.typing_cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

pub type TestManager = RuntimeManager<InMemorySessionStore, MockTransport>;

/// Small clinic used by runtime tests
pub fn test_directory() -> ClinicDirectory {
    ClinicDirectory::new(
        "Clínica Test",
        vec![
            Professional::new("Dr. Gómez", &["Cardiología", "Clínica Médica"]),
            Professional::new("Dr. A", &["Pediatría"]),
        ],
        vec!["Cardiología".to_string(), "Pediatría".to_string()],
    )
}

pub struct TestRuntimeBuilder {
    directory: ClinicDirectory,
    transport: Arc<MockTransport>,
    think_delay: ThinkDelay,
}

impl TestRuntimeBuilder {
    pub fn directory(mut self, directory: ClinicDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn think_delay(mut self, think_delay: ThinkDelay) -> Self {
        self.think_delay = think_delay;
        self
    }

    pub fn build(self) -> TestRuntime {
        let shutdown = Shutdown::new();
        let store = Arc::new(InMemorySessionStore::new());
        let manager = Arc::new(RuntimeManager::new(
            Arc::new(self.directory),
            store.clone(),
            self.transport.clone(),
            self.think_delay,
            shutdown.clone(),
        ));
        let events_rx = manager.subscribe();

        TestRuntime {
            manager,
            store,
            transport: self.transport,
            shutdown,
            events_rx,
        }
    }
}

/// Fully wired runtime with an in-memory store and a mock transport
pub struct TestRuntime {
    pub manager: Arc<TestManager>,
    pub store: Arc<InMemorySessionStore>,
    pub transport: Arc<MockTransport>,
    pub shutdown: Shutdown,
    events_rx: broadcast::Receiver<RuntimeEvent>,
}

impl TestRuntime {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder {
            directory: test_directory(),
            transport: Arc::new(MockTransport::new()),
            think_delay: ThinkDelay::none(),
        }
    }

    /// Deliver a text from `chat_id`
    pub async fn send(&self, chat_id: &str, body: &str) {
        self.manager
            .dispatch(InboundMessage::text(chat_id, body))
            .await;
    }

    /// Next processing outcome, if one arrives within `timeout`
    pub async fn next_event(&mut self, timeout: Duration) -> Option<RuntimeEvent> {
        tokio::time::timeout(timeout, self.events_rx.recv())
            .await
            .ok()
            .and_then(Result::ok)
    }

    /// Wait for `n` outcomes and return them
    pub async fn wait_for_events(&mut self, n: usize, timeout: Duration) -> Vec<RuntimeEvent> {
        let mut events = Vec::with_capacity(n);
        while events.len() < n {
            match self.next_event(timeout).await {
                Some(event) => events.push(event),
                None => break,
            }
        }
        events
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replies;
    use crate::runtime::{log_events, INBOX_CAPACITY};
    use crate::session_store::SessionStore;
    use crate::state_machine::{ConversationState, Selection};

    const TIMEOUT: Duration = Duration::from_secs(2);
    const USER: &str = "5493411234567@c.us";
    const USER_ID: &str = "5493411234567";

    #[tokio::test]
    async fn test_mock_transport_outcomes() {
        let transport = MockTransport::new();
        transport.queue_outcome(Err(TransportError::Network("down".into())));

        assert!(transport.send_text("a@c.us", "one").await.is_err());
        assert!(transport.send_text("a@c.us", "two").await.is_ok());
        assert_eq!(transport.sent_to("a@c.us"), vec!["two".to_string()]);

        transport.close().await;
        assert!(matches!(
            transport.send_text("a@c.us", "three").await,
            Err(TransportError::Closed)
        ));
    }

    /// Integration test: specialty flow through to the booking stub
    #[tokio::test]
    async fn test_specialty_flow_end_to_end() {
        let directory = ClinicDirectory::new(
            "Clínica",
            vec![Professional::new("Dr. A", &["Pediatría"])],
            vec!["Pediatría".to_string()],
        );
        let mut rt = TestRuntime::new().directory(directory).build();

        for body in ["1", "2", "1", "1"] {
            rt.send(USER, body).await;
        }
        let events = rt.wait_for_events(4, TIMEOUT).await;
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[3],
            RuntimeEvent::Committed {
                user_id: USER_ID.to_string(),
                state: ConversationState::MainMenu,
            }
        );

        let sent = rt.transport.sent_to(USER);
        assert_eq!(sent.len(), 4);
        assert!(sent[1].contains("1. Pediatría"));
        assert_eq!(sent[2], replies::confirmation_prompt("Pediatría"));
        assert_eq!(
            sent[3],
            replies::booking_stub(&Selection::Specialty("Pediatría".into()))
        );

        let session = rt.store.get_or_create(USER_ID).await;
        assert_eq!(session.state, ConversationState::MainMenu);
        assert!(session.data.is_none());

        // Typing indicator toggled once per processed message
        assert_eq!(rt.transport.typing_started.load(Ordering::SeqCst), 4);
        assert_eq!(rt.transport.typing_cleared.load(Ordering::SeqCst), 4);
    }

    /// Status updates, groups and blank texts never reach a session
    #[tokio::test]
    async fn test_ignored_messages_produce_nothing() {
        let mut rt = TestRuntime::new().build();

        rt.send("1203630@g.us", "1").await;
        rt.send(USER, "   ").await;
        let mut status = InboundMessage::text(USER, "delivered");
        status.is_status = true;
        rt.manager.dispatch(status).await;

        assert!(rt.next_event(Duration::from_millis(100)).await.is_none());
        assert_eq!(rt.transport.sent_count(), 0);
        assert_eq!(rt.store.len().await, 0);
        assert_eq!(rt.manager.active_users().await, 0);
    }

    /// A failed send leaves the stored session untouched and apologizes
    #[tokio::test]
    async fn test_send_failure_does_not_commit() {
        let mut rt = TestRuntime::new().build();
        rt.transport
            .queue_outcome(Err(TransportError::Network("timeout".into())));

        rt.send(USER, "1").await;
        let event = rt.next_event(TIMEOUT).await.unwrap();
        assert!(matches!(event, RuntimeEvent::SendFailed { .. }));

        let session = rt.store.get_or_create(USER_ID).await;
        assert_eq!(session.state, ConversationState::MainMenu);
        assert_eq!(rt.transport.sent_to(USER), vec![replies::apology()]);

        // The user can simply retry
        rt.send(USER, "1").await;
        let event = rt.next_event(TIMEOUT).await.unwrap();
        assert_eq!(
            event,
            RuntimeEvent::Committed {
                user_id: USER_ID.to_string(),
                state: ConversationState::AwaitingAppointmentType,
            }
        );
    }

    /// Failure on the second of two replies still blocks the commit
    #[tokio::test]
    async fn test_partial_send_failure_does_not_commit() {
        let mut rt = TestRuntime::new().build();

        for body in ["1", "1", "1"] {
            rt.send(USER, body).await;
        }
        assert_eq!(rt.wait_for_events(3, TIMEOUT).await.len(), 3);
        let before = rt.store.get_or_create(USER_ID).await;
        assert_eq!(before.state, ConversationState::AwaitingConfirmation);

        // Cancel sends "cancelled" then the main menu; fail the menu
        rt.transport.queue_outcome(Ok(()));
        rt.transport
            .queue_outcome(Err(TransportError::Api { status: 500, body: String::new() }));
        rt.send(USER, "2").await;

        let event = rt.next_event(TIMEOUT).await.unwrap();
        assert!(matches!(event, RuntimeEvent::SendFailed { .. }));
        assert_eq!(rt.store.get_or_create(USER_ID).await, before);
    }

    /// Rejected credentials stop the whole process
    #[tokio::test]
    async fn test_auth_failure_triggers_fatal_shutdown() {
        let mut rt = TestRuntime::new().build();
        rt.transport
            .queue_outcome(Err(TransportError::Auth("token expired".into())));

        rt.send(USER, "1").await;
        let event = rt.next_event(TIMEOUT).await.unwrap();
        assert!(matches!(event, RuntimeEvent::SendFailed { .. }));

        assert!(rt.shutdown.is_triggered());
        assert!(rt.shutdown.fatal_reason().unwrap().contains("token expired"));
        // No apology over a transport that rejects us
        assert_eq!(rt.transport.sent_count(), 0);
    }

    /// Messages from one user are processed in order despite random delays
    #[tokio::test]
    async fn test_per_user_ordering() {
        let mut rt = TestRuntime::new()
            .think_delay(ThinkDelay::new(
                Duration::from_millis(1),
                Duration::from_millis(15),
            ))
            .build();
        let other = "5493419999999@c.us";

        for (a, b) in [("1", "1"), ("2", "1"), ("1", "2")] {
            rt.send(USER, a).await;
            rt.send(other, b).await;
        }
        assert_eq!(rt.wait_for_events(6, TIMEOUT).await.len(), 6);

        let first = rt.store.get_or_create(USER_ID).await;
        assert_eq!(
            first.data,
            Some(Selection::Specialty("Cardiología".to_string()))
        );

        let second = rt.store.get_or_create("5493419999999").await;
        assert_eq!(second.state, ConversationState::AwaitingConfirmation);
        assert_eq!(
            second.data,
            Some(Selection::Professional(Professional::new("Dr. A", &["Pediatría"])))
        );
        assert_eq!(rt.manager.active_users().await, 2);
    }

    /// A flooded inbox drops the overflow instead of stalling the webhook
    #[tokio::test]
    async fn test_full_inbox_does_not_block_dispatch() {
        let rt = TestRuntime::new()
            .think_delay(ThinkDelay::new(
                Duration::from_secs(30),
                Duration::from_secs(30),
            ))
            .build();

        let flood = async {
            for _ in 0..INBOX_CAPACITY + 8 {
                rt.send(USER, "1").await;
            }
        };
        assert!(tokio::time::timeout(Duration::from_secs(1), flood)
            .await
            .is_ok());
        assert_eq!(rt.manager.active_users().await, 1);

        rt.shutdown.trigger();
        assert_eq!(rt.transport.sent_count(), 0);
    }

    /// The outcome logger drains events and exits once the runtime is gone
    #[tokio::test]
    async fn test_event_logger_exits_with_runtime() {
        let mut rt = TestRuntime::new().build();
        let logger = tokio::spawn(log_events(rt.manager.subscribe()));

        rt.send(USER, "1").await;
        assert_eq!(rt.wait_for_events(1, TIMEOUT).await.len(), 1);

        rt.shutdown.trigger();
        drop(rt);
        assert!(tokio::time::timeout(TIMEOUT, logger).await.is_ok());
    }

    /// Shutdown interrupts a pending think delay without replying
    #[tokio::test]
    async fn test_shutdown_interrupts_think_delay() {
        let mut rt = TestRuntime::new()
            .think_delay(ThinkDelay::new(
                Duration::from_secs(30),
                Duration::from_secs(30),
            ))
            .build();

        rt.send(USER, "1").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        rt.shutdown.trigger();

        assert!(rt.next_event(Duration::from_millis(200)).await.is_none());
        assert_eq!(rt.transport.sent_count(), 0);

        // Dispatch after shutdown is dropped
        rt.send("5493410000000@c.us", "1").await;
        assert_eq!(rt.manager.active_users().await, 1);
    }
}
