// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound events,
//! captured outbound sends, and scriptable send/connect outcomes so tests
//! can drive retry and failure paths.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use courier_core::types::{
    AccountId, ChannelCapabilities, ChannelEvent, ChannelType, ConnectionResult,
    ConnectionStatus, MediaParams, SendParams, SendResult,
};
use courier_core::{ChannelAdapter, CourierError, MessageId};

/// A mock messaging channel for testing.
///
/// Provides three hooks:
/// - **events**: Events injected via `inject_event()` are returned by `next_event()`
/// - **sent**: Params passed to `send_message`/`send_media` are captured
/// - **scripts**: Queued send outcomes returned before the default success
pub struct MockChannel {
    channel_type: ChannelType,
    capabilities: ChannelCapabilities,
    events: Arc<Mutex<VecDeque<ChannelEvent>>>,
    sent: Arc<Mutex<Vec<SendParams>>>,
    sent_media: Arc<Mutex<Vec<MediaParams>>>,
    scripted_sends: Arc<Mutex<VecDeque<Result<SendResult, CourierError>>>>,
    connected: Arc<Mutex<HashSet<AccountId>>>,
    notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
    fail_initialize: AtomicBool,
    reject_connect: AtomicBool,
}

impl MockChannel {
    pub fn new(channel_type: ChannelType) -> Self {
        Self {
            channel_type,
            capabilities: ChannelCapabilities {
                supports_media: true,
                supports_read_receipts: true,
                supports_pairing: matches!(channel_type, ChannelType::WhatsApp),
                max_text_length: Some(4096),
            },
            events: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            sent_media: Arc::new(Mutex::new(Vec::new())),
            scripted_sends: Arc::new(Mutex::new(VecDeque::new())),
            connected: Arc::new(Mutex::new(HashSet::new())),
            notify: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
            fail_initialize: AtomicBool::new(false),
            reject_connect: AtomicBool::new(false),
        }
    }

    /// Inject an inbound event; the next `next_event()` call returns it.
    pub async fn inject_event(&self, event: ChannelEvent) {
        self.events.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Queue an outcome for the next send call. Once the script queue is
    /// empty, sends succeed with a generated message id.
    pub async fn script_send(&self, outcome: Result<SendResult, CourierError>) {
        self.scripted_sends.lock().await.push_back(outcome);
    }

    /// All text sends captured so far.
    pub async fn sent_messages(&self) -> Vec<SendParams> {
        self.sent.lock().await.clone()
    }

    /// All media sends captured so far.
    pub async fn sent_media(&self) -> Vec<MediaParams> {
        self.sent_media.lock().await.clone()
    }

    /// Make `initialize()` fail, for partial-availability tests.
    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Make `connect()` return an unsuccessful result.
    pub fn reject_connect(&self, reject: bool) {
        self.reject_connect.store(reject, Ordering::SeqCst);
    }

    async fn next_scripted(&self) -> Option<Result<SendResult, CourierError>> {
        self.scripted_sends.lock().await.pop_front()
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    fn capabilities(&self) -> ChannelCapabilities {
        self.capabilities.clone()
    }

    async fn initialize(&self) -> Result<(), CourierError> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(CourierError::channel("mock initialize failure"));
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn connect(
        &self,
        account_id: &AccountId,
        _credentials: &serde_json::Value,
    ) -> Result<ConnectionResult, CourierError> {
        if self.reject_connect.load(Ordering::SeqCst) {
            return Ok(ConnectionResult::failure("mock connect rejected"));
        }
        self.connected.lock().await.insert(account_id.clone());
        Ok(ConnectionResult::ok())
    }

    async fn disconnect(&self, account_id: &AccountId) -> Result<(), CourierError> {
        self.connected.lock().await.remove(account_id);
        Ok(())
    }

    async fn send_message(&self, params: &SendParams) -> Result<SendResult, CourierError> {
        self.sent.lock().await.push(params.clone());
        match self.next_scripted().await {
            Some(outcome) => outcome,
            None => Ok(SendResult::ok(MessageId(format!("mock-{}", Uuid::new_v4())))),
        }
    }

    async fn send_media(&self, params: &MediaParams) -> Result<SendResult, CourierError> {
        self.sent_media.lock().await.push(params.clone());
        match self.next_scripted().await {
            Some(outcome) => outcome,
            None => Ok(SendResult::ok(MessageId(format!("mock-{}", Uuid::new_v4())))),
        }
    }

    async fn status(&self, account_id: &AccountId) -> Option<ConnectionStatus> {
        if self.connected.lock().await.contains(account_id) {
            Some(ConnectionStatus::Connected)
        } else {
            None
        }
    }

    async fn is_connected(&self, account_id: &AccountId) -> bool {
        self.connected.lock().await.contains(account_id)
    }

    async fn active_accounts(&self) -> Vec<AccountId> {
        self.connected.lock().await.iter().cloned().collect()
    }

    async fn next_event(&self) -> Result<ChannelEvent, CourierError> {
        loop {
            if let Some(event) = self.events.lock().await.pop_front() {
                return Ok(event);
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(CourierError::ChannelClosed);
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_core::types::InboundMessage;

    #[tokio::test]
    async fn injected_events_come_back_in_order() {
        let channel = MockChannel::new(ChannelType::Telegram);
        for n in 0..3 {
            channel
                .inject_event(ChannelEvent::Message(InboundMessage {
                    id: MessageId(format!("m{n}")),
                    account_id: "a1".into(),
                    channel_type: ChannelType::Telegram,
                    sender: "u1".into(),
                    text: Some("hi".into()),
                    timestamp: Utc::now(),
                    metadata: None,
                }))
                .await;
        }
        for n in 0..3 {
            match channel.next_event().await.unwrap() {
                ChannelEvent::Message(msg) => assert_eq!(msg.id.0, format!("m{n}")),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn next_event_errors_after_shutdown() {
        let channel = MockChannel::new(ChannelType::Messenger);
        channel.shutdown().await.unwrap();
        assert!(matches!(
            channel.next_event().await,
            Err(CourierError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn scripted_sends_drain_before_default_success() {
        let channel = MockChannel::new(ChannelType::WhatsApp);
        channel
            .script_send(Ok(SendResult::failure("throttled", true)))
            .await;

        let params = SendParams {
            account_id: "a1".into(),
            channel_type: ChannelType::WhatsApp,
            recipient: "+15550001111".into(),
            text: "hello".into(),
            validity_seconds: None,
            metadata: None,
        };
        let first = channel.send_message(&params).await.unwrap();
        assert!(!first.success);
        let second = channel.send_message(&params).await.unwrap();
        assert!(second.success);
        assert_eq!(channel.sent_messages().await.len(), 2);
    }
}
