// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Courier delivery pipeline.
//!
//! These are the wire-agnostic identities and parameter/result shapes that
//! flow between the router, the per-account send queues, the consistency
//! caches, and the channel adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a tenant business account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

/// Channel-assigned message identifier, unique within `(account, channel)`.
///
/// Produced by the channel backend, or synthesized as a temp id when an
/// outbound message is composed before the channel assigns the real one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The messaging platforms Courier routes across.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    WhatsApp,
    Telegram,
    TikTok,
    Instagram,
    Messenger,
}

/// Lifecycle status of an outbound message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Terminal statuses are exempt from expiration regardless of `expires_at`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageStatus::Delivered | MessageStatus::Read | MessageStatus::Failed
        )
    }

    /// Statuses still eligible for delivery, and therefore for expiration.
    pub fn is_sendable(self) -> bool {
        matches!(self, MessageStatus::Pending | MessageStatus::Queued)
    }
}

/// Connection status of an account on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Disconnected,
    PairingRequired,
}

/// Parameters for a text send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendParams {
    pub account_id: AccountId,
    pub channel_type: ChannelType,
    /// Channel-specific recipient address (phone number, chat id, handle).
    pub recipient: String,
    pub text: String,
    /// Requested validity window in seconds; clamped by the validity tracker.
    #[serde(default)]
    pub validity_seconds: Option<i64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Parameters for a media send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaParams {
    pub account_id: AccountId,
    pub channel_type: ChannelType,
    pub recipient: String,
    pub media_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub validity_seconds: Option<i64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A unit of work for the per-account send queue: text or media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SendJob {
    Message(SendParams),
    Media(MediaParams),
}

impl SendJob {
    pub fn account_id(&self) -> &AccountId {
        match self {
            SendJob::Message(p) => &p.account_id,
            SendJob::Media(p) => &p.account_id,
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        match self {
            SendJob::Message(p) => p.channel_type,
            SendJob::Media(p) => p.channel_type,
        }
    }
}

/// Outcome of a send operation, normalized across adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<MessageId>,
    pub error: Option<String>,
    /// Whether the failure is worth retrying. Adapter exceptions default to
    /// retryable since their cause is unknown.
    pub retryable: bool,
}

impl SendResult {
    pub fn ok(message_id: MessageId) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            error: None,
            retryable: false,
        }
    }

    pub fn failure(error: impl Into<String>, retryable: bool) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            retryable,
        }
    }
}

/// Outcome of an account connect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionResult {
    pub success: bool,
    pub error: Option<String>,
}

impl ConnectionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// An inbound message delivered by a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: MessageId,
    pub account_id: AccountId,
    pub channel_type: ChannelType,
    pub sender: String,
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A message status update (sent/delivered/read/failed) from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub account_id: AccountId,
    pub channel_type: ChannelType,
    pub message_id: MessageId,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

/// A connection lifecycle change for an account on a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub account_id: AccountId,
    pub channel_type: ChannelType,
    pub status: ConnectionStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A pairing code emitted by channels that require device pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingEvent {
    pub account_id: AccountId,
    pub channel_type: ChannelType,
    pub code: String,
}

/// Events a channel adapter can surface to the router.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Message(InboundMessage),
    Status(StatusUpdate),
    Connection(ConnectionEvent),
    Pairing(PairingEvent),
}

/// What a channel adapter can do; pairing is an explicit, typed capability.
#[derive(Debug, Clone, Default)]
pub struct ChannelCapabilities {
    pub supports_media: bool,
    pub supports_read_receipts: bool,
    /// Channels that require device pairing emit [`ChannelEvent::Pairing`].
    pub supports_pairing: bool,
    pub max_text_length: Option<usize>,
}

/// A stored outbound message as seen by the validity sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub account_id: AccountId,
    pub channel_type: ChannelType,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A cached idempotency record keyed by `(account, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub account_id: AccountId,
    pub key: String,
    /// Hex-encoded hash of the normalized request parameters.
    pub request_hash: String,
    pub cached_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Conversation lifecycle states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Active,
    Inactive,
    Closed,
}

/// What caused a conversation state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    Message,
    InactivityTimer,
    CloseTimer,
    Agent,
}

/// One immutable entry in a conversation's transition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub previous_state: ConversationState,
    pub new_state: ConversationState,
    pub reason: String,
    pub triggered_by: TransitionTrigger,
    #[serde(default)]
    pub agent_id: Option<String>,
    pub at: DateTime<Utc>,
}

/// Full conversation record with append-only transition history.
///
/// `version` is the optimistic-concurrency counter: every committed write
/// increments it, and [`ConversationStore::put_conversation`] only commits
/// when the stored version matches the caller's expectation.
///
/// [`ConversationStore::put_conversation`]: crate::traits::store::ConversationStore::put_conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub account_id: AccountId,
    pub state: ConversationState,
    pub state_changed_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_reason: Option<String>,
    pub history: Vec<TransitionRecord>,
    #[serde(default)]
    pub version: u64,
}

/// Kinds of conversation timers. At most one *active* timer of each kind
/// exists per conversation at any instant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimerType {
    Inactivity,
    Close,
}

/// Lifecycle status of a conversation timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Active,
    Fired,
    Cancelled,
    Reset,
}

/// A scheduled conversation timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTimer {
    pub conversation_id: ConversationId,
    pub timer_type: TimerType,
    pub status: TimerStatus,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn channel_type_round_trips_through_strings() {
        let all = [
            ChannelType::WhatsApp,
            ChannelType::Telegram,
            ChannelType::TikTok,
            ChannelType::Instagram,
            ChannelType::Messenger,
        ];
        for ty in all {
            let s = ty.to_string();
            assert_eq!(ChannelType::from_str(&s).unwrap(), ty);
        }
        assert_eq!(ChannelType::WhatsApp.to_string(), "whats_app");
    }

    #[test]
    fn message_status_terminal_and_sendable_are_disjoint() {
        let all = [
            MessageStatus::Pending,
            MessageStatus::Queued,
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
            MessageStatus::Failed,
        ];
        for status in all {
            assert!(!(status.is_terminal() && status.is_sendable()));
        }
        assert!(MessageStatus::Failed.is_terminal());
        assert!(MessageStatus::Queued.is_sendable());
        // Sent is in-flight: neither sweepable nor terminal.
        assert!(!MessageStatus::Sent.is_terminal());
        assert!(!MessageStatus::Sent.is_sendable());
    }

    #[test]
    fn send_result_constructors() {
        let ok = SendResult::ok(MessageId("wamid.1".into()));
        assert!(ok.success);
        assert!(!ok.retryable);

        let failed = SendResult::failure("rate limited", true);
        assert!(!failed.success);
        assert!(failed.retryable);
        assert_eq!(failed.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn send_job_projects_account_and_channel() {
        let job = SendJob::Message(SendParams {
            account_id: "acct1".into(),
            channel_type: ChannelType::Telegram,
            recipient: "123".into(),
            text: "hello".into(),
            validity_seconds: None,
            metadata: None,
        });
        assert_eq!(job.account_id(), &AccountId("acct1".into()));
        assert_eq!(job.channel_type(), ChannelType::Telegram);
    }

    #[test]
    fn conversation_state_serialization() {
        let json = serde_json::to_string(&ConversationState::Inactive).unwrap();
        assert_eq!(json, "\"inactive\"");
        let parsed: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ConversationState::Inactive);
    }
}
