// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter contract implemented by per-channel integrations.
//!
//! The router owns one adapter per [`ChannelType`] and is the only caller of
//! these methods. Adapters surface inbound traffic through [`next_event`];
//! the router spawns one pull loop per adapter and fans events out to its
//! registered handlers.
//!
//! [`next_event`]: ChannelAdapter::next_event

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{
    AccountId, ChannelCapabilities, ChannelEvent, ChannelType, ConnectionResult,
    ConnectionStatus, MediaParams, SendParams, SendResult,
};

/// Bidirectional messaging channel integration behind a uniform contract.
///
/// Adapters are expected to time out their own backend calls; the router
/// treats any returned error as a retryable failed result.
#[async_trait]
pub trait ChannelAdapter: Send + Sync + 'static {
    /// The channel this adapter serves.
    fn channel_type(&self) -> ChannelType;

    /// Static capabilities of the channel, including whether it requires
    /// device pairing (in which case it emits [`ChannelEvent::Pairing`]).
    fn capabilities(&self) -> ChannelCapabilities;

    /// One-time adapter startup (backend clients, session restore).
    async fn initialize(&self) -> Result<(), CourierError>;

    /// Gracefully releases adapter resources. Idempotent.
    async fn shutdown(&self) -> Result<(), CourierError>;

    /// Connects a business account using channel-specific credentials.
    async fn connect(
        &self,
        account_id: &AccountId,
        credentials: &serde_json::Value,
    ) -> Result<ConnectionResult, CourierError>;

    /// Disconnects a business account.
    async fn disconnect(&self, account_id: &AccountId) -> Result<(), CourierError>;

    /// Sends a text message.
    async fn send_message(&self, params: &SendParams) -> Result<SendResult, CourierError>;

    /// Sends a media message.
    async fn send_media(&self, params: &MediaParams) -> Result<SendResult, CourierError>;

    /// Connection status for an account, or `None` if unknown to the adapter.
    async fn status(&self, account_id: &AccountId) -> Option<ConnectionStatus>;

    /// Whether the account currently holds a live connection.
    async fn is_connected(&self, account_id: &AccountId) -> bool;

    /// Accounts with a live connection on this adapter.
    async fn active_accounts(&self) -> Vec<AccountId>;

    /// Returns the next inbound event, suspending until one is available.
    ///
    /// Returns [`CourierError::ChannelClosed`] once the adapter has shut
    /// down; the router stops the pull loop on that error.
    async fn next_event(&self) -> Result<ChannelEvent, CourierError>;
}
