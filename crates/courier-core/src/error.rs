// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier delivery pipeline.

use thiserror::Error;

use crate::types::{AccountId, ChannelType, ConversationState};

/// The primary error type used across Courier crates and trait seams.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistent-store collaborator errors (lookup, upsert, batch check failures).
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (connection failure, message format, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The adapter's event source has shut down and will produce no further events.
    #[error("channel closed")]
    ChannelClosed,

    /// No adapter is registered for the requested channel type.
    #[error("adapter not found for channel: {channel}")]
    AdapterNotFound { channel: ChannelType },

    /// The per-account send queue backlog is at capacity.
    #[error("send queue full for account {account} (capacity {capacity})")]
    QueueFull { account: AccountId, capacity: usize },

    /// A pending queue entry was cancelled before it started executing.
    #[error("send cancelled: {0}")]
    Cancelled(String),

    /// Request-level validation failure (bad idempotency key, bad validity period).
    /// Non-fatal: the request proceeds without the feature.
    #[error("validation failure: {0}")]
    Validation(String),

    /// A conversation state transition outside the adjacency table was attempted.
    #[error("invalid conversation transition: {from} -> {to}")]
    InvalidTransition {
        from: ConversationState,
        to: ConversationState,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Wrap an arbitrary store-layer failure.
    pub fn store<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CourierError::Store {
            source: Box::new(source),
        }
    }

    /// Construct a channel error with a message and no underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        CourierError::Channel {
            message: message.into(),
            source: None,
        }
    }
}
