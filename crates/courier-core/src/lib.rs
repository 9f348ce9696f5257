// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier delivery pipeline.
//!
//! This crate provides the foundational trait definitions, error taxonomy,
//! and common types used throughout the Courier workspace. Channel adapters
//! and persistent-store collaborators implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    AccountId, ChannelType, ConnectionResult, ConversationId, MessageId, MessageStatus,
    SendResult,
};

pub use traits::{ChannelAdapter, ConversationStore, IdempotencyStore, MessageStore};
