// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the pipeline and its external collaborators.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod channel;
pub mod store;

pub use channel::ChannelAdapter;
pub use store::{ConversationStore, IdempotencyStore, MessageStore};
