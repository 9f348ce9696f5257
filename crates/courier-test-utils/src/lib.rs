// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Courier workspace.
//!
//! Provides `MockChannel` (scriptable channel adapter) and `MemoryStore`
//! (in-memory implementation of the store collaborator contracts).

pub mod memory_store;
pub mod mock_channel;

pub use memory_store::MemoryStore;
pub use mock_channel::MockChannel;
