// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent-store collaborator contracts.
//!
//! The store is the canonical source of truth for "does this id exist";
//! the in-memory caches in front of it are advisory accelerators. Row-level
//! atomicity on the `(account, key)` and `(conversation, timer_type)`
//! uniqueness constraints is what closes the cross-process race windows the
//! memory layers cannot close alone, so the compare-and-set operations here
//! must be implemented atomically by the backing store.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CourierError;
use crate::types::{
    AccountId, ConversationId, ConversationRecord, ConversationTimer, IdempotencyRecord,
    MessageId, StoredMessage, TimerType,
};

/// Durable message existence and status operations consumed by the
/// deduplicator and the validity tracker.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Returns the subset of `ids` that already exist for the account.
    async fn batch_check_exist(
        &self,
        account_id: &AccountId,
        ids: &[MessageId],
    ) -> Result<HashSet<MessageId>, CourierError>;

    /// Messages still in a sendable status (`pending`/`queued`) whose
    /// `expires_at` is before `now`, oldest first, at most `limit`.
    async fn expired_sendable(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, CourierError>;

    /// Transitions a message to `failed` with the given error code, only if
    /// it is still in a sendable status. Returns `false` when the message
    /// reached a terminal or in-flight status first (the sweep must not
    /// overwrite it).
    async fn mark_expired(
        &self,
        id: &MessageId,
        error_code: &str,
    ) -> Result<bool, CourierError>;

    /// Pushes `expires_at` forward by `additional_seconds` for a
    /// still-sendable message. Returns the new expiry, or `None` when the
    /// message is terminal or unknown.
    async fn extend_validity(
        &self,
        id: &MessageId,
        additional_seconds: i64,
    ) -> Result<Option<DateTime<Utc>>, CourierError>;
}

/// Idempotency record storage keyed by the unique `(account, key)` pair.
#[async_trait]
pub trait IdempotencyStore: Send + Sync + 'static {
    async fn get(
        &self,
        account_id: &AccountId,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, CourierError>;

    /// Insert-or-replace on the `(account, key)` constraint.
    async fn upsert(&self, record: &IdempotencyRecord) -> Result<(), CourierError>;

    async fn delete(&self, account_id: &AccountId, key: &str) -> Result<(), CourierError>;

    /// Deletes at most `limit` records with `expires_at < now`; returns the
    /// number removed.
    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, CourierError>;
}

/// Conversation and timer storage with atomic read-modify-write semantics.
#[async_trait]
pub trait ConversationStore: Send + Sync + 'static {
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationRecord>, CourierError>;

    /// Compare-and-set commit of the conversation record. The caller appends
    /// the transition to `history` and bumps `record.version` before
    /// committing, so no reader ever observes a state whose causing
    /// transition is missing.
    ///
    /// `expected_version` is the version the caller read (`None` for an
    /// insert of a new conversation). Returns `false` without writing when
    /// the stored version differs, so a concurrent commit is never silently
    /// overwritten.
    async fn put_conversation(
        &self,
        record: &ConversationRecord,
        expected_version: Option<u64>,
    ) -> Result<bool, CourierError>;

    /// Insert-or-replace on the `(conversation, timer_type)` constraint,
    /// keeping at most one active timer of each type per conversation.
    async fn upsert_timer(&self, timer: &ConversationTimer) -> Result<(), CourierError>;

    /// Marks all active timers for the conversation as cancelled.
    async fn cancel_timers(&self, id: &ConversationId) -> Result<(), CourierError>;

    /// Active timers with `expires_at < now`, oldest first, at most `limit`.
    async fn expired_timers(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ConversationTimer>, CourierError>;

    /// Compare-and-set `active -> fired`. Returns `false` when the timer was
    /// already fired, cancelled, or reset; a timer fires at most once.
    async fn mark_timer_fired(
        &self,
        id: &ConversationId,
        timer_type: TimerType,
    ) -> Result<bool, CourierError>;
}
