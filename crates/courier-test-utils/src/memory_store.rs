// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementation of the persistent-store collaborator contracts.
//!
//! Backs every store trait with `Mutex`-guarded maps, mimicking the
//! row-level atomicity a real database provides on its uniqueness
//! constraints. Failure injection toggles let tests exercise the
//! fail-open/fail-closed policies of the callers.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use courier_core::types::{
    AccountId, ConversationId, ConversationRecord, ConversationTimer, IdempotencyRecord,
    MessageId, MessageStatus, StoredMessage, TimerStatus, TimerType,
};
use courier_core::{
    ConversationStore, CourierError, IdempotencyStore, MessageStore,
};

#[derive(Default)]
struct Inner {
    /// (account, message id) pairs known to exist.
    existing: HashSet<(AccountId, MessageId)>,
    /// Outbound messages visible to the validity sweep.
    messages: HashMap<MessageId, StoredMessage>,
    /// Error codes recorded by `mark_expired`.
    failure_codes: HashMap<MessageId, String>,
    idempotency: HashMap<(AccountId, String), IdempotencyRecord>,
    conversations: HashMap<ConversationId, ConversationRecord>,
    timers: HashMap<(ConversationId, TimerType), ConversationTimer>,
}

/// Shared in-memory store implementing all three collaborator contracts.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_batch_check: AtomicBool,
    batch_check_calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    /// Seed an id as already existing in durable storage.
    pub async fn insert_existing(&self, account_id: &AccountId, id: &MessageId) {
        self.lock()
            .existing
            .insert((account_id.clone(), id.clone()));
    }

    /// Seed an outbound message for the validity sweep.
    pub fn insert_message(&self, message: StoredMessage) {
        let mut inner = self.lock();
        inner
            .existing
            .insert((message.account_id.clone(), message.id.clone()));
        inner.messages.insert(message.id.clone(), message);
    }

    /// Current status of a seeded message.
    pub fn message_status(&self, id: &MessageId) -> Option<MessageStatus> {
        self.lock().messages.get(id).map(|m| m.status)
    }

    /// Error code recorded when the sweep expired the message.
    pub fn failure_code(&self, id: &MessageId) -> Option<String> {
        self.lock().failure_codes.get(id).cloned()
    }

    /// Overwrite a message's status, simulating the send path completing.
    pub fn set_message_status(&self, id: &MessageId, status: MessageStatus) {
        if let Some(m) = self.lock().messages.get_mut(id) {
            m.status = status;
        }
    }

    /// Make subsequent `batch_check_exist` calls fail.
    pub fn fail_batch_check(&self, fail: bool) {
        self.fail_batch_check.store(fail, Ordering::SeqCst);
    }

    /// Number of `batch_check_exist` calls observed.
    pub fn batch_check_calls(&self) -> u64 {
        self.batch_check_calls.load(Ordering::SeqCst)
    }

    /// Direct read of a stored timer.
    pub fn timer(
        &self,
        id: &ConversationId,
        timer_type: TimerType,
    ) -> Option<ConversationTimer> {
        self.lock().timers.get(&(id.clone(), timer_type)).cloned()
    }

    /// Stored idempotency record count.
    pub fn idempotency_len(&self) -> usize {
        self.lock().idempotency.len()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn batch_check_exist(
        &self,
        account_id: &AccountId,
        ids: &[MessageId],
    ) -> Result<HashSet<MessageId>, CourierError> {
        self.batch_check_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batch_check.load(Ordering::SeqCst) {
            return Err(CourierError::store(std::io::Error::other(
                "injected store failure",
            )));
        }
        let inner = self.lock();
        Ok(ids
            .iter()
            .filter(|id| {
                inner
                    .existing
                    .contains(&(account_id.clone(), (*id).clone()))
            })
            .cloned()
            .collect())
    }

    async fn expired_sendable(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, CourierError> {
        let inner = self.lock();
        let mut expired: Vec<StoredMessage> = inner
            .messages
            .values()
            .filter(|m| m.status.is_sendable() && m.expires_at < now)
            .cloned()
            .collect();
        expired.sort_by_key(|m| m.expires_at);
        expired.truncate(limit);
        Ok(expired)
    }

    async fn mark_expired(
        &self,
        id: &MessageId,
        error_code: &str,
    ) -> Result<bool, CourierError> {
        let mut inner = self.lock();
        let Some(message) = inner.messages.get_mut(id) else {
            return Ok(false);
        };
        if !message.status.is_sendable() {
            return Ok(false);
        }
        message.status = MessageStatus::Failed;
        inner
            .failure_codes
            .insert(id.clone(), error_code.to_string());
        Ok(true)
    }

    async fn extend_validity(
        &self,
        id: &MessageId,
        additional_seconds: i64,
    ) -> Result<Option<DateTime<Utc>>, CourierError> {
        let mut inner = self.lock();
        let Some(message) = inner.messages.get_mut(id) else {
            return Ok(None);
        };
        if message.status.is_terminal() {
            return Ok(None);
        }
        message.expires_at += Duration::seconds(additional_seconds);
        Ok(Some(message.expires_at))
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStore {
    async fn get(
        &self,
        account_id: &AccountId,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, CourierError> {
        Ok(self
            .lock()
            .idempotency
            .get(&(account_id.clone(), key.to_string()))
            .cloned())
    }

    async fn upsert(&self, record: &IdempotencyRecord) -> Result<(), CourierError> {
        self.lock().idempotency.insert(
            (record.account_id.clone(), record.key.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn delete(&self, account_id: &AccountId, key: &str) -> Result<(), CourierError> {
        self.lock()
            .idempotency
            .remove(&(account_id.clone(), key.to_string()));
        Ok(())
    }

    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, CourierError> {
        let mut inner = self.lock();
        let expired: Vec<(AccountId, String)> = inner
            .idempotency
            .iter()
            .filter(|(_, record)| record.expires_at < now)
            .take(limit)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.idempotency.remove(key);
        }
        Ok(expired.len())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationRecord>, CourierError> {
        Ok(self.lock().conversations.get(id).cloned())
    }

    async fn put_conversation(
        &self,
        record: &ConversationRecord,
        expected_version: Option<u64>,
    ) -> Result<bool, CourierError> {
        let mut inner = self.lock();
        let current = inner.conversations.get(&record.id).map(|r| r.version);
        if current != expected_version {
            return Ok(false);
        }
        inner
            .conversations
            .insert(record.id.clone(), record.clone());
        Ok(true)
    }

    async fn upsert_timer(&self, timer: &ConversationTimer) -> Result<(), CourierError> {
        self.lock().timers.insert(
            (timer.conversation_id.clone(), timer.timer_type),
            timer.clone(),
        );
        Ok(())
    }

    async fn cancel_timers(&self, id: &ConversationId) -> Result<(), CourierError> {
        let mut inner = self.lock();
        for timer in inner.timers.values_mut() {
            if &timer.conversation_id == id && timer.status == TimerStatus::Active {
                timer.status = TimerStatus::Cancelled;
            }
        }
        Ok(())
    }

    async fn expired_timers(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ConversationTimer>, CourierError> {
        let inner = self.lock();
        let mut expired: Vec<ConversationTimer> = inner
            .timers
            .values()
            .filter(|t| t.status == TimerStatus::Active && t.expires_at < now)
            .cloned()
            .collect();
        expired.sort_by_key(|t| t.expires_at);
        expired.truncate(limit);
        Ok(expired)
    }

    async fn mark_timer_fired(
        &self,
        id: &ConversationId,
        timer_type: TimerType,
    ) -> Result<bool, CourierError> {
        let mut inner = self.lock();
        let Some(timer) = inner.timers.get_mut(&(id.clone(), timer_type)) else {
            return Ok(false);
        };
        if timer.status != TimerStatus::Active {
            return Ok(false);
        }
        timer.status = TimerStatus::Fired;
        Ok(true)
    }
}
