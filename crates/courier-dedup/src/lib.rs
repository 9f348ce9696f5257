// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Three-layer message deduplication.
//!
//! Answers "has `(account, channel_message_id)` already been processed?"
//! with bounded memory and correctness across process restarts:
//!
//! - **Layer 1**: bounded TTL LRU of seen ids — the fast path for flaky
//!   webhook re-deliveries arriving within seconds.
//! - **Layer 2**: persistent-store existence check, consulted only on a
//!   memory miss. A storage hit backfills layer 1.
//! - **Negative layer**: a second, shorter-TTL LRU of ids recently confirmed
//!   absent from storage, so bulk history syncs that re-check legitimately
//!   new ids don't hammer the store.
//!
//! The store stays the canonical source of truth; a freshly restarted
//! process with cold caches still detects duplicates through layer 2.
//! Cross-process insert races are absorbed by the store's uniqueness
//! constraint.

pub mod stats;

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::{debug, warn};

use courier_config::DedupConfig;
use courier_core::types::{AccountId, MessageId};
use courier_core::MessageStore;

pub use stats::DedupStats;
use stats::DedupCounters;

/// Both LRU layers, guarded by one lock. Values are insertion instants;
/// an entry older than its layer's TTL is treated as absent and evicted
/// on the next touch.
struct Layers {
    seen: LruCache<String, Instant>,
    negative: LruCache<String, Instant>,
}

impl Layers {
    /// Checks freshness and evicts the entry when stale.
    fn fresh(cache: &mut LruCache<String, Instant>, key: &str, ttl: Duration) -> bool {
        match cache.get(key) {
            Some(at) if at.elapsed() < ttl => true,
            Some(_) => {
                cache.pop(key);
                false
            }
            None => false,
        }
    }
}

/// Three-layer duplicate detector shared across all inbound/outbound paths.
pub struct Deduplicator {
    layers: Mutex<Layers>,
    store: Arc<dyn MessageStore>,
    memory_ttl: Duration,
    negative_ttl: Duration,
    counters: DedupCounters,
}

impl Deduplicator {
    pub fn new(config: &DedupConfig, store: Arc<dyn MessageStore>) -> Self {
        let memory_capacity = NonZeroUsize::new(config.memory_capacity.max(1))
            .expect("capacity clamped to at least 1");
        let negative_capacity = NonZeroUsize::new(config.negative_capacity.max(1))
            .expect("capacity clamped to at least 1");
        Self {
            layers: Mutex::new(Layers {
                seen: LruCache::new(memory_capacity),
                negative: LruCache::new(negative_capacity),
            }),
            store,
            memory_ttl: Duration::from_secs(config.memory_ttl_secs),
            negative_ttl: Duration::from_secs(config.negative_ttl_secs),
            counters: DedupCounters::default(),
        }
    }

    fn key(account_id: &AccountId, id: &MessageId) -> String {
        format!("{}:{}", account_id.0, id.0)
    }

    /// Checks whether the id was already processed and atomically claims it
    /// if not. Returns `true` for a duplicate.
    ///
    /// The memory claim happens before the storage lookup, so a concurrent
    /// `check_and_mark` for the same id in this process always observes the
    /// id as taken — the same id is never reported new twice in-process.
    ///
    /// Storage failures fail open (`false`): the memory layer still
    /// suppresses the immediate re-delivery, and the store's uniqueness
    /// constraint backstops the eventual insert.
    pub async fn check_and_mark(
        &self,
        account_id: &AccountId,
        id: &MessageId,
    ) -> bool {
        let key = Self::key(account_id, id);
        let skip_storage = {
            let mut layers = self.layers.lock().expect("dedup lock poisoned");
            if Layers::fresh(&mut layers.seen, &key, self.memory_ttl) {
                self.counters.memory_hit();
                return true;
            }
            self.counters.memory_miss();
            // Claim before the storage round-trip.
            layers.seen.put(key.clone(), Instant::now());
            let known_new = Layers::fresh(&mut layers.negative, &key, self.negative_ttl);
            if known_new {
                layers.negative.pop(&key);
            }
            known_new
        };

        if skip_storage {
            return false;
        }

        match self
            .store
            .batch_check_exist(account_id, std::slice::from_ref(id))
            .await
        {
            Ok(existing) if existing.contains(id) => {
                self.counters.storage_hit();
                true
            }
            Ok(_) => {
                self.counters.storage_miss();
                false
            }
            Err(e) => {
                self.counters.storage_error();
                warn!(account = %account_id, id = %id, error = %e,
                    "dedup storage check failed, treating id as new");
                false
            }
        }
    }

    /// Non-claiming duplicate check. Advisory: used by read paths that must
    /// not suppress later processing. Fails open on storage errors.
    pub async fn is_duplicate(&self, account_id: &AccountId, id: &MessageId) -> bool {
        let key = Self::key(account_id, id);
        {
            let mut layers = self.layers.lock().expect("dedup lock poisoned");
            if Layers::fresh(&mut layers.seen, &key, self.memory_ttl) {
                self.counters.memory_hit();
                return true;
            }
            self.counters.memory_miss();
            if Layers::fresh(&mut layers.negative, &key, self.negative_ttl) {
                return false;
            }
        }

        match self
            .store
            .batch_check_exist(account_id, std::slice::from_ref(id))
            .await
        {
            Ok(existing) => {
                let mut layers = self.layers.lock().expect("dedup lock poisoned");
                if existing.contains(id) {
                    self.counters.storage_hit();
                    layers.seen.put(key, Instant::now());
                    true
                } else {
                    self.counters.storage_miss();
                    layers.negative.put(key, Instant::now());
                    false
                }
            }
            Err(e) => {
                self.counters.storage_error();
                warn!(account = %account_id, id = %id, error = %e,
                    "dedup storage check failed on advisory read");
                false
            }
        }
    }

    /// Batch variant for bulk history sync. Returns the ids not yet known,
    /// in input order, with every returned id immediately claimed so a
    /// concurrent per-item check sees it as taken before the caller's
    /// inserts land.
    pub async fn filter_new(
        &self,
        account_id: &AccountId,
        ids: &[MessageId],
    ) -> Vec<MessageId> {
        // Partition by memory layers first.
        let mut candidates: Vec<MessageId> = Vec::new();
        let mut needs_storage: Vec<MessageId> = Vec::new();
        {
            let mut layers = self.layers.lock().expect("dedup lock poisoned");
            for id in ids {
                let key = Self::key(account_id, id);
                if Layers::fresh(&mut layers.seen, &key, self.memory_ttl) {
                    self.counters.memory_hit();
                    continue;
                }
                self.counters.memory_miss();
                if !Layers::fresh(&mut layers.negative, &key, self.negative_ttl) {
                    needs_storage.push(id.clone());
                }
                candidates.push(id.clone());
            }
        }

        if candidates.is_empty() {
            return Vec::new();
        }

        let existing = if needs_storage.is_empty() {
            Default::default()
        } else {
            match self.store.batch_check_exist(account_id, &needs_storage).await {
                Ok(existing) => existing,
                Err(e) => {
                    self.counters.storage_error();
                    warn!(account = %account_id, count = needs_storage.len(), error = %e,
                        "dedup batch storage check failed, treating batch as new");
                    Default::default()
                }
            }
        };

        // Re-acquire and resolve: backfill storage hits, claim the rest.
        let mut new_ids = Vec::with_capacity(candidates.len());
        let mut layers = self.layers.lock().expect("dedup lock poisoned");
        for id in candidates {
            let key = Self::key(account_id, &id);
            // A concurrent caller may have claimed the id while the lock
            // was released for the storage round-trip.
            if Layers::fresh(&mut layers.seen, &key, self.memory_ttl) {
                continue;
            }
            layers.negative.pop(&key);
            layers.seen.put(key, Instant::now());
            if existing.contains(&id) {
                self.counters.storage_hit();
            } else {
                self.counters.storage_miss();
                new_ids.push(id);
            }
        }
        new_ids
    }

    /// Marks an id before its insert happens, suppressing the duplicate
    /// inbound echo that may race the insert of an outbound message.
    pub fn pre_mark(&self, account_id: &AccountId, id: &MessageId) {
        let key = Self::key(account_id, id);
        let mut layers = self.layers.lock().expect("dedup lock poisoned");
        layers.negative.pop(&key);
        layers.seen.put(key, Instant::now());
        debug!(account = %account_id, id = %id, "pre-marked outbound id");
    }

    /// Drops both memory layers. Per-account eviction is intentionally not
    /// offered: entries age out via TTL, and the store stays authoritative,
    /// so a stale positive entry can only suppress re-processing of an id
    /// the store also knows.
    pub fn clear_memory(&self) {
        let mut layers = self.layers.lock().expect("dedup lock poisoned");
        layers.seen.clear();
        layers.negative.clear();
    }

    /// Running hit/miss counters, for capacity tuning rather than correctness.
    pub fn stats(&self) -> DedupStats {
        self.counters.snapshot()
    }
}
