// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request idempotency cache.
//!
//! Makes a client-supplied idempotency key deterministic: replaying the same
//! logical request within the TTL window returns the original response
//! verbatim, without re-executing side effects. Keyed by the unique
//! `(account, key)` pair in the persistent store.
//!
//! Policy note: a key reused with different parameters still returns the
//! cached response — the idempotency contract wins over misuse detection.
//! The mismatch is logged as a key-reuse anomaly for observability.

pub mod hash;
pub mod key;

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use courier_config::IdempotencyConfig;
use courier_core::types::{AccountId, IdempotencyRecord};
use courier_core::{CourierError, IdempotencyStore};

pub use hash::request_hash;
pub use key::is_valid_key;

/// Outcome of an idempotency check.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyCheck {
    /// No prior request under this key; the caller should execute and
    /// [`store`](IdempotencyCache::store) the response.
    Miss,
    /// A prior request exists; `response` must be returned verbatim.
    Hit {
        response: serde_json::Value,
        /// The replayed request's parameters did not hash-match the
        /// original. Logged, never an error.
        hash_mismatch: bool,
    },
}

impl IdempotencyCheck {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IdempotencyCheck::Hit { .. })
    }
}

/// Idempotency cache over the persistent store contract.
pub struct IdempotencyCache {
    store: Arc<dyn IdempotencyStore>,
    config: IdempotencyConfig,
}

impl IdempotencyCache {
    pub fn new(config: IdempotencyConfig, store: Arc<dyn IdempotencyStore>) -> Self {
        Self { store, config }
    }

    /// Checks whether `(account, key)` replays a prior request.
    ///
    /// Invalid keys and store failures both degrade to [`Miss`]: the request
    /// proceeds without idempotency rather than failing. Expired records are
    /// deleted as a side effect.
    ///
    /// [`Miss`]: IdempotencyCheck::Miss
    pub async fn check(
        &self,
        account_id: &AccountId,
        idempotency_key: &str,
        request_params: &serde_json::Value,
    ) -> IdempotencyCheck {
        if !is_valid_key(idempotency_key, self.config.max_key_len) {
            debug!(account = %account_id, "invalid idempotency key, proceeding without");
            return IdempotencyCheck::Miss;
        }

        let record = match self.store.get(account_id, idempotency_key).await {
            Ok(record) => record,
            Err(e) => {
                warn!(account = %account_id, key = %idempotency_key, error = %e,
                    "idempotency lookup failed, proceeding without");
                return IdempotencyCheck::Miss;
            }
        };

        let Some(record) = record else {
            return IdempotencyCheck::Miss;
        };

        if record.expires_at < Utc::now() {
            if let Err(e) = self.store.delete(account_id, idempotency_key).await {
                warn!(account = %account_id, key = %idempotency_key, error = %e,
                    "failed to delete expired idempotency record");
            }
            return IdempotencyCheck::Miss;
        }

        let incoming_hash = request_hash(request_params);
        let hash_mismatch = incoming_hash != record.request_hash;
        if hash_mismatch {
            warn!(
                account = %account_id,
                key = %idempotency_key,
                cached_hash = %record.request_hash,
                incoming_hash = %incoming_hash,
                "idempotency key reused with different parameters, returning cached response"
            );
        }

        IdempotencyCheck::Hit {
            response: record.cached_response,
            hash_mismatch,
        }
    }

    /// Records the response for `(account, key)` with the configured TTL.
    ///
    /// Invalid keys are skipped silently — the original request did not opt
    /// into idempotency.
    pub async fn store(
        &self,
        account_id: &AccountId,
        idempotency_key: &str,
        request_params: &serde_json::Value,
        response: serde_json::Value,
    ) -> Result<(), CourierError> {
        if !is_valid_key(idempotency_key, self.config.max_key_len) {
            return Ok(());
        }
        let now = Utc::now();
        let record = IdempotencyRecord {
            account_id: account_id.clone(),
            key: idempotency_key.to_string(),
            request_hash: request_hash(request_params),
            cached_response: response,
            created_at: now,
            expires_at: now + Duration::seconds(self.config.ttl_secs as i64),
        };
        self.store.upsert(&record).await
    }

    /// Batch-deletes expired records. Run periodically by the scheduler,
    /// never inline on the request path.
    pub async fn cleanup_expired(&self) -> Result<usize, CourierError> {
        let removed = self
            .store
            .delete_expired(Utc::now(), self.config.cleanup_batch)
            .await?;
        if removed > 0 {
            info!(removed, "idempotency cleanup removed expired records");
        }
        Ok(removed)
    }
}
