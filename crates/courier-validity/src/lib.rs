// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message validity windows and expiration.
//!
//! Queued/pending outbound messages carry a bounded time-to-live mirroring
//! backend message-validity semantics. The tracker clamps requested windows
//! into `[min, max]`, and a periodic sweep transitions overdue messages to
//! `failed` with a standardized expiration code.
//!
//! The sweep filters by status, not just time: a message the send path
//! already moved to a terminal status is never overwritten back to failed,
//! so the sweep is safe to run concurrently with normal send completion.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use courier_config::ValidityConfig;
use courier_core::types::{MessageId, StoredMessage};
use courier_core::{CourierError, MessageStore};

/// Standardized error code recorded on expired messages, distinct from
/// delivery failure.
pub const EXPIRED_ERROR_CODE: &str = "message_expired";

/// Receives one notification per message the sweep expires.
#[async_trait]
pub trait ExpiryNotifier: Send + Sync + 'static {
    async fn message_expired(&self, message: &StoredMessage);
}

/// Computes and enforces message expiration windows.
pub struct ValidityTracker {
    store: Arc<dyn MessageStore>,
    config: ValidityConfig,
    notifier: Option<Arc<dyn ExpiryNotifier>>,
}

impl ValidityTracker {
    pub fn new(config: ValidityConfig, store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            config,
            notifier: None,
        }
    }

    /// Attach a notifier invoked once per expired message.
    pub fn with_notifier(mut self, notifier: Arc<dyn ExpiryNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Expiry instant for a message created now: `now + clamp(requested)`.
    ///
    /// Out-of-range requests clamp to the nearest bound; an unspecified
    /// request uses the configured default.
    pub fn calculate_expiry(&self, requested_seconds: Option<i64>) -> DateTime<Utc> {
        self.calculate_expiry_at(Utc::now(), requested_seconds)
    }

    /// Same as [`calculate_expiry`](Self::calculate_expiry) with an explicit
    /// creation instant, for deterministic tests and backdated imports.
    pub fn calculate_expiry_at(
        &self,
        created_at: DateTime<Utc>,
        requested_seconds: Option<i64>,
    ) -> DateTime<Utc> {
        let requested = requested_seconds.unwrap_or(self.config.default_secs);
        let clamped = requested.clamp(self.config.min_secs, self.config.max_secs);
        if clamped != requested {
            debug!(requested, clamped, "validity period clamped");
        }
        created_at + Duration::seconds(clamped)
    }

    /// One sweep run: finds still-sendable messages past `expires_at`, in a
    /// bounded batch, fails each exactly once with [`EXPIRED_ERROR_CODE`],
    /// and notifies per expired message. Returns how many were expired.
    pub async fn process_expired_messages(&self) -> Result<usize, CourierError> {
        let now = Utc::now();
        let batch = self
            .store
            .expired_sendable(now, self.config.sweep_batch)
            .await?;
        if batch.is_empty() {
            return Ok(0);
        }

        let mut expired = 0usize;
        for message in &batch {
            // Compare-and-set on the store: a message the send path already
            // completed loses eligibility between the scan and here.
            match self.store.mark_expired(&message.id, EXPIRED_ERROR_CODE).await {
                Ok(true) => {
                    expired += 1;
                    if let Some(notifier) = &self.notifier {
                        notifier.message_expired(message).await;
                    }
                }
                Ok(false) => {
                    debug!(id = %message.id, "message completed before sweep, skipping");
                }
                Err(e) => {
                    warn!(id = %message.id, error = %e, "failed to expire message");
                }
            }
        }

        if expired > 0 {
            info!(expired, scanned = batch.len(), "validity sweep expired messages");
        }
        Ok(expired)
    }

    /// Pushes a still-sendable message's expiry forward. Returns the new
    /// expiry, or `None` when the message is terminal or unknown. Used by
    /// retry paths that need more time; bounded in practice by the sweep's
    /// periodicity.
    pub async fn extend_validity(
        &self,
        id: &MessageId,
        additional_seconds: i64,
    ) -> Result<Option<DateTime<Utc>>, CourierError> {
        if additional_seconds <= 0 {
            return Err(CourierError::Validation(format!(
                "additional_seconds must be positive, got {additional_seconds}"
            )));
        }
        self.store.extend_validity(id, additional_seconds).await
    }
}
