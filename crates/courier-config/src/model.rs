// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier delivery pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Process-level settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Per-account send queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Message deduplication cache settings.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Request idempotency cache settings.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,

    /// Message validity window settings.
    #[serde(default)]
    pub validity: ValidityConfig,

    /// Conversation lifecycle timer settings.
    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Per-account send queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum pending entries per account before enqueue rejects.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// In-flight send ceiling per account. Most channel backends penalize
    /// bursty sends from one identity, so the default is serial.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Minimum interval between send dispatches on one account, in ms.
    #[serde(default = "default_min_send_interval_ms")]
    pub min_send_interval_ms: u64,

    /// Maximum retry attempts after the initial send.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff base in ms (`base * 2^(attempt-1)`).
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Backoff ceiling in ms.
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Priority assigned by `enqueue_urgent`.
    #[serde(default = "default_urgent_priority")]
    pub urgent_priority: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            concurrency: default_concurrency(),
            min_send_interval_ms: default_min_send_interval_ms(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            urgent_priority: default_urgent_priority(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_concurrency() -> usize {
    1
}

fn default_min_send_interval_ms() -> u64 {
    200
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_retry_max_ms() -> u64 {
    60_000
}

fn default_urgent_priority() -> i32 {
    100
}

/// Message deduplication cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// Capacity of the positive (seen ids) LRU layer.
    #[serde(default = "default_dedup_capacity")]
    pub memory_capacity: usize,

    /// TTL for positive entries, in seconds.
    #[serde(default = "default_dedup_ttl_secs")]
    pub memory_ttl_secs: u64,

    /// Capacity of the negative (known-new ids) LRU layer.
    #[serde(default = "default_negative_capacity")]
    pub negative_capacity: usize,

    /// TTL for negative entries, in seconds. Kept short: a negative entry
    /// only suppresses repeat storage lookups during bursts.
    #[serde(default = "default_negative_ttl_secs")]
    pub negative_ttl_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            memory_capacity: default_dedup_capacity(),
            memory_ttl_secs: default_dedup_ttl_secs(),
            negative_capacity: default_negative_capacity(),
            negative_ttl_secs: default_negative_ttl_secs(),
        }
    }
}

fn default_dedup_capacity() -> usize {
    10_000
}

fn default_dedup_ttl_secs() -> u64 {
    3600
}

fn default_negative_capacity() -> usize {
    2048
}

fn default_negative_ttl_secs() -> u64 {
    60
}

/// Request idempotency cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdempotencyConfig {
    /// Record TTL from time of storage, in seconds.
    #[serde(default = "default_idempotency_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval between cleanup sweeps, in seconds.
    #[serde(default = "default_idempotency_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Maximum records deleted per cleanup sweep.
    #[serde(default = "default_idempotency_cleanup_batch")]
    pub cleanup_batch: usize,

    /// Maximum accepted idempotency key length.
    #[serde(default = "default_max_key_len")]
    pub max_key_len: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_idempotency_ttl_secs(),
            cleanup_interval_secs: default_idempotency_cleanup_interval_secs(),
            cleanup_batch: default_idempotency_cleanup_batch(),
            max_key_len: default_max_key_len(),
        }
    }
}

fn default_idempotency_ttl_secs() -> u64 {
    86_400
}

fn default_idempotency_cleanup_interval_secs() -> u64 {
    3600
}

fn default_idempotency_cleanup_batch() -> usize {
    500
}

fn default_max_key_len() -> usize {
    128
}

/// Message validity window configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ValidityConfig {
    /// Lower clamp bound for requested validity periods, in seconds.
    #[serde(default = "default_validity_min_secs")]
    pub min_secs: i64,

    /// Upper clamp bound for requested validity periods, in seconds.
    #[serde(default = "default_validity_max_secs")]
    pub max_secs: i64,

    /// Applied when no validity period is requested, in seconds.
    #[serde(default = "default_validity_default_secs")]
    pub default_secs: i64,

    /// Interval between expiration sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Maximum messages expired per sweep run.
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch: usize,
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            min_secs: default_validity_min_secs(),
            max_secs: default_validity_max_secs(),
            default_secs: default_validity_default_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_batch: default_sweep_batch(),
        }
    }
}

fn default_validity_min_secs() -> i64 {
    300
}

fn default_validity_max_secs() -> i64 {
    604_800
}

fn default_validity_default_secs() -> i64 {
    86_400
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_sweep_batch() -> usize {
    200
}

/// Conversation lifecycle timer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Idle time before an active conversation becomes inactive, in seconds.
    #[serde(default = "default_inactivity_secs")]
    pub inactivity_secs: i64,

    /// Idle time before a conversation is closed, in seconds.
    #[serde(default = "default_close_secs")]
    pub close_secs: i64,

    /// Interval between timer sweeps, in seconds.
    #[serde(default = "default_timer_check_interval_secs")]
    pub timer_check_interval_secs: u64,

    /// Maximum timers fired per sweep run.
    #[serde(default = "default_timer_batch")]
    pub timer_batch: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            inactivity_secs: default_inactivity_secs(),
            close_secs: default_close_secs(),
            timer_check_interval_secs: default_timer_check_interval_secs(),
            timer_batch: default_timer_batch(),
        }
    }
}

fn default_inactivity_secs() -> i64 {
    1800
}

fn default_close_secs() -> i64 {
    86_400
}

fn default_timer_check_interval_secs() -> u64 {
    60
}

fn default_timer_batch() -> usize {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = CourierConfig::default();
        assert_eq!(config.queue.concurrency, 1);
        assert_eq!(config.queue.capacity, 1000);
        assert_eq!(config.dedup.memory_capacity, 10_000);
        assert_eq!(config.idempotency.ttl_secs, 86_400);
        assert!(config.validity.min_secs <= config.validity.default_secs);
        assert!(config.validity.default_secs <= config.validity.max_secs);
        assert!(config.conversation.inactivity_secs < config.conversation.close_secs);
    }

    #[test]
    fn negative_ttl_is_shorter_than_positive() {
        let config = DedupConfig::default();
        assert!(config.negative_ttl_secs < config.memory_ttl_secs);
    }
}
