// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-zero capacities and ordered clamp bounds.

use thiserror::Error;

use crate::model::CourierConfig;

/// A semantic configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Validation { message: String },
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let mut check = |ok: bool, message: String| {
        if !ok {
            errors.push(ConfigError::Validation { message });
        }
    };

    check(
        config.queue.capacity > 0,
        "queue.capacity must be greater than zero".to_string(),
    );
    check(
        config.queue.concurrency > 0,
        "queue.concurrency must be greater than zero".to_string(),
    );
    check(
        config.queue.retry_base_ms > 0,
        "queue.retry_base_ms must be greater than zero".to_string(),
    );
    check(
        config.queue.retry_base_ms <= config.queue.retry_max_ms,
        format!(
            "queue.retry_base_ms ({}) must not exceed queue.retry_max_ms ({})",
            config.queue.retry_base_ms, config.queue.retry_max_ms
        ),
    );

    check(
        config.dedup.memory_capacity > 0,
        "dedup.memory_capacity must be greater than zero".to_string(),
    );
    check(
        config.dedup.negative_capacity > 0,
        "dedup.negative_capacity must be greater than zero".to_string(),
    );

    check(
        config.idempotency.ttl_secs > 0,
        "idempotency.ttl_secs must be greater than zero".to_string(),
    );
    check(
        config.idempotency.max_key_len > 0,
        "idempotency.max_key_len must be greater than zero".to_string(),
    );

    check(
        config.validity.min_secs > 0,
        "validity.min_secs must be greater than zero".to_string(),
    );
    check(
        config.validity.min_secs <= config.validity.max_secs,
        format!(
            "validity.min_secs ({}) must not exceed validity.max_secs ({})",
            config.validity.min_secs, config.validity.max_secs
        ),
    );
    check(
        config.validity.default_secs >= config.validity.min_secs
            && config.validity.default_secs <= config.validity.max_secs,
        format!(
            "validity.default_secs ({}) must lie within [min_secs, max_secs]",
            config.validity.default_secs
        ),
    );
    check(
        config.validity.sweep_batch > 0,
        "validity.sweep_batch must be greater than zero".to_string(),
    );

    check(
        config.conversation.inactivity_secs > 0,
        "conversation.inactivity_secs must be greater than zero".to_string(),
    );
    check(
        config.conversation.inactivity_secs < config.conversation.close_secs,
        format!(
            "conversation.inactivity_secs ({}) must be less than conversation.close_secs ({})",
            config.conversation.inactivity_secs, config.conversation.close_secs
        ),
    );
    check(
        config.conversation.timer_batch > 0,
        "conversation.timer_batch must be greater than zero".to_string(),
    );

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = CourierConfig::default();
        config.queue.capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("queue.capacity"))
        );
    }

    #[test]
    fn collects_all_errors_without_failing_fast() {
        let mut config = CourierConfig::default();
        config.queue.capacity = 0;
        config.validity.min_secs = 0;
        config.conversation.inactivity_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }

    #[test]
    fn inverted_validity_bounds_are_rejected() {
        let mut config = CourierConfig::default();
        config.validity.min_secs = 100;
        config.validity.max_secs = 50;
        config.validity.default_secs = 75;
        assert!(validate_config(&config).is_err());
    }
}
