// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./courier.toml` > `~/.config/courier/courier.toml`
//! > `/etc/courier/courier.toml` with environment variable overrides via the
//! `COURIER_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CourierConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/courier/courier.toml` (system-wide)
/// 3. `~/.config/courier/courier.toml` (user XDG config)
/// 4. `./courier.toml` (local directory)
/// 5. `COURIER_*` environment variables
pub fn load_config() -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file("/etc/courier/courier.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("courier/courier.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("courier.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit inline configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `COURIER_QUEUE_MIN_SEND_INTERVAL_MS`
/// must map to `queue.min_send_interval_ms`, not `queue.min.send...`.
fn env_provider() -> Env {
    Env::prefixed("COURIER_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped.
        // Example: COURIER_QUEUE_MAX_RETRIES -> "queue_max_retries"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("runtime_", "runtime.", 1)
            .replacen("queue_", "queue.", 1)
            .replacen("dedup_", "dedup.", 1)
            .replacen("idempotency_", "idempotency.", 1)
            .replacen("validity_", "validity.", 1)
            .replacen("conversation_", "conversation.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn load_from_str_applies_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.queue.concurrency, 1);
        assert_eq!(config.runtime.log_level, "info");
    }

    #[test]
    fn load_from_str_overrides_section_values() {
        let config = load_config_from_str(
            r#"
            [queue]
            capacity = 50
            max_retries = 5

            [validity]
            min_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.queue.capacity, 50);
        assert_eq!(config.queue.max_retries, 5);
        // Untouched keys keep their defaults.
        assert_eq!(config.queue.concurrency, 1);
        assert_eq!(config.validity.min_secs, 120);
        assert_eq!(config.validity.max_secs, 604_800);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [queue]
            capactiy = 50
            "#,
        );
        assert!(result.is_err(), "typo'd key should be rejected");
    }

    #[test]
    #[serial]
    fn env_override_maps_underscored_keys() {
        // SAFETY: guarded by #[serial]; no other test mutates this var.
        unsafe {
            std::env::set_var("COURIER_QUEUE_MIN_SEND_INTERVAL_MS", "750");
        }
        let config: CourierConfig = Figment::new()
            .merge(Serialized::defaults(CourierConfig::default()))
            .merge(env_provider())
            .extract()
            .unwrap();
        unsafe {
            std::env::remove_var("COURIER_QUEUE_MIN_SEND_INTERVAL_MS");
        }
        assert_eq!(config.queue.min_send_interval_ms, 750);
    }
}
