// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Courier delivery pipeline.
//!
//! TOML files (XDG hierarchy) merged with `COURIER_*` environment variable
//! overrides via Figment, deserialized into strongly-typed models with
//! unknown-key rejection, then semantically validated.

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    ConversationConfig, CourierConfig, DedupConfig, IdempotencyConfig, QueueConfig,
    ValidityConfig,
};
pub use validation::{ConfigError, validate_config};
