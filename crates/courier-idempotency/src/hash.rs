// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stable request hashing.
//!
//! `serde_json::Value` objects are backed by a `BTreeMap` (the
//! `preserve_order` feature is off), so serialization emits keys in sorted
//! order at every nesting level. Hashing that canonical form makes the hash
//! independent of the field order the caller used.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the canonical serialization of `params`.
pub fn request_hash(params: &serde_json::Value) -> String {
    let canonical = params.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_independent_of_key_order() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"to":"+1555","body":"hi","priority":1}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"priority":1,"body":"hi","to":"+1555"}"#).unwrap();
        assert_eq!(request_hash(&a), request_hash(&b));
    }

    #[test]
    fn hash_differs_for_different_params() {
        assert_ne!(
            request_hash(&json!({"body": "hi"})),
            request_hash(&json!({"body": "hi!"}))
        );
    }

    #[test]
    fn nested_objects_are_canonicalized_too() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"m":{"x":1,"y":2}}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"m":{"y":2,"x":1}}"#).unwrap();
        assert_eq!(request_hash(&a), request_hash(&b));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = request_hash(&json!({}));
        assert_eq!(h.len(), 64);
        assert!(h.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
