// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotency key validation.
//!
//! An invalid key means "no idempotency requested", never an error — the
//! caller's request always proceeds without the feature.

/// Checks a caller-supplied idempotency key: non-empty, bounded length,
/// restricted to ASCII alphanumerics plus `-`, `_`, and `.`.
pub fn is_valid_key(key: &str, max_len: usize) -> bool {
    !key.is_empty()
        && key.len() <= max_len
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 128;

    #[test]
    fn accepts_typical_keys() {
        assert!(is_valid_key("abc123", MAX));
        assert!(is_valid_key("req-2026.08.29_001", MAX));
        assert!(is_valid_key("a", MAX));
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(!is_valid_key("", MAX));
        assert!(!is_valid_key(&"x".repeat(129), MAX));
        assert!(is_valid_key(&"x".repeat(128), MAX));
    }

    #[test]
    fn rejects_forbidden_characters() {
        assert!(!is_valid_key("has space", MAX));
        assert!(!is_valid_key("semi;colon", MAX));
        assert!(!is_valid_key("uni\u{00e9}", MAX));
        assert!(!is_valid_key("new\nline", MAX));
    }
}
