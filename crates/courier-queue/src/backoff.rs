// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry backoff schedule.

use std::time::Duration;

/// Delay before the retry following `attempt` (1-based), as
/// `base * 2^(attempt-1)` capped at `max`.
pub fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_attempt_until_the_cap() {
        assert_eq!(backoff_delay(1, 1000, 60_000), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2, 1000, 60_000), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3, 1000, 60_000), Duration::from_millis(4000));
        assert_eq!(backoff_delay(7, 1000, 60_000), Duration::from_millis(60_000));
    }

    #[test]
    fn large_attempt_counts_do_not_overflow() {
        assert_eq!(backoff_delay(64, 1000, 60_000), Duration::from_millis(60_000));
    }
}
