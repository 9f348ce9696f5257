// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running dedup hit/miss counters, exposed as rates for capacity tuning.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated on every dedup check.
#[derive(Debug, Default)]
pub(crate) struct DedupCounters {
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    storage_hits: AtomicU64,
    storage_misses: AtomicU64,
    storage_errors: AtomicU64,
}

impl DedupCounters {
    pub(crate) fn memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn memory_miss(&self) {
        self.memory_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn storage_hit(&self) {
        self.storage_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn storage_miss(&self) {
        self.storage_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn storage_error(&self) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DedupStats {
        DedupStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            memory_misses: self.memory_misses.load(Ordering::Relaxed),
            storage_hits: self.storage_hits.load(Ordering::Relaxed),
            storage_misses: self.storage_misses.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of dedup cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub storage_hits: u64,
    pub storage_misses: u64,
    pub storage_errors: u64,
}

impl DedupStats {
    /// Fraction of checks answered by the memory layer.
    pub fn memory_hit_rate(&self) -> f64 {
        let total = self.memory_hits + self.memory_misses;
        if total == 0 {
            0.0
        } else {
            self.memory_hits as f64 / total as f64
        }
    }

    /// Fraction of storage lookups that found an existing id.
    pub fn storage_hit_rate(&self) -> f64 {
        let total = self.storage_hits + self.storage_misses;
        if total == 0 {
            0.0
        } else {
            self.storage_hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_zero_when_untouched() {
        let counters = DedupCounters::default();
        let stats = counters.snapshot();
        assert_eq!(stats.memory_hit_rate(), 0.0);
        assert_eq!(stats.storage_hit_rate(), 0.0);
    }

    #[test]
    fn rates_reflect_counts() {
        let counters = DedupCounters::default();
        counters.memory_hit();
        counters.memory_hit();
        counters.memory_hit();
        counters.memory_miss();
        let stats = counters.snapshot();
        assert_eq!(stats.memory_hits, 3);
        assert!((stats.memory_hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
