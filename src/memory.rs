// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Opt-in allocation accounting for the index engines.
//!
//! Every engine accepts a `MemTracker` at construction. An enabled tracker
//! observes every node, leaf, and bucket allocation the engine makes and
//! maintains running `used` and `peak` byte counts; the default tracker is a
//! no-op with zero cost beyond a branch. Accounting never alters engine
//! semantics.
//!
//! ## Quick Start
//!
//! ```rust
//! use reedmap::btrie::BurstTrie;
//! use reedmap::config::TrieConfig;
//! use reedmap::memory::MemTracker;
//!
//! let tracker = MemTracker::enabled();
//! {
//!     let mut trie = BurstTrie::<u32, u32>::with_tracker(
//!         TrieConfig::default(),
//!         tracker.clone(),
//!     );
//!     trie.insert(1, 100);
//!     assert!(tracker.used() > 0);
//! }
//! // Engine dropped: every allocation has been released.
//! assert_eq!(tracker.used(), 0);
//! ```
//!
//! ## Thread Safety
//!
//! Counters are atomic; a tracker may be cloned and shared across engines
//! and threads. Clones observe the same counters.

use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared used/peak byte counters.
#[derive(Debug, Default)]
struct MemCounter {
    used: AtomicUsize,
    peak: AtomicUsize,
}

/// Process-wide default collector.
static GLOBAL: Lazy<MemTracker> = Lazy::new(MemTracker::enabled);

/// Allocation tracker handle.
///
/// Cloning is cheap and shares the underlying counters. A tracker built with
/// `disabled()` (the `Default`) records nothing.
#[derive(Clone, Default)]
pub struct MemTracker {
    counter: Option<Arc<MemCounter>>,
}

impl fmt::Debug for MemTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.counter {
            Some(c) => f
                .debug_struct("MemTracker")
                .field("used", &c.used.load(Ordering::Relaxed))
                .field("peak", &c.peak.load(Ordering::Relaxed))
                .finish(),
            None => f.write_str("MemTracker(disabled)"),
        }
    }
}

impl MemTracker {
    /// Create a no-op tracker.
    pub fn disabled() -> Self {
        Self { counter: None }
    }

    /// Create an enabled tracker with fresh counters.
    pub fn enabled() -> Self {
        Self {
            counter: Some(Arc::new(MemCounter::default())),
        }
    }

    /// Handle to the process-wide default collector.
    ///
    /// All engines constructed with this handle share one pair of counters,
    /// in the manner of a global metrics collector.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Whether this tracker records allocations.
    pub fn is_enabled(&self) -> bool {
        self.counter.is_some()
    }

    /// Currently accounted bytes.
    pub fn used(&self) -> usize {
        match &self.counter {
            Some(c) => c.used.load(Ordering::Relaxed),
            None => 0,
        }
    }

    /// High-water mark of accounted bytes.
    pub fn peak(&self) -> usize {
        match &self.counter {
            Some(c) => c.peak.load(Ordering::Relaxed),
            None => 0,
        }
    }

    /// Record an allocation of `bytes`.
    pub(crate) fn on_alloc(&self, bytes: usize) {
        if let Some(c) = &self.counter {
            let used = c.used.fetch_add(bytes, Ordering::Relaxed) + bytes;
            c.peak.fetch_max(used, Ordering::Relaxed);
        }
    }

    /// Record a release of `bytes`.
    pub(crate) fn on_free(&self, bytes: usize) {
        if let Some(c) = &self.counter {
            c.used.fetch_sub(bytes, Ordering::Relaxed);
        }
    }

    /// Record an allocation of `count` items of type `T`.
    pub(crate) fn alloc_items<T>(&self, count: usize) {
        self.on_alloc(count * std::mem::size_of::<T>());
    }

    /// Record a release of `count` items of type `T`.
    pub(crate) fn free_items<T>(&self, count: usize) {
        self.on_free(count * std::mem::size_of::<T>());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_disabled_tracker_is_noop() {
        let t = MemTracker::disabled();
        t.on_alloc(1024);
        assert_eq!(t.used(), 0);
        assert_eq!(t.peak(), 0);
        assert!(!t.is_enabled());
    }

    #[test]
    fn test_used_and_peak() {
        let t = MemTracker::enabled();
        t.on_alloc(100);
        t.on_alloc(50);
        assert_eq!(t.used(), 150);
        assert_eq!(t.peak(), 150);

        t.on_free(120);
        assert_eq!(t.used(), 30);
        assert_eq!(t.peak(), 150);

        t.on_alloc(10);
        assert_eq!(t.used(), 40);
        assert_eq!(t.peak(), 150);
    }

    #[test]
    fn test_typed_items() {
        let t = MemTracker::enabled();
        t.alloc_items::<u64>(4);
        assert_eq!(t.used(), 32);
        t.free_items::<u64>(4);
        assert_eq!(t.used(), 0);
    }

    #[test]
    fn test_clones_share_counters() {
        let t = MemTracker::enabled();
        let u = t.clone();
        t.on_alloc(64);
        assert_eq!(u.used(), 64);
        u.on_free(64);
        assert_eq!(t.used(), 0);
    }

    #[test]
    #[serial]
    fn test_global_collector() {
        let t = MemTracker::global();
        assert!(t.is_enabled());
        let before = t.used();
        t.on_alloc(16);
        assert_eq!(MemTracker::global().used(), before + 16);
        t.on_free(16);
        assert_eq!(MemTracker::global().used(), before);
    }
}
