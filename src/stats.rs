// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Per-engine statistics snapshots.

use serde::{Deserialize, Serialize};

/// Point-in-time statistics of one index engine.
///
/// ## Example
/// ```rust
/// use reedmap::btrie::BurstTrie;
///
/// let mut trie = BurstTrie::<u32, u32>::new();
/// trie.insert(1, 10);
/// let stats = trie.stats();
/// assert_eq!(stats.backend, "btrie");
/// assert_eq!(stats.num_keys, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Backend identifier.
    pub backend: String,
    /// Stored key count.
    pub num_keys: usize,
    /// Internal node count (trie nodes or B-tree nodes).
    pub num_nodes: usize,
    /// Bucket count; zero for the B-tree.
    pub num_buckets: usize,
    /// Estimated bytes held by nodes and buckets.
    pub memory_bytes: usize,
}
