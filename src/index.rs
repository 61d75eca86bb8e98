// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Index trait abstraction for pluggable ordered-dictionary backends.
//!
//! Allows callers to switch between the burst trie, the B-tree, and the
//! split trie without changing lookup logic.

use crate::stats::IndexStats;
use std::fmt::Debug;

/// Common interface for all ordered index implementations.
///
/// ## Type Parameters
/// - `K`: Key type (a fixed-width unsigned integer)
/// - `V`: Value type (must be Clone for iteration)
///
/// ## Implementations
/// - `BurstTrie<K, V>`: level/path-compressed burst trie
/// - `BTree<K, V>`: in-memory B-tree
/// - `SplitTrie<K, V>`: bucket chain indexed by representative keys
///
/// ## Semantics
/// - Lookup misses are `None`, never errors.
/// - A reference returned by `search` or `locate` is invalidated by any
///   subsequent mutating call.
pub trait OrderedIndex<K, V>: Debug + Send + Sync {
    /// Add or overwrite a mapping.
    ///
    /// ## Performance
    /// - BurstTrie: O(height) descent + O(bucket) insert, amortised bursts
    /// - BTree: O(log n) with upward splits
    /// - SplitTrie: one predecessor query + O(bucket) insert
    fn insert(&mut self, key: K, value: V);

    /// Exact-match lookup.
    ///
    /// ## Output
    /// - `Some(&V)` if the key is stored
    /// - `None` if not
    fn search(&self, key: &K) -> Option<&V>;

    /// Value of the greatest stored key less than or equal to `key`.
    ///
    /// ## Output
    /// - `None` on an empty index or when the query precedes every
    ///   stored key
    ///
    /// ## Performance
    /// - BurstTrie/SplitTrie: one descent plus at most one bucket-chain
    ///   step
    /// - BTree: one descent with bound tracking
    fn locate(&self, key: &K) -> Option<&V>;

    /// Remove a mapping if present; a miss is a no-op.
    fn remove(&mut self, key: &K);

    /// Number of stored keys.
    fn len(&self) -> usize;

    /// Whether the index holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate all pairs in ascending key order.
    fn iter(&self) -> Box<dyn Iterator<Item = (K, V)> + '_>;

    /// Backend identifier ("btrie", "btree", or "strie").
    fn backend_type(&self) -> &'static str;

    /// Estimated bytes held by the structure's nodes and buckets.
    fn memory_usage(&self) -> usize;

    /// Statistics snapshot.
    fn stats(&self) -> IndexStats;
}
