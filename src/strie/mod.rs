// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Split-trie engine.
//!
//! Buckets chained in key order, indexed by representative keys: each
//! bucket's smallest key at creation time is registered in a plain level-
//! and path-compressed trie, so a predecessor query on the trie names the
//! bucket responsible for any key. A full bucket splits in half (instead of
//! bursting into a subtrie) and the upper half's smallest key becomes a new
//! representative.
//!
//! A distinguished floor bucket catches keys below every representative; it
//! is the only bucket allowed to sit empty.
//!
//! ## Example Usage
//!
//! ```rust
//! use reedmap::strie::SplitTrie;
//!
//! let mut trie = SplitTrie::<u32, u64>::new();
//! trie.insert(500, 5);
//! trie.insert(300, 3);
//!
//! assert_eq!(trie.search(300), Some(&3));
//! assert_eq!(trie.locate(400), Some(&3));
//! assert_eq!(trie.locate(299), None);
//! ```

#[cfg(test)]
mod strie_test;

use crate::bitindex::{BitIndex, HeapBitIndex};
use crate::bucket::{BucketId, BucketStore, InsertOutcome};
use crate::config::TrieConfig;
use crate::index::OrderedIndex;
use crate::keys::KeyBits;
use crate::memory::MemTracker;
use crate::stats::IndexStats;
use crate::trie::LpcTrie;

/// Split-trie ordered index.
#[derive(Debug)]
pub struct SplitTrie<K: KeyBits, V, B: BitIndex = HeapBitIndex> {
    /// Representative keys only; values are bucket handles.
    trie: LpcTrie<K, BucketId, B>,
    buckets: BucketStore<K, V>,
    /// Catches keys below every representative. Never unlinked, may be
    /// empty.
    min_bucket: BucketId,
    num_keys: usize,
}

impl<K: KeyBits, V> SplitTrie<K, V, HeapBitIndex> {
    /// Create an engine with the default configuration and no tracking.
    pub fn new() -> Self {
        Self::with_config(TrieConfig::split_trie_default())
    }
}

impl<K: KeyBits, V> Default for SplitTrie<K, V, HeapBitIndex> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KeyBits, V, B: BitIndex> SplitTrie<K, V, B> {
    /// Create an engine from a validated configuration.
    pub fn with_config(config: TrieConfig) -> Self {
        Self::with_tracker(config, MemTracker::disabled())
    }

    /// Create an engine whose allocations are charged to `tracker`.
    pub fn with_tracker(config: TrieConfig, tracker: MemTracker) -> Self {
        let trie = LpcTrie::new(
            config.min_children_bits,
            config.max_children_bits,
            config.expand_threshold,
            config.contract_threshold,
            tracker.clone(),
        );
        let mut buckets = BucketStore::new(config.max_bucket_capacity, tracker);
        let min_bucket = buckets.create_empty();
        Self {
            trie,
            buckets,
            min_bucket,
            num_keys: 0,
        }
    }

    /// Bucket responsible for `key`.
    fn bucket_for(&self, key: K) -> BucketId {
        match self.trie.find_predecessor(key) {
            Some((_, bucket)) => bucket,
            None => self.min_bucket,
        }
    }

    /// Add or overwrite a mapping.
    pub fn insert(&mut self, key: K, value: V) {
        let target = self.bucket_for(key);
        match self.buckets.insert(target, key, value) {
            InsertOutcome::Updated => {}
            InsertOutcome::Created => self.num_keys += 1,
            InsertOutcome::Filled => {
                self.num_keys += 1;
                // Split in half; the upper half's smallest key becomes a
                // fresh representative.
                let upper = self.buckets.split(target);
                self.buckets.link_after(target, upper);
                if let Some(rep) = self.buckets.get(upper).rep {
                    self.trie.insert_plain(rep, upper);
                }
            }
            InsertOutcome::Failed => {
                debug_assert!(false, "bucket left full without splitting");
            }
        }
    }

    /// Exact-match lookup.
    pub fn search(&self, key: K) -> Option<&V> {
        self.buckets.get(self.bucket_for(key)).search(&key)
    }

    /// Value of the greatest stored key less than or equal to `key`.
    pub fn locate(&self, key: K) -> Option<&V> {
        let mut bucket = self.bucket_for(key);
        loop {
            let b = self.buckets.get(bucket);
            if b.is_empty() || key < b.min_key() {
                bucket = b.prev?;
                continue;
            }
            return b.locate(&key);
        }
    }

    /// Remove a mapping if present.
    pub fn remove(&mut self, key: K) {
        match self.trie.find_predecessor(key) {
            None => {
                if self.buckets.remove(self.min_bucket, key).is_none() {
                    return;
                }
                self.num_keys -= 1;
                if !self.buckets.get(self.min_bucket).is_empty() {
                    return;
                }
                // The drained floor bucket retires; its successor takes
                // over as the floor and gives up its representative.
                if let Some(next) = self.buckets.get(self.min_bucket).next {
                    if let Some(rep) = self.buckets.get_mut(next).rep.take() {
                        self.trie.remove_plain(rep);
                    }
                    let old = self.min_bucket;
                    self.buckets.unlink(old);
                    self.buckets.free(old);
                    self.min_bucket = next;
                }
            }
            Some((rep_key, bucket)) => {
                if self.buckets.remove(bucket, key).is_none() {
                    return;
                }
                self.num_keys -= 1;
                if self.buckets.get(bucket).is_empty() {
                    self.trie.remove_plain(rep_key);
                    self.buckets.unlink(bucket);
                    self.buckets.free(bucket);
                }
            }
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.num_keys
    }

    pub fn is_empty(&self) -> bool {
        self.num_keys == 0
    }

    /// Iterate all pairs in ascending key order along the bucket chain.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: &self.buckets,
            cur: Some(self.min_bucket),
            pos: 0,
        }
    }

    /// Number of buckets in the chain, the floor bucket included.
    pub fn num_buckets(&self) -> usize {
        self.buckets.num_buckets()
    }

    /// Estimated bytes held by nodes, leaves, and buckets.
    pub fn memory_usage(&self) -> usize {
        self.trie.footprint() + self.buckets.footprint()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            backend: "strie".to_string(),
            num_keys: self.num_keys,
            num_nodes: self.trie.num_nodes(),
            num_buckets: self.buckets.num_buckets(),
            memory_bytes: self.memory_usage(),
        }
    }
}

impl<K, V, B> OrderedIndex<K, V> for SplitTrie<K, V, B>
where
    K: KeyBits,
    V: Clone + std::fmt::Debug + Send + Sync,
    B: BitIndex,
{
    fn insert(&mut self, key: K, value: V) {
        SplitTrie::insert(self, key, value);
    }

    fn search(&self, key: &K) -> Option<&V> {
        SplitTrie::search(self, *key)
    }

    fn locate(&self, key: &K) -> Option<&V> {
        SplitTrie::locate(self, *key)
    }

    fn remove(&mut self, key: &K) {
        SplitTrie::remove(self, *key);
    }

    fn len(&self) -> usize {
        SplitTrie::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (K, V)> + '_> {
        Box::new(SplitTrie::iter(self))
    }

    fn backend_type(&self) -> &'static str {
        "strie"
    }

    fn memory_usage(&self) -> usize {
        SplitTrie::memory_usage(self)
    }

    fn stats(&self) -> IndexStats {
        SplitTrie::stats(self)
    }
}

/// In-order iterator over the bucket chain.
#[derive(Debug)]
pub struct Iter<'a, K, V> {
    buckets: &'a BucketStore<K, V>,
    cur: Option<BucketId>,
    pos: usize,
}

impl<'a, K: KeyBits, V: Clone> Iterator for Iter<'a, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            let id = self.cur?;
            let bucket = self.buckets.get(id);
            if self.pos < bucket.len() {
                let item = (bucket.keys[self.pos], bucket.values[self.pos].clone());
                self.pos += 1;
                return Some(item);
            }
            self.cur = bucket.next;
            self.pos = 0;
        }
    }
}
