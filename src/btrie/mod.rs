// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Burst-trie engine.
//!
//! A level- and path-compressed trie whose leaves hold sorted buckets
//! instead of single pairs. Any leaf on the query's digit path matches, so
//! keys sharing a path accumulate in one bucket until it fills; the full
//! bucket then bursts into a splitter node with one fresh bucket per
//! diverging digit. All buckets are chained in global key order and the
//! engine keeps the head of that chain, which makes locate a trie descent
//! plus at most one chain step.
//!
//! ## Example Usage
//!
//! ```rust
//! use reedmap::btrie::BurstTrie;
//!
//! let mut trie = BurstTrie::<u32, u64>::new();
//! for k in [5u32, 9, 200, 7] {
//!     trie.insert(k, u64::from(k) * 10);
//! }
//!
//! assert_eq!(trie.search(9), Some(&90));
//! assert_eq!(trie.locate(100), Some(&90)); // greatest key <= 100
//! assert_eq!(trie.locate(4), None);
//!
//! trie.remove(9);
//! assert_eq!(trie.locate(100), Some(&70));
//! ```

mod burst;


use crate::bitindex::{BitIndex, HeapBitIndex};
use crate::bucket::{BucketId, BucketStore, InsertOutcome};
use crate::config::TrieConfig;
use crate::index::OrderedIndex;
use crate::keys::KeyBits;
use crate::memory::MemTracker;
use crate::stats::IndexStats;
use crate::trie::{InsertHooks, LeafId, LpcTrie, NodeId, RemoveHooks, SearchOutcome, Slot};
use burst::{burst_filled, burst_into};

/// Burst-trie ordered index.
///
/// ## Type Parameters
/// - `K`: key type (`u32` or `u64`)
/// - `V`: value type
/// - `B`: in-node occupancy index realisation
#[derive(Debug)]
pub struct BurstTrie<K: KeyBits, V, B: BitIndex = HeapBitIndex> {
    trie: LpcTrie<K, BucketId, B>,
    buckets: BucketStore<K, V>,
    /// Head of the bucket chain; the only bucket with no predecessor.
    first_bucket: Option<BucketId>,
    num_keys: usize,
}

impl<K: KeyBits, V> BurstTrie<K, V, HeapBitIndex> {
    /// Create an engine with the default configuration and no tracking.
    pub fn new() -> Self {
        Self::with_config(TrieConfig::default())
    }
}

impl<K: KeyBits, V> Default for BurstTrie<K, V, HeapBitIndex> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KeyBits, V, B: BitIndex> BurstTrie<K, V, B> {
    /// Create an engine from a validated configuration.
    pub fn with_config(config: TrieConfig) -> Self {
        Self::with_tracker(config, MemTracker::disabled())
    }

    /// Create an engine whose allocations are charged to `tracker`.
    pub fn with_tracker(config: TrieConfig, tracker: MemTracker) -> Self {
        Self {
            trie: LpcTrie::new(
                config.min_children_bits,
                config.max_children_bits,
                config.expand_threshold,
                config.contract_threshold,
                tracker.clone(),
            ),
            buckets: BucketStore::new(config.max_bucket_capacity, tracker),
            first_bucket: None,
            num_keys: 0,
        }
    }

    /// Add or overwrite a mapping.
    ///
    /// ## Input
    /// - `key`: key to insert/update
    /// - `value`: value to store
    ///
    /// ## Performance
    /// - O(height) digit descent plus O(bucket) sorted insert
    /// - A full bucket bursts; a dense node may widen afterwards
    ///
    /// ## Side Effects
    /// - May burst the target bucket into a splitter subtrie
    /// - May widen the last traversed node
    pub fn insert(&mut self, key: K, value: V) {
        let mut hooks = BurstInsert {
            buckets: &mut self.buckets,
            first: &mut self.first_bucket,
            value: Some(value),
            created: false,
        };
        self.trie.insert_with(key, &mut hooks);
        if hooks.created {
            self.num_keys += 1;
        }
    }

    /// Exact-match lookup.
    ///
    /// ## Output
    /// - `Some(&V)` if the key is stored
    /// - `None` otherwise
    ///
    /// ## Performance
    /// - O(height) descent plus an O(log bucket) scan
    pub fn search(&self, key: K) -> Option<&V> {
        let leaf = self.trie.leaf_for_path(key)?;
        let bucket = self.trie.leaf(leaf).value;
        self.buckets.get(bucket).search(&key)
    }

    /// Value of the greatest stored key less than or equal to `key`.
    ///
    /// ## Output
    /// - `Some(&V)` for the predecessor-or-equal key
    /// - `None` on an empty engine or when the query precedes every key
    ///
    /// ## Performance
    /// - O(height) descent plus at most one bucket-chain step
    pub fn locate(&self, key: K) -> Option<&V> {
        match self.trie.general_search(key)? {
            SearchOutcome::Key(leaf) => {
                let bucket = self.trie.leaf(leaf).value;
                self.locate_with_list(bucket, key)
            }
            SearchOutcome::Pred(leaf) => {
                // Every key in that bucket precedes the query.
                let bucket = self.trie.leaf(leaf).value;
                Some(self.buckets.get(bucket).max_value())
            }
            SearchOutcome::Succ(leaf) => {
                // The found bucket strictly follows the query; its chain
                // predecessor holds the answer.
                let bucket = self.trie.leaf(leaf).value;
                let pred = self.buckets.get(bucket).prev?;
                Some(self.buckets.get(pred).max_value())
            }
        }
    }

    /// Locate within the bucket chain, stepping to predecessors while the
    /// query precedes the bucket's smallest key.
    fn locate_with_list(&self, mut bucket: BucketId, key: K) -> Option<&V> {
        loop {
            let b = self.buckets.get(bucket);
            if key < b.min_key() {
                bucket = b.prev?;
                continue;
            }
            return b.locate(&key);
        }
    }

    /// Remove a mapping if present; a miss is a no-op.
    ///
    /// ## Side Effects
    /// - A drained bucket leaves the chain and its leaf disappears
    /// - A node left with one branch is spliced out; a sparse node may
    ///   narrow afterwards
    pub fn remove(&mut self, key: K) {
        let mut hooks = BurstRemove {
            buckets: &mut self.buckets,
            first: &mut self.first_bucket,
            removed: false,
        };
        self.trie.remove_with(key, &mut hooks);
        if hooks.removed {
            self.num_keys -= 1;
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
            cur: self.first_bucket,
            pos: 0,
        }
    }

    /// Current fan-out (in bits) of the root node.
    pub fn root_fanout_bits(&self) -> u32 {
        self.trie.root_children_bits()
    }

    /// Number of buckets in the chain.
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
            backend: "btrie".to_string(),
            num_keys: self.num_keys,
            num_nodes: self.trie.num_nodes(),
            num_buckets: self.buckets.num_buckets(),
            memory_bytes: self.memory_usage(),
        }
    }
}

impl<K, V, B> OrderedIndex<K, V> for BurstTrie<K, V, B>
where
    K: KeyBits,
    V: Clone + std::fmt::Debug + Send + Sync,
    B: BitIndex,
{
    fn insert(&mut self, key: K, value: V) {
        BurstTrie::insert(self, key, value);
    }

    fn search(&self, key: &K) -> Option<&V> {
        BurstTrie::search(self, *key)
    }

    fn locate(&self, key: &K) -> Option<&V> {
        BurstTrie::locate(self, *key)
    }

    fn remove(&mut self, key: &K) {
        BurstTrie::remove(self, *key);
    }

    fn len(&self) -> usize {
        BurstTrie::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (K, V)> + '_> {
        Box::new(BurstTrie::iter(self))
    }

    fn backend_type(&self) -> &'static str {
        "btrie"
    }

    fn memory_usage(&self) -> usize {
        BurstTrie::memory_usage(self)
    }

    fn stats(&self) -> IndexStats {
        BurstTrie::stats(self)
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

/// Insert hooks: any leaf on the path matches; updates land in the bucket
/// and may burst it; fresh leaves get a bucket spliced into the chain.
struct BurstInsert<'a, K: KeyBits, V> {
    buckets: &'a mut BucketStore<K, V>,
    first: &'a mut Option<BucketId>,
    value: Option<V>,
    created: bool,
}

impl<'a, K: KeyBits, V, B: BitIndex> InsertHooks<K, BucketId, B> for BurstInsert<'a, K, V> {
    fn matches(&mut self, _leaf_key: K, _key: K) -> bool {
        true
    }

    fn create(&mut self, trie: &mut LpcTrie<K, BucketId, B>, node: NodeId, idx: u32, key: K) {
        let Some(value) = self.value.take() else {
            return;
        };
        let bucket = self.buckets.create_seeded(key, value);
        // Splice behind the predecessor bucket, or become the chain head.
        match trie.find_predecessor(key) {
            Some((_, pred)) => self.buckets.link_after(pred, bucket),
            None => {
                if let Some(head) = *self.first {
                    self.buckets.get_mut(bucket).next = Some(head);
                    self.buckets.get_mut(head).prev = Some(bucket);
                }
                *self.first = Some(bucket);
            }
        }
        let leaf = trie.alloc_leaf(key, bucket);
        trie.add_leaf_slot(node, idx, leaf);
        self.created = true;
    }

    fn update(&mut self, trie: &mut LpcTrie<K, BucketId, B>, node: NodeId, key: K, shift: u32) {
        let bits = trie.node(node).children_bits;
        let leaf_idx = key.extract(shift, bits).to_index() as u32;
        let Slot::Leaf(leaf) = trie.node(node).slots[leaf_idx as usize] else {
            return;
        };
        let bucket = trie.leaf(leaf).value;
        let Some(value) = self.value.take() else {
            return;
        };
        match self.buckets.insert(bucket, key, value) {
            InsertOutcome::Updated => {}
            InsertOutcome::Created => self.created = true,
            InsertOutcome::Filled => {
                self.created = true;
                burst_filled(
                    trie,
                    self.buckets,
                    self.first,
                    node,
                    leaf_idx,
                    leaf,
                    bucket,
                    key,
                    shift,
                );
            }
            InsertOutcome::Failed => {
                debug_assert!(false, "bucket left full without bursting");
            }
        }
    }

    fn connect(
        &mut self,
        trie: &mut LpcTrie<K, BucketId, B>,
        new_node: NodeId,
        old: NodeId,
        idx: u32,
        shift: u32,
    ) {
        // Re-bin the bucket over the widened digit instead of moving the
        // leaf: the wider level may separate its keys.
        let Slot::Leaf(leaf) = trie.node(old).slots[idx as usize] else {
            return;
        };
        let bucket = trie.leaf(leaf).value;
        let length = trie.node(new_node).children_bits;
        let head = burst_into(trie, self.buckets, bucket, new_node, shift, length);
        if *self.first == Some(bucket) {
            *self.first = Some(head);
        }
        self.buckets.free(bucket);
        trie.free_leaf(leaf);
    }
}

/// Remove hooks: delete from the bucket; the leaf goes away only when the
/// bucket drains, at which point it leaves the chain.
struct BurstRemove<'a, K: KeyBits, V> {
    buckets: &'a mut BucketStore<K, V>,
    first: &'a mut Option<BucketId>,
    removed: bool,
}

impl<'a, K: KeyBits, V, B: BitIndex> RemoveHooks<K, BucketId, B> for BurstRemove<'a, K, V> {
    fn matches(&mut self, _leaf_key: K, _key: K) -> bool {
        true
    }

    fn should_remove(&mut self, trie: &mut LpcTrie<K, BucketId, B>, leaf: LeafId, key: K) -> bool {
        let bucket = trie.leaf(leaf).value;
        if self.buckets.remove(bucket, key).is_none() {
            return false;
        }
        self.removed = true;
        if !self.buckets.get(bucket).is_empty() {
            return false;
        }
        if *self.first == Some(bucket) {
            *self.first = self.buckets.get(bucket).next;
        }
        self.buckets.unlink(bucket);
        self.buckets.free(bucket);
        true
    }
}
