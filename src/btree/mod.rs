// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! In-memory B-tree engine.
//!
//! A classical B-tree: sorted element runs per node, splits growing the tree
//! upward from the root, deletions restoring the minimum-keys bound by
//! rotating an element in from a sibling or merging with one, and the root
//! collapsing downward when it drains. Node capacity derives from the
//! element size (see `node::node_capacity`); there are no tuning knobs.
//!
//! Descent records its path explicitly, so nodes carry no parent pointers
//! and the current root is a single handle owned by the tree.
//!
//! ## Example Usage
//!
//! ```rust
//! use reedmap::btree::BTree;
//!
//! let mut tree = BTree::<u32, u64>::new();
//! for k in 1..=300u32 {
//!     tree.insert(k, u64::from(k) * 2);
//! }
//!
//! assert_eq!(tree.search(200), Some(&400));
//! assert_eq!(tree.locate(301), Some(&600)); // greatest key <= 301
//!
//! tree.remove(300);
//! assert_eq!(tree.locate(301), Some(&598));
//! ```

pub(crate) mod node;

#[cfg(test)]
mod btree_test;

use crate::arena::Pool;
use crate::index::OrderedIndex;
use crate::keys::KeyBits;
use crate::memory::MemTracker;
use crate::stats::IndexStats;
use node::{min_keys, node_capacity, BtNode, Element, NodeId};

/// B-tree ordered index.
#[derive(Debug)]
pub struct BTree<K: KeyBits, V> {
    nodes: Pool<BtNode<K, V>>,
    root: NodeId,
    /// Total slot capacity per node, zeroth slot and overflow pad included.
    capacity: usize,
    min_keys: usize,
    num_keys: usize,
    tracker: MemTracker,
}

impl<K: KeyBits, V> BTree<K, V> {
    pub fn new() -> Self {
        Self::with_tracker(MemTracker::disabled())
    }

    /// Create a tree whose allocations are charged to `tracker`.
    pub fn with_tracker(tracker: MemTracker) -> Self {
        let capacity = node_capacity::<K, V>();
        let mut tree = Self {
            nodes: Pool::new(),
            root: NodeId(0),
            capacity,
            min_keys: min_keys(capacity),
            num_keys: 0,
            tracker,
        };
        tree.root = tree.alloc_node(None, Vec::new());
        tree
    }

    fn node(&self, id: NodeId) -> &BtNode<K, V> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> &mut BtNode<K, V> {
        self.nodes.get_mut(id.0)
    }

    fn node_footprint(&self) -> usize {
        std::mem::size_of::<BtNode<K, V>>()
            + (self.capacity - 1) * std::mem::size_of::<Element<K, V>>()
    }

    fn alloc_node(&mut self, subtree0: Option<NodeId>, elems: Vec<Element<K, V>>) -> NodeId {
        let mut elems = elems;
        elems.reserve_exact(self.capacity - 1 - elems.len());
        self.tracker.on_alloc(self.node_footprint());
        NodeId(self.nodes.alloc(BtNode { subtree0, elems }))
    }

    fn free_node(&mut self, id: NodeId) -> BtNode<K, V> {
        self.tracker.on_free(self.node_footprint());
        self.nodes.free(id.0)
    }

    fn child_at(&self, parent: NodeId, j: usize) -> NodeId {
        let n = self.node(parent);
        let slot = if j == 0 {
            n.subtree0
        } else {
            n.elems[j - 1].subtree
        };
        match slot {
            Some(id) => id,
            None => unreachable!("internal node missing a child"),
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Exact-match lookup.
    ///
    /// ## Output
    /// - `Some(&V)` if the key is stored
    /// - `None` otherwise
    ///
    /// ## Performance
    /// - O(log n): boundary steering plus a binary search per node
    pub fn search(&self, key: K) -> Option<&V> {
        let mut cur = self.root;
        loop {
            match self.node(cur).find(key) {
                Ok(i) => return Some(&self.node(cur).elems[i].payload),
                Err(i) => {
                    let next = if i == 0 {
                        self.node(cur).subtree0
                    } else {
                        self.node(cur).elems[i - 1].subtree
                    };
                    cur = next?;
                }
            }
        }
    }

    /// Value of the greatest stored key less than or equal to `key`.
    ///
    /// ## Output
    /// - `Some(&V)` for the predecessor-or-equal key
    /// - `None` on an empty tree or when the query precedes every key
    ///
    /// ## Performance
    /// - O(log n): the best lower bound is tracked during the descent, so
    ///   no second pass is needed
    pub fn locate(&self, key: K) -> Option<&V> {
        let mut best: Option<(NodeId, usize)> = None;
        let mut cur = Some(self.root);
        while let Some(id) = cur {
            match self.node(id).find(key) {
                Ok(i) => return Some(&self.node(id).elems[i].payload),
                Err(i) => {
                    cur = if i == 0 {
                        self.node(id).subtree0
                    } else {
                        // elems[i - 1] is the best bound seen so far.
                        best = Some((id, i - 1));
                        self.node(id).elems[i - 1].subtree
                    };
                }
            }
        }
        best.map(|(id, i)| &self.node(id).elems[i].payload)
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    /// Add or overwrite a mapping.
    ///
    /// ## Input
    /// - `key`: key to insert/update
    /// - `value`: value to store
    ///
    /// ## Performance
    /// - O(log n); splits propagate upward along the recorded path
    ///
    /// ## Side Effects
    /// - Full nodes on the path split; a root split grows the tree by one
    ///   level
    pub fn insert(&mut self, key: K, value: V) {
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        let mut cur = self.root;
        let leaf_pos = loop {
            match self.node(cur).find(key) {
                Ok(i) => {
                    self.node_mut(cur).elems[i].payload = value;
                    return;
                }
                Err(i) => {
                    let next = if i == 0 {
                        self.node(cur).subtree0
                    } else {
                        self.node(cur).elems[i - 1].subtree
                    };
                    match next {
                        Some(child) => {
                            stack.push((cur, i));
                            cur = child;
                        }
                        None => break i,
                    }
                }
            }
        };
        self.num_keys += 1;

        let mut carry = Element {
            key,
            payload: value,
            subtree: None,
        };
        let mut target = cur;
        let mut pos = leaf_pos;
        loop {
            self.node_mut(target).elems.insert(pos, carry);
            if self.node(target).elems.len() <= self.capacity - 2 {
                return;
            }
            // Overflow: split around the ceiling midpoint, promoting the
            // element there into the parent.
            let split_point = (self.node(target).elems.len() + 1).div_ceil(2);
            let right_elems = self.node_mut(target).elems.split_off(split_point);
            let upward = match self.node_mut(target).elems.pop() {
                Some(e) => e,
                None => unreachable!("split of a node with no elements"),
            };
            let right = self.alloc_node(upward.subtree, right_elems);
            carry = Element {
                key: upward.key,
                payload: upward.payload,
                subtree: Some(right),
            };
            match stack.pop() {
                Some((parent, parent_pos)) => {
                    target = parent;
                    pos = parent_pos;
                }
                None => {
                    // The root split; grow the tree upward.
                    let new_root = self.alloc_node(Some(target), vec![carry]);
                    self.root = new_root;
                    return;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Remove
    // ------------------------------------------------------------------

    /// Remove a mapping if present; a miss is a no-op.
    ///
    /// ## Performance
    /// - O(log n); underflow repair walks back up the recorded path
    ///
    /// ## Side Effects
    /// - Nodes below minimum occupancy import an element from a sibling or
    ///   merge with one; a drained root collapses into its only child
    pub fn remove(&mut self, key: K) {
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        let mut cur = self.root;
        let found = loop {
            match self.node(cur).find(key) {
                Ok(i) => break (cur, i),
                Err(i) => {
                    let next = if i == 0 {
                        self.node(cur).subtree0
                    } else {
                        self.node(cur).elems[i - 1].subtree
                    };
                    match next {
                        Some(child) => {
                            stack.push((cur, i));
                            cur = child;
                        }
                        None => return,
                    }
                }
            }
        };
        let (holder, i) = found;
        self.num_keys -= 1;

        let leaf = if self.node(holder).is_leaf() {
            self.node_mut(holder).elems.remove(i);
            holder
        } else {
            // Swap in the smallest key of the element's right subtree,
            // then delete that key from its leaf.
            let mut child = self.child_at(holder, i + 1);
            stack.push((holder, i + 1));
            while let Some(next) = self.node(child).subtree0 {
                stack.push((child, 0));
                child = next;
            }
            let successor = self.node_mut(child).elems.remove(0);
            let slot = &mut self.node_mut(holder).elems[i];
            slot.key = successor.key;
            slot.payload = successor.payload;
            child
        };
        self.rebalance(leaf, stack);
    }

    /// Walk upward from `cur`, restoring the minimum-keys bound by
    /// rotation or merge, collapsing the root when it drains.
    fn rebalance(&mut self, mut cur: NodeId, mut stack: Vec<(NodeId, usize)>) {
        loop {
            if cur == self.root {
                let drained = self.node(cur).elems.is_empty();
                if drained {
                    if let Some(only) = self.node(cur).subtree0 {
                        self.root = only;
                        self.free_node(cur);
                    }
                }
                return;
            }
            if self.node(cur).elems.len() >= self.min_keys {
                return;
            }
            let (parent, pidx) = match stack.pop() {
                Some(p) => p,
                None => return,
            };
            let parent_len = self.node(parent).elems.len();

            if pidx < parent_len {
                let right = self.child_at(parent, pidx + 1);
                if self.node(right).elems.len() > self.min_keys {
                    self.rotate_from_right(parent, pidx, cur, right);
                    return;
                }
            }
            if pidx > 0 {
                let left = self.child_at(parent, pidx - 1);
                if self.node(left).elems.len() > self.min_keys {
                    self.rotate_from_left(parent, pidx, cur, left);
                    return;
                }
            }
            if pidx < parent_len {
                let right = self.child_at(parent, pidx + 1);
                self.merge_right(parent, pidx, cur, right);
                cur = parent;
            } else {
                let left = self.child_at(parent, pidx - 1);
                self.merge_left(parent, pidx, cur, left);
                cur = parent;
            }
        }
    }

    /// Import the parent separator into `cur` and pull the right sibling's
    /// smallest element up into the separator slot. Parent key count is
    /// unchanged.
    fn rotate_from_right(&mut self, parent: NodeId, pidx: usize, cur: NodeId, right: NodeId) {
        let (old_right0, first) = {
            let r = self.node_mut(right);
            let first = r.elems.remove(0);
            let old0 = r.subtree0;
            r.subtree0 = first.subtree;
            (old0, first)
        };
        let sep = &mut self.node_mut(parent).elems[pidx];
        let filler_key = std::mem::replace(&mut sep.key, first.key);
        let filler_payload = std::mem::replace(&mut sep.payload, first.payload);
        self.node_mut(cur).elems.push(Element {
            key: filler_key,
            payload: filler_payload,
            subtree: old_right0,
        });
    }

    /// Mirror image of `rotate_from_right`.
    fn rotate_from_left(&mut self, parent: NodeId, pidx: usize, cur: NodeId, left: NodeId) {
        let last = {
            let l = self.node_mut(left);
            match l.elems.pop() {
                Some(e) => e,
                None => unreachable!("rotating from an empty sibling"),
            }
        };
        let old_cur0 = std::mem::replace(&mut self.node_mut(cur).subtree0, last.subtree);
        let sep = &mut self.node_mut(parent).elems[pidx - 1];
        let filler_key = std::mem::replace(&mut sep.key, last.key);
        let filler_payload = std::mem::replace(&mut sep.payload, last.payload);
        self.node_mut(cur).elems.insert(
            0,
            Element {
                key: filler_key,
                payload: filler_payload,
                subtree: old_cur0,
            },
        );
    }

    /// Fold the parent separator and the right sibling into `cur`. The
    /// parent loses a key and may itself fall below minimum.
    fn merge_right(&mut self, parent: NodeId, pidx: usize, cur: NodeId, right: NodeId) {
        let sep = self.node_mut(parent).elems.remove(pidx);
        let right_node = self.free_node(right);
        let c = self.node_mut(cur);
        c.elems.push(Element {
            key: sep.key,
            payload: sep.payload,
            subtree: right_node.subtree0,
        });
        c.elems.extend(right_node.elems);
    }

    /// Fold the parent separator and `cur` into the left sibling.
    fn merge_left(&mut self, parent: NodeId, pidx: usize, cur: NodeId, left: NodeId) {
        let sep = self.node_mut(parent).elems.remove(pidx - 1);
        let cur_node = self.free_node(cur);
        let l = self.node_mut(left);
        l.elems.push(Element {
            key: sep.key,
            payload: sep.payload,
            subtree: cur_node.subtree0,
        });
        l.elems.extend(cur_node.elems);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.num_keys
    }

    pub fn is_empty(&self) -> bool {
        self.num_keys == 0
    }

    /// Number of live nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Tree height in nodes along the leftmost spine.
    pub fn depth(&self) -> usize {
        let mut d = 1;
        let mut cur = self.root;
        while let Some(next) = self.node(cur).subtree0 {
            d += 1;
            cur = next;
        }
        d
    }

    /// Estimated bytes held by nodes.
    pub fn memory_usage(&self) -> usize {
        self.nodes.len() * self.node_footprint()
    }

    /// Iterate all pairs in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left_spine(self.root);
        iter
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            backend: "btree".to_string(),
            num_keys: self.num_keys,
            num_nodes: self.nodes.len(),
            num_buckets: 0,
            memory_bytes: self.memory_usage(),
        }
    }

    /// Verify the structural invariants, panicking on violation. Test use.
    #[cfg(test)]
    pub fn validate(&self) {
        use std::collections::HashSet;
        let mut leaf_depths = HashSet::new();
        let count = self.validate_node(self.root, None, None, 1, &mut leaf_depths);
        assert_eq!(count, self.num_keys, "stored key count drifted");
        assert!(leaf_depths.len() <= 1, "leaves at different depths");
    }

    #[cfg(test)]
    fn validate_node(
        &self,
        id: NodeId,
        lower: Option<K>,
        upper: Option<K>,
        depth: usize,
        leaf_depths: &mut std::collections::HashSet<usize>,
    ) -> usize {
        let n = self.node(id);
        if id != self.root {
            assert!(n.elems.len() >= self.min_keys, "node below minimum keys");
        }
        assert!(n.elems.len() <= self.capacity - 2, "node above capacity");
        for w in n.elems.windows(2) {
            assert!(w[0].key < w[1].key, "unsorted node");
        }
        for e in &n.elems {
            if let Some(lo) = lower {
                assert!(e.key > lo, "key below subtree bound");
            }
            if let Some(hi) = upper {
                assert!(e.key < hi, "key above subtree bound");
            }
        }
        if n.is_leaf() {
            leaf_depths.insert(depth);
            return n.elems.len();
        }
        let mut count = n.elems.len();
        let first_key = n.elems.first().map(|e| e.key);
        count += self.validate_node(
            self.child_at(id, 0),
            lower,
            first_key,
            depth + 1,
            leaf_depths,
        );
        for i in 0..n.elems.len() {
            let lo = Some(n.elems[i].key);
            let hi = n.elems.get(i + 1).map(|e| e.key).or(upper);
            count += self.validate_node(self.child_at(id, i + 1), lo, hi, depth + 1, leaf_depths);
        }
        count
    }
}

impl<K: KeyBits, V> Default for BTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KeyBits, V> Drop for BTree<K, V> {
    fn drop(&mut self) {
        self.tracker
            .on_free(self.nodes.len() * self.node_footprint());
    }
}

impl<K, V> OrderedIndex<K, V> for BTree<K, V>
where
    K: KeyBits,
    V: Clone + std::fmt::Debug + Send + Sync,
{
    fn insert(&mut self, key: K, value: V) {
        BTree::insert(self, key, value);
    }

    fn search(&self, key: &K) -> Option<&V> {
        BTree::search(self, *key)
    }

    fn locate(&self, key: &K) -> Option<&V> {
        BTree::locate(self, *key)
    }

    fn remove(&mut self, key: &K) {
        BTree::remove(self, *key);
    }

    fn len(&self) -> usize {
        BTree::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (K, V)> + '_> {
        Box::new(BTree::iter(self))
    }

    fn backend_type(&self) -> &'static str {
        "btree"
    }

    fn memory_usage(&self) -> usize {
        BTree::memory_usage(self)
    }

    fn stats(&self) -> IndexStats {
        BTree::stats(self)
    }
}

/// In-order iterator; the stack holds `(node, next element index)`.
#[derive(Debug)]
pub struct Iter<'a, K: KeyBits, V> {
    tree: &'a BTree<K, V>,
    stack: Vec<(NodeId, usize)>,
}

impl<'a, K: KeyBits, V> Iter<'a, K, V> {
    fn push_left_spine(&mut self, mut node: NodeId) {
        loop {
            self.stack.push((node, 0));
            match self.tree.node(node).subtree0 {
                Some(next) => node = next,
                None => break,
            }
        }
    }
}

impl<'a, K: KeyBits, V: Clone> Iterator for Iter<'a, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            let (node, i) = self.stack.pop()?;
            let n = self.tree.node(node);
            if i >= n.elems.len() {
                continue;
            }
            self.stack.push((node, i + 1));
            let e = &n.elems[i];
            if let Some(sub) = e.subtree {
                self.push_left_spine(sub);
            }
            return Some((e.key, e.payload.clone()));
        }
    }
}
