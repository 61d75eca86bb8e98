// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Level- and path-compressed trie core.
//!
//! The trie dispatches on `children_bits`-wide digits extracted from the
//! most significant end of the key downward. Unary runs collapse into a
//! path-compression prefix on the child edge; nodes widen their fan-out when
//! enough children carry no prefix (the level is dense) and narrow it again
//! when occupancy drops.
//!
//! The structure is shared by two engines with different leaf behaviour:
//! plain key/value leaves (equality match, overwrite on update) and bucket
//! leaves (any leaf on the path matches, updates go into the bucket and may
//! burst it). The `InsertHooks`/`RemoveHooks` traits carry that behaviour
//! into one shared descent; nodes and leaves live in arenas and descent
//! records its parent chain explicitly, so no back-pointers exist anywhere.
//!
//! ## Descent vocabulary
//!
//! `shift` is the bit position (from the least significant bit) of the digit
//! currently consumed; entering a child subtracts the child's prefix length
//! and fan-out bits. A node reached with `shift` branches on
//! `key.extract(shift, children_bits)`.

pub(crate) mod node;


use crate::arena::Pool;
use crate::bitindex::BitIndex;
use crate::keys::KeyBits;
use crate::memory::MemTracker;
pub(crate) use node::{LeafId, NodeId, Slot, TrieLeaf, TrieNode};

/// Outcome of a locate-style descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchOutcome {
    /// The digit path of the query key ends at this leaf.
    Key(LeafId),
    /// No leaf on the path; this is the greatest leaf before the query.
    Pred(LeafId),
    /// No leaf on the path and nothing before; this is the least leaf
    /// after the query.
    Succ(LeafId),
}

/// Insertion behaviour plugged into the shared descent.
pub(crate) trait InsertHooks<K: KeyBits, V: Copy, B: BitIndex> {
    /// Whether the leaf's key counts as a match for the inserted key.
    fn matches(&mut self, leaf_key: K, key: K) -> bool;

    /// Install a new leaf for `key` at `node[idx]`. The slot is empty and
    /// the trie is fully consistent when this runs.
    fn create(&mut self, trie: &mut LpcTrie<K, V, B>, node: NodeId, idx: u32, key: K);

    /// The leaf at `key`'s digit of `node` matched; apply the update.
    fn update(&mut self, trie: &mut LpcTrie<K, V, B>, node: NodeId, key: K, shift: u32);

    /// Re-attach the leaf at `old[idx]` into the widened `new_node`, whose
    /// digit starts at `shift`. Slot indices are not re-registered with the
    /// occupancy index; the caller rebuilds it afterwards.
    fn connect(
        &mut self,
        trie: &mut LpcTrie<K, V, B>,
        new_node: NodeId,
        old: NodeId,
        idx: u32,
        shift: u32,
    );
}

/// Removal behaviour plugged into the shared descent.
pub(crate) trait RemoveHooks<K: KeyBits, V: Copy, B: BitIndex> {
    fn matches(&mut self, leaf_key: K, key: K) -> bool;

    /// Decide whether the matched leaf disappears. Bucket leaves only go
    /// away once their bucket drains.
    fn should_remove(&mut self, trie: &mut LpcTrie<K, V, B>, leaf: LeafId, key: K) -> bool;
}

/// Plain insertion: equality match, overwrite on update.
struct PlainInsert<V> {
    value: V,
}

impl<K: KeyBits, V: Copy, B: BitIndex> InsertHooks<K, V, B> for PlainInsert<V> {
    fn matches(&mut self, leaf_key: K, key: K) -> bool {
        leaf_key == key
    }

    fn create(&mut self, trie: &mut LpcTrie<K, V, B>, node: NodeId, idx: u32, key: K) {
        let leaf = trie.alloc_leaf(key, self.value);
        trie.add_leaf_slot(node, idx, leaf);
    }

    fn update(&mut self, trie: &mut LpcTrie<K, V, B>, node: NodeId, key: K, shift: u32) {
        let bits = trie.node(node).children_bits;
        let idx = key.extract(shift, bits).to_index();
        if let Slot::Leaf(leaf) = trie.node(node).slots[idx] {
            trie.leaf_mut(leaf).value = self.value;
        }
    }

    fn connect(
        &mut self,
        trie: &mut LpcTrie<K, V, B>,
        new_node: NodeId,
        old: NodeId,
        idx: u32,
        shift: u32,
    ) {
        if let Slot::Leaf(leaf) = trie.node(old).slots[idx as usize] {
            let bits = trie.node(new_node).children_bits;
            let pidx = trie.leaf(leaf).key.extract(shift, bits).to_index();
            trie.node_mut(new_node).slots[pidx] = Slot::Leaf(leaf);
        }
    }
}

/// Plain removal: equality match, leaf always removed.
struct PlainRemove;

impl<K: KeyBits, V: Copy, B: BitIndex> RemoveHooks<K, V, B> for PlainRemove {
    fn matches(&mut self, leaf_key: K, key: K) -> bool {
        leaf_key == key
    }

    fn should_remove(&mut self, _trie: &mut LpcTrie<K, V, B>, _leaf: LeafId, _key: K) -> bool {
        true
    }
}

/// Level- and path-compressed trie over fixed-width integer keys.
///
/// The bounds live on the type so teardown can account node footprints.
#[derive(Debug)]
pub(crate) struct LpcTrie<K: KeyBits, V: Copy, B: BitIndex> {
    nodes: Pool<TrieNode<K, B>>,
    leaves: Pool<TrieLeaf<K, V>>,
    root: NodeId,
    min_bits: u32,
    max_bits: u32,
    expand_threshold: f64,
    contract_threshold: f64,
    tracker: MemTracker,
}

impl<K: KeyBits, V: Copy, B: BitIndex> LpcTrie<K, V, B> {
    pub fn new(
        min_bits: u32,
        max_bits: u32,
        expand_threshold: f64,
        contract_threshold: f64,
        tracker: MemTracker,
    ) -> Self {
        let mut trie = Self {
            nodes: Pool::new(),
            leaves: Pool::new(),
            root: NodeId(0),
            min_bits,
            max_bits,
            expand_threshold,
            contract_threshold,
            tracker,
        };
        trie.root = trie.alloc_node(min_bits);
        trie
    }

    // ------------------------------------------------------------------
    // Arena access
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> &TrieNode<K, B> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TrieNode<K, B> {
        self.nodes.get_mut(id.0)
    }

    pub fn leaf(&self, id: LeafId) -> &TrieLeaf<K, V> {
        self.leaves.get(id.0)
    }

    pub fn leaf_mut(&mut self, id: LeafId) -> &mut TrieLeaf<K, V> {
        self.leaves.get_mut(id.0)
    }

    pub fn min_children_bits(&self) -> u32 {
        self.min_bits
    }

    pub fn root_children_bits(&self) -> u32 {
        self.node(self.root).children_bits
    }

    #[cfg(test)]
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Accounted bytes of all live nodes and leaves.
    pub fn footprint(&self) -> usize {
        let nodes: usize = self.nodes.iter().map(|n| n.footprint()).sum();
        nodes + self.leaves.len() * std::mem::size_of::<TrieLeaf<K, V>>()
    }

    pub fn alloc_node(&mut self, children_bits: u32) -> NodeId {
        let node = TrieNode::new(children_bits);
        self.tracker.on_alloc(node.footprint());
        NodeId(self.nodes.alloc(node))
    }

    fn free_node(&mut self, id: NodeId) {
        let node = self.nodes.free(id.0);
        self.tracker.on_free(node.footprint());
    }

    pub fn alloc_leaf(&mut self, key: K, value: V) -> LeafId {
        self.tracker.alloc_items::<TrieLeaf<K, V>>(1);
        LeafId(self.leaves.alloc(TrieLeaf { key, value }))
    }

    pub fn free_leaf(&mut self, id: LeafId) {
        self.leaves.free(id.0);
        self.tracker.free_items::<TrieLeaf<K, V>>(1);
    }

    /// Install a leaf and register the slot with the occupancy index.
    pub fn add_leaf_slot(&mut self, node: NodeId, idx: u32, leaf: LeafId) {
        let n = self.node_mut(node);
        n.slots[idx as usize] = Slot::Leaf(leaf);
        n.index.set(idx);
    }

    fn add_node_slot(&mut self, node: NodeId, idx: u32, child: NodeId) {
        let n = self.node_mut(node);
        n.slots[idx as usize] = Slot::Node(child);
        n.index.set(idx);
    }

    /// Install a leaf without touching the occupancy index. Used while a
    /// node's slots are bulk-rewritten; the caller rebuilds the index.
    pub fn place_leaf_unindexed(&mut self, node: NodeId, idx: usize, leaf: LeafId) {
        self.node_mut(node).slots[idx] = Slot::Leaf(leaf);
    }

    fn remove_leaf_slot(&mut self, node: NodeId, idx: u32, leaf: LeafId) {
        {
            let n = self.node_mut(node);
            n.slots[idx as usize] = Slot::Empty;
            n.index.unset(idx);
        }
        self.free_leaf(leaf);
    }

    pub fn rebuild_index(&mut self, node: NodeId) {
        let TrieNode { slots, index, .. } = self.nodes.get_mut(node.0);
        index.rebuild(&|i| !slots[i as usize].is_empty());
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    /// Insert with equality matching; an existing key's value is replaced.
    pub fn insert_plain(&mut self, key: K, value: V) {
        let mut hooks = PlainInsert { value };
        self.insert_with(key, &mut hooks);
    }

    pub fn insert_with<H: InsertHooks<K, V, B>>(&mut self, key: K, hooks: &mut H) {
        let mut parent: Option<(NodeId, u32)> = None;
        let mut node = self.root;
        let mut shift = K::NUM_BITS - self.node(node).children_bits;
        let mut idx = key.extract(shift, self.node(node).children_bits).to_index() as u32;

        loop {
            match self.node(node).slots[idx as usize] {
                Slot::Node(child) if shift > 0 => {
                    let (c_skip, c_skipped, c_bits) = {
                        let c = self.node(child);
                        (c.num_skipped, c.skipped_bits, c.children_bits)
                    };
                    if c_skipped == key.extract(shift - c_skip, c_skip) {
                        shift -= c_bits + c_skip;
                        parent = Some((node, idx));
                        node = child;
                        idx = key.extract(shift, c_bits).to_index() as u32;
                    } else {
                        // The child's prefix diverges from the key.
                        self.split_edge(node, idx, child, key, shift, hooks);
                        self.check_expand(parent, shift, node, hooks);
                        return;
                    }
                }
                Slot::Empty => {
                    hooks.create(self, node, idx, key);
                    return;
                }
                Slot::Leaf(leaf) => {
                    let leaf_key = self.leaf(leaf).key;
                    if hooks.matches(leaf_key, key) {
                        hooks.update(self, node, key, shift);
                    } else {
                        self.split_leaf_slot(node, idx, leaf, key, shift, hooks);
                    }
                    self.check_expand(parent, shift, node, hooks);
                    return;
                }
                Slot::Node(_) => {
                    debug_assert!(false, "internal node below the last digit");
                    return;
                }
            }
        }
    }

    /// The slot holds a leaf whose key differs from the inserted one: put a
    /// splitter carrying their common prefix between the node and both
    /// leaves.
    fn split_leaf_slot<H: InsertHooks<K, V, B>>(
        &mut self,
        node: NodeId,
        idx: u32,
        leaf: LeafId,
        key: K,
        shift: u32,
        hooks: &mut H,
    ) {
        let leaf_key = self.leaf(leaf).key;
        let num_matched = K::NUM_BITS - shift;
        let len = K::match_len(num_matched, self.min_bits, key, leaf_key);

        let splitter = self.alloc_node(self.min_bits);
        {
            let s = self.node_mut(splitter);
            s.num_skipped = len;
            s.skipped_bits = key.extract(shift - len, len);
        }
        // The slot already counts as occupied, so only the slot kind
        // changes here.
        self.node_mut(node).slots[idx as usize] = Slot::Node(splitter);

        let tmp = shift - len - self.min_bits;
        let old_idx = leaf_key.extract(tmp, self.min_bits).to_index() as u32;
        self.add_leaf_slot(splitter, old_idx, leaf);
        if len == 0 {
            self.node_mut(node).num_empty_internal += 1;
        }
        // The displaced leaf is reachable again; now the new one can go in.
        let new_idx = key.extract(tmp, self.min_bits).to_index() as u32;
        hooks.create(self, splitter, new_idx, key);
    }

    /// The child's path-compression prefix diverges from the key: put a
    /// splitter carrying the common part of the prefix between the node and
    /// the child, and hang a new leaf off it.
    fn split_edge<H: InsertHooks<K, V, B>>(
        &mut self,
        node: NodeId,
        idx: u32,
        child: NodeId,
        key: K,
        shift: u32,
        hooks: &mut H,
    ) {
        let (ns, child_skipped) = {
            let c = self.node(child);
            (c.num_skipped, c.skipped_bits)
        };
        let len = K::match_len(
            K::NUM_BITS - ns,
            self.min_bits,
            key.extract(shift - ns, ns),
            child_skipped,
        );

        let splitter = self.alloc_node(self.min_bits);
        {
            let s = self.node_mut(splitter);
            s.num_skipped = len;
            s.skipped_bits = child_skipped.extract(ns - len, len);
        }
        self.node_mut(node).slots[idx as usize] = Slot::Node(splitter);

        // Re-attach the child under the splitter with the consumed bits
        // stripped from its prefix.
        let child_idx = child_skipped
            .extract(ns - len - self.min_bits, self.min_bits)
            .to_index() as u32;
        let new_skip = ns - len - self.min_bits;
        {
            let c = self.node_mut(child);
            c.num_skipped = new_skip;
            c.skipped_bits = child_skipped.low_bits(new_skip);
        }
        self.add_node_slot(splitter, child_idx, child);
        if new_skip == 0 {
            self.node_mut(splitter).num_empty_internal += 1;
        }
        if len == 0 {
            self.node_mut(node).num_empty_internal += 1;
        }

        let new_idx = key
            .extract(shift - len - self.min_bits, self.min_bits)
            .to_index() as u32;
        hooks.create(self, splitter, new_idx, key);
    }

    // ------------------------------------------------------------------
    // Expand / contract
    // ------------------------------------------------------------------

    /// Widen `node` by `min_bits` when enough of its internal children
    /// carry no prefix, pulling their slots up into the wider level.
    fn check_expand<H: InsertHooks<K, V, B>>(
        &mut self,
        parent: Option<(NodeId, u32)>,
        shift: u32,
        node: NodeId,
        hooks: &mut H,
    ) {
        let widen = {
            let n = self.node(node);
            n.children_bits < self.max_bits && n.is_full_enough(self.expand_threshold)
        };
        if !widen {
            return;
        }

        let old_bits = self.node(node).children_bits;
        let new_node = self.alloc_node(old_bits + self.min_bits);
        {
            let (skip, skipped) = {
                let n = self.node(node);
                (n.num_skipped, n.skipped_bits)
            };
            let nn = self.node_mut(new_node);
            nn.num_skipped = skip;
            nn.skipped_bits = skipped;
        }

        let consumed = (K::NUM_BITS - shift) + self.min_bits;
        for i in 0..(1u32 << old_bits) {
            self.compress_into(new_node, node, i << self.min_bits, i, consumed, hooks);
        }
        self.rebuild_index(new_node);

        match parent {
            Some((p, pidx)) => {
                self.node_mut(p).slots[pidx as usize] = Slot::Node(new_node);
            }
            None => self.root = new_node,
        }
        self.free_node(node);
    }

    /// Move the child at `old[idx]` into `new_parent`, whose slots for this
    /// digit start at `parent_offset`.
    fn compress_into<H: InsertHooks<K, V, B>>(
        &mut self,
        new_parent: NodeId,
        old: NodeId,
        parent_offset: u32,
        idx: u32,
        num_consumed: u32,
        hooks: &mut H,
    ) {
        match self.node(old).slots[idx as usize] {
            Slot::Node(c) => {
                let (c_skip, c_skipped, c_bits) = {
                    let n = self.node(c);
                    (n.num_skipped, n.skipped_bits, n.children_bits)
                };
                if c_skip > 0 {
                    // Absorb the first prefix digit into the wider level.
                    let sub = c_skipped
                        .extract(c_skip - self.min_bits, self.min_bits)
                        .to_index() as u32;
                    let pidx = parent_offset + sub;
                    self.node_mut(new_parent).slots[pidx as usize] = Slot::Node(c);
                    let ns = c_skip - self.min_bits;
                    {
                        let cm = self.node_mut(c);
                        cm.num_skipped = ns;
                        cm.skipped_bits = c_skipped.low_bits(ns);
                    }
                    if ns == 0 {
                        self.node_mut(new_parent).num_empty_internal += 1;
                    }
                } else if c_bits > self.min_bits {
                    // A wide prefix-free child cannot be absorbed whole;
                    // distribute it over dividers.
                    self.divide_node(c, new_parent, parent_offset);
                    self.free_node(c);
                } else {
                    // Prefix-free child of exactly min_bits: its slots map
                    // one-to-one onto the widened digit range.
                    for i in 0..(1u32 << c_bits) {
                        let slot = self.node(c).slots[i as usize];
                        if slot.is_empty() {
                            continue;
                        }
                        self.node_mut(new_parent).slots[(parent_offset + i) as usize] = slot;
                        if let Slot::Node(g) = slot {
                            if self.node(g).num_skipped == 0 {
                                self.node_mut(new_parent).num_empty_internal += 1;
                            }
                        }
                    }
                    self.free_node(c);
                }
            }
            Slot::Leaf(_) => {
                hooks.connect(self, new_parent, old, idx, K::NUM_BITS - num_consumed);
            }
            Slot::Empty => {}
        }
    }

    /// Distribute the slots of `src` (fan-out 2^num_bits) over up to
    /// 2^min_bits dividers of 2^(num_bits - min_bits) slots each, placed at
    /// `dst[dst_offset..]`. A divider holding a single branch is not
    /// materialised; the branch is pulled up with its prefix extended by
    /// the divider's digit.
    fn divide_node(&mut self, src: NodeId, dst: NodeId, dst_offset: u32) {
        let num_bits = self.node(src).children_bits;
        let sbits = num_bits - self.min_bits;
        let group = 1u32 << sbits;
        let end = 1u32 << num_bits;

        let mut k = 0u32;
        while k < end {
            let divider_start = k & !(group - 1);
            let divider_end = divider_start + group;
            let first_branch = if !self.node(src).slots[k as usize].is_empty() {
                k
            } else {
                match self.succ_in(src, k) {
                    Some(j) => j,
                    None => break,
                }
            };
            if first_branch >= divider_end {
                k = first_branch;
                continue;
            }
            let i = first_branch >> sbits;
            let next_branch = self.succ_in(src, first_branch);
            let lone = next_branch.map_or(true, |j| j >= divider_end);
            if lone {
                let slot = self.node(src).slots[first_branch as usize];
                self.node_mut(dst).slots[(dst_offset + i) as usize] = slot;
                if let Slot::Node(n) = slot {
                    let sub = first_branch - divider_start;
                    let nm = self.node_mut(n);
                    nm.skipped_bits =
                        nm.skipped_bits | (K::from_index(sub as usize) << nm.num_skipped);
                    nm.num_skipped += sbits;
                }
                match next_branch {
                    Some(j) => k = j,
                    None => break,
                }
            } else {
                let divider = self.alloc_node(sbits);
                for s in divider_start..divider_end {
                    let slot = self.node(src).slots[s as usize];
                    if slot.is_empty() {
                        continue;
                    }
                    self.node_mut(divider).slots[(s - divider_start) as usize] = slot;
                    if let Slot::Node(g) = slot {
                        if self.node(g).num_skipped == 0 {
                            self.node_mut(divider).num_empty_internal += 1;
                        }
                    }
                }
                self.rebuild_index(divider);
                self.node_mut(dst).slots[(dst_offset + i) as usize] = Slot::Node(divider);
                self.node_mut(dst).num_empty_internal += 1;
                k = divider_end;
            }
        }
    }

    fn succ_in(&self, node: NodeId, idx: u32) -> Option<u32> {
        self.node(node).index.succ(idx)
    }

    /// Narrow `node` back to `min_bits` when its occupancy has dropped.
    fn check_contract(&mut self, parent: Option<(NodeId, u32)>, node: NodeId) {
        let narrow = {
            let n = self.node(node);
            n.children_bits > self.min_bits && n.is_empty_enough(self.contract_threshold)
        };
        if !narrow {
            return;
        }

        let new_node = self.alloc_node(self.min_bits);
        self.divide_node(node, new_node, 0);
        self.rebuild_index(new_node);

        let (n_skip, n_skipped) = {
            let n = self.node(node);
            (n.num_skipped, n.skipped_bits)
        };

        match parent {
            Some((p, pidx)) => {
                let lone_idx = if self.node(new_node).index.count() == 1 {
                    self.node(new_node).index.min_idx()
                } else {
                    None
                };
                if let Some(idx) = lone_idx {
                    // Single branch: pull it up instead of keeping a nearly
                    // empty node, preserving the whole prefix chain.
                    let slot = self.node(new_node).slots[idx as usize];
                    self.node_mut(p).slots[pidx as usize] = slot;
                    if let Slot::Node(x) = slot {
                        let min_bits = self.min_bits;
                        let xm = self.node_mut(x);
                        xm.skipped_bits = xm.skipped_bits
                            | (((n_skipped << min_bits) | K::from_index(idx as usize))
                                << xm.num_skipped);
                        xm.num_skipped += n_skip + min_bits;
                    }
                    if n_skip == 0 {
                        self.node_mut(p).num_empty_internal -= 1;
                    }
                    self.free_node(new_node);
                } else {
                    {
                        let nn = self.node_mut(new_node);
                        nn.num_skipped = n_skip;
                        nn.skipped_bits = n_skipped;
                    }
                    self.node_mut(p).slots[pidx as usize] = Slot::Node(new_node);
                }
            }
            None => {
                // The root cannot carry a prefix, so it never pulls a lone
                // child up; the narrowed node simply becomes the root.
                self.root = new_node;
            }
        }
        self.free_node(node);
    }

    // ------------------------------------------------------------------
    // Remove
    // ------------------------------------------------------------------

    /// Remove with equality matching.
    pub fn remove_plain(&mut self, key: K) {
        let mut hooks = PlainRemove;
        self.remove_with(key, &mut hooks);
    }

    pub fn remove_with<H: RemoveHooks<K, V, B>>(&mut self, key: K, hooks: &mut H) {
        let mut grandparent: Option<(NodeId, u32)> = None;
        let mut parent: Option<(NodeId, u32)> = None;
        let mut node = self.root;
        let mut shift = K::NUM_BITS - self.node(node).children_bits;
        let mut idx = key.extract(shift, self.node(node).children_bits).to_index() as u32;

        let leaf = loop {
            match self.node(node).slots[idx as usize] {
                Slot::Node(child) if shift > 0 => {
                    let (c_skip, c_skipped, c_bits) = {
                        let c = self.node(child);
                        (c.num_skipped, c.skipped_bits, c.children_bits)
                    };
                    if c_skipped != key.extract(shift - c_skip, c_skip) {
                        // The key diverges from every key in this subtree.
                        return;
                    }
                    shift -= c_bits + c_skip;
                    grandparent = parent;
                    parent = Some((node, idx));
                    node = child;
                    idx = key.extract(shift, c_bits).to_index() as u32;
                }
                Slot::Leaf(leaf) => break leaf,
                Slot::Empty => return,
                Slot::Node(_) => return,
            }
        };

        let leaf_key = self.leaf(leaf).key;
        if !hooks.matches(leaf_key, key) {
            return;
        }
        if !hooks.should_remove(self, leaf, key) {
            return;
        }

        if parent.is_some() && self.node(node).index.count() == 2 {
            // The node is about to hold a single branch; splice it out and
            // concatenate the prefixes so path compression survives.
            let (p, pidx) = match parent {
                Some(pair) => pair,
                None => return,
            };
            let (first, last) = {
                let n = self.node(node);
                (n.index.min_idx(), n.index.max_idx())
            };
            let other_idx = match (first, last) {
                (Some(f), Some(l)) => {
                    if idx == f {
                        l
                    } else {
                        f
                    }
                }
                _ => return,
            };
            let (n_skip, n_skipped, n_bits) = {
                let n = self.node(node);
                (n.num_skipped, n.skipped_bits, n.children_bits)
            };
            if n_skip == 0 {
                self.node_mut(p).num_empty_internal -= 1;
            }
            match self.node(node).slots[other_idx as usize] {
                Slot::Node(x) => {
                    self.node_mut(p).slots[pidx as usize] = Slot::Node(x);
                    let xm = self.node_mut(x);
                    xm.skipped_bits = xm.skipped_bits
                        | (n_skipped << (xm.num_skipped + n_bits))
                        | (K::from_index(other_idx as usize) << xm.num_skipped);
                    xm.num_skipped += n_skip + n_bits;
                }
                Slot::Leaf(survivor) => {
                    self.node_mut(p).slots[pidx as usize] = Slot::Leaf(survivor);
                }
                Slot::Empty => return,
            }
            self.free_node(node);
            self.free_leaf(leaf);
            self.check_contract(grandparent, p);
        } else {
            self.remove_leaf_slot(node, idx, leaf);
            self.check_contract(parent, node);
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Exact-match search.
    pub fn search(&self, key: K) -> Option<&V> {
        let leaf = self.leaf_for_path(key)?;
        let l = self.leaf(leaf);
        if l.key == key {
            Some(&l.value)
        } else {
            None
        }
    }

    /// Descend along the key's digits, checking every prefix on the way,
    /// and return the leaf the path ends at.
    pub fn leaf_for_path(&self, key: K) -> Option<LeafId> {
        let mut node = self.root;
        let mut shift = K::NUM_BITS - self.node(node).children_bits;
        let mut idx = key.extract(shift, self.node(node).children_bits).to_index();
        loop {
            match self.node(node).slots[idx] {
                Slot::Node(child) if shift > 0 => {
                    let c = self.node(child);
                    if c.skipped_bits != key.extract(shift - c.num_skipped, c.num_skipped) {
                        return None;
                    }
                    shift -= c.children_bits + c.num_skipped;
                    idx = key.extract(shift, c.children_bits).to_index();
                    node = child;
                }
                Slot::Leaf(leaf) => return Some(leaf),
                _ => return None,
            }
        }
    }

    /// Locate-style descent: find the leaf on the query's path, or the
    /// nearest leaf on either side when the path dead-ends.
    pub fn general_search(&self, key: K) -> Option<SearchOutcome> {
        let mut node = self.root;
        let mut shift = K::NUM_BITS - self.node(node).children_bits;
        let mut idx = key.extract(shift, self.node(node).children_bits).to_index() as u32;
        loop {
            match self.node(node).slots[idx as usize] {
                Slot::Node(child) if shift > 0 => {
                    let c = self.node(child);
                    let key_bits = key.extract(shift - c.num_skipped, c.num_skipped);
                    if key_bits != c.skipped_bits {
                        // Everything below the child is on one side of the
                        // query.
                        return if key_bits > c.skipped_bits {
                            Some(SearchOutcome::Pred(self.max_leaf_from(child)))
                        } else {
                            Some(SearchOutcome::Succ(self.min_leaf_from(child)))
                        };
                    }
                    shift -= c.children_bits + c.num_skipped;
                    idx = key.extract(shift, c.children_bits).to_index() as u32;
                    node = child;
                }
                Slot::Leaf(leaf) => return Some(SearchOutcome::Key(leaf)),
                _ => {
                    if let Some(j) = self.node(node).index.pred(idx) {
                        return Some(SearchOutcome::Pred(self.max_leaf_under(node, j)));
                    }
                    if let Some(j) = self.node(node).index.succ(idx) {
                        return Some(SearchOutcome::Succ(self.min_leaf_under(node, j)));
                    }
                    return None;
                }
            }
        }
    }

    /// Greatest stored key less than or equal to `key`, with its value.
    pub fn find_predecessor(&self, key: K) -> Option<(K, V)> {
        let mut pred_ancestor: Option<(NodeId, u32)> = None;
        let mut node = self.root;
        let mut shift = K::NUM_BITS - self.node(node).children_bits;
        let mut idx = key.extract(shift, self.node(node).children_bits).to_index() as u32;

        loop {
            if self.node(node).index.pred(idx).is_some() {
                pred_ancestor = Some((node, idx));
            }
            match self.node(node).slots[idx as usize] {
                Slot::Node(child) if shift > 0 => {
                    let (c_skip, c_skipped, c_bits) = {
                        let c = self.node(child);
                        (c.num_skipped, c.skipped_bits, c.children_bits)
                    };
                    let key_bits = key.extract(shift - c_skip, c_skip);
                    if key_bits != c_skipped {
                        if key_bits > c_skipped {
                            // The whole subtree precedes the query; its
                            // maximum is the predecessor.
                            let l = self.max_leaf_from(child);
                            let lf = self.leaf(l);
                            return Some((lf.key, lf.value));
                        }
                        // The subtree follows the query; fall back to the
                        // deepest ancestor with an earlier branch.
                        break;
                    }
                    shift -= c_bits + c_skip;
                    idx = key.extract(shift, c_bits).to_index() as u32;
                    node = child;
                }
                Slot::Leaf(l) => {
                    let lf = self.leaf(l);
                    if lf.key <= key {
                        return Some((lf.key, lf.value));
                    }
                    if let Some(j) = self.node(node).index.pred(idx) {
                        let l = self.max_leaf_under(node, j);
                        let lf = self.leaf(l);
                        return Some((lf.key, lf.value));
                    }
                    break;
                }
                Slot::Empty => {
                    if let Some(j) = self.node(node).index.pred(idx) {
                        let l = self.max_leaf_under(node, j);
                        let lf = self.leaf(l);
                        return Some((lf.key, lf.value));
                    }
                    break;
                }
                Slot::Node(_) => break,
            }
        }

        let (anode, aidx) = pred_ancestor?;
        let j = self.node(anode).index.pred(aidx)?;
        let l = self.max_leaf_under(anode, j);
        let lf = self.leaf(l);
        Some((lf.key, lf.value))
    }

    /// Greatest leaf in the subtree hanging at `node[idx]`.
    fn max_leaf_under(&self, mut node: NodeId, mut idx: u32) -> LeafId {
        loop {
            match self.node(node).slots[idx as usize] {
                Slot::Node(c) => {
                    node = c;
                    idx = match self.node(c).index.max_idx() {
                        Some(i) => i,
                        None => unreachable!("internal node with no branches"),
                    };
                }
                Slot::Leaf(l) => return l,
                Slot::Empty => unreachable!("descending into an empty slot"),
            }
        }
    }

    /// Least leaf in the subtree hanging at `node[idx]`.
    fn min_leaf_under(&self, mut node: NodeId, mut idx: u32) -> LeafId {
        loop {
            match self.node(node).slots[idx as usize] {
                Slot::Node(c) => {
                    node = c;
                    idx = match self.node(c).index.min_idx() {
                        Some(i) => i,
                        None => unreachable!("internal node with no branches"),
                    };
                }
                Slot::Leaf(l) => return l,
                Slot::Empty => unreachable!("descending into an empty slot"),
            }
        }
    }

    /// Greatest leaf anywhere below `node`.
    fn max_leaf_from(&self, node: NodeId) -> LeafId {
        let idx = match self.node(node).index.max_idx() {
            Some(i) => i,
            None => unreachable!("internal node with no branches"),
        };
        self.max_leaf_under(node, idx)
    }

    /// Least leaf anywhere below `node`.
    fn min_leaf_from(&self, node: NodeId) -> LeafId {
        let idx = match self.node(node).index.min_idx() {
            Some(i) => i,
            None => unreachable!("internal node with no branches"),
        };
        self.min_leaf_under(node, idx)
    }
}

impl<K: KeyBits, V: Copy, B: BitIndex> Drop for LpcTrie<K, V, B> {
    fn drop(&mut self) {
        // Release everything still accounted; the arenas themselves free
        // the storage.
        let node_bytes: usize = self.nodes.iter().map(|n| n.footprint()).sum();
        self.tracker.on_free(node_bytes);
        self.tracker
            .free_items::<TrieLeaf<K, V>>(self.leaves.len());
    }
}
