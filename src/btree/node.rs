// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! B-tree node and element records.
//!
//! A node holds a sorted run of elements plus one extra subtree pointer to
//! the left of everything (`subtree0`). An element's subtree holds the keys
//! strictly between its own key and the next element's key. Node capacity is
//! derived from the element size so a node's array stays within a cache
//! friendly byte budget; one slot beyond the normal maximum stays reserved
//! as the split-overflow landing pad.

use crate::keys::KeyBits;

/// Handle to a B-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeId(pub u32);

/// Ceiling on elements per node.
const MAX_ELEMENTS: usize = 200;

/// Byte budget for a node's element array.
const MAX_ARRAY_BYTES: usize = 800;

/// Total slot capacity for a node of this element type, counting the
/// zeroth subtree slot and the overflow pad.
pub(crate) fn node_capacity<K, V>() -> usize {
    let sz = std::mem::size_of::<Element<K, V>>();
    let cap = if MAX_ELEMENTS * sz <= MAX_ARRAY_BYTES {
        MAX_ELEMENTS
    } else {
        MAX_ARRAY_BYTES / sz
    };
    cap.max(6)
}

/// Minimum keys per non-root node for a given slot capacity.
pub(crate) fn min_keys(capacity: usize) -> usize {
    (capacity - 1).div_ceil(2) - 1
}

/// Key, payload, and the subtree of keys greater than this one.
#[derive(Debug)]
pub(crate) struct Element<K, V> {
    pub key: K,
    pub payload: V,
    pub subtree: Option<NodeId>,
}

/// B-tree node.
#[derive(Debug)]
pub(crate) struct BtNode<K, V> {
    /// Subtree of keys smaller than every element.
    pub subtree0: Option<NodeId>,
    /// Sorted elements; length stays at most `capacity - 2` outside of a
    /// split, at most `capacity - 1` while one is in flight.
    pub elems: Vec<Element<K, V>>,
}

impl<K: KeyBits, V> BtNode<K, V> {
    pub fn is_leaf(&self) -> bool {
        self.subtree0.is_none()
    }

    /// Slot search: `Ok(i)` when `elems[i].key == key`, `Err(i)` with the
    /// child index to descend otherwise. Steers at the boundaries before
    /// binary-searching between them.
    pub fn find(&self, key: K) -> Result<usize, usize> {
        let len = self.elems.len();
        if len == 0 || key < self.elems[0].key {
            return Err(0);
        }
        if key > self.elems[len - 1].key {
            return Err(len);
        }
        self.elems.binary_search_by(|e| e.key.cmp(&key))
    }
}
