// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Burst policy: replacing a full bucket with a splitter subtrie.

use crate::bitindex::BitIndex;
use crate::bucket::{BucketId, BucketStore};
use crate::keys::KeyBits;
use crate::trie::{LeafId, LpcTrie, NodeId, Slot};

/// A bucket at `node[leaf_idx]` just filled: create a splitter carrying the
/// longest prefix shared by every bucket key beyond the node's digit, re-bin
/// the bucket into fresh leaves under it, and retire the old bucket.
#[allow(clippy::too_many_arguments)]
pub(super) fn burst_filled<K: KeyBits, V, B: BitIndex>(
    trie: &mut LpcTrie<K, BucketId, B>,
    buckets: &mut BucketStore<K, V>,
    first: &mut Option<BucketId>,
    node: NodeId,
    leaf_idx: u32,
    leaf: LeafId,
    bucket: BucketId,
    key: K,
    shift: u32,
) {
    let min_bits = trie.min_children_bits();
    let splitter = trie.alloc_node(min_bits);
    // A leaf already occupied this slot, so only the slot kind changes.
    trie.node_mut(node).slots[leaf_idx as usize] = Slot::Node(splitter);

    // Longest common prefix of all bucket keys below the node's digit,
    // stepping down one digit at a time. The inserted key is already in the
    // bucket. Distinct keys guarantee a mismatch before the bits run out.
    let mut lcp_len = 0u32;
    let mut s = shift as i64 - min_bits as i64;
    while s >= 0 {
        let bits = key.extract(s as u32, min_bits);
        if !buckets.get(bucket).all_bits_match(bits, s as u32, min_bits) {
            break;
        }
        lcp_len += min_bits;
        s -= min_bits as i64;
    }
    {
        let sp = trie.node_mut(splitter);
        sp.num_skipped = lcp_len;
        sp.skipped_bits = key.extract(shift - lcp_len, lcp_len);
    }
    if lcp_len == 0 {
        trie.node_mut(node).num_empty_internal += 1;
    }

    let head = burst_into(
        trie,
        buckets,
        bucket,
        splitter,
        shift - min_bits - lcp_len,
        min_bits,
    );
    if *first == Some(bucket) {
        *first = Some(head);
    }
    trie.rebuild_index(splitter);
    buckets.free(bucket);
    trie.free_leaf(leaf);
}

/// Re-bin every pair of `bucket` into fresh sub-buckets under `node`, keyed
/// by the digit at `shift` of width `length`, and splice the new buckets
/// into the chain in place of the old one. Returns the first new bucket.
///
/// Slots are written without registering them in the occupancy index; the
/// caller rebuilds it once the node's slots are final.
pub(super) fn burst_into<K: KeyBits, V, B: BitIndex>(
    trie: &mut LpcTrie<K, BucketId, B>,
    buckets: &mut BucketStore<K, V>,
    bucket: BucketId,
    node: NodeId,
    shift: u32,
    length: u32,
) -> BucketId {
    let (keys, values, prev, next) = buckets.take_contents(bucket);
    let mut pairs = keys.into_iter().zip(values);

    // A bursting bucket is never empty; seed the first sub-bucket from the
    // smallest pair so the chain splice has an anchor.
    let (first_key, first_value) = match pairs.next() {
        Some(pair) => pair,
        None => unreachable!("bursting an empty bucket"),
    };
    let head = buckets.create_seeded(first_key, first_value);
    buckets.get_mut(head).prev = prev;
    if let Some(p) = prev {
        buckets.get_mut(p).next = Some(head);
    }
    let leaf = trie.alloc_leaf(first_key, head);
    trie.place_leaf_unindexed(node, first_key.extract(shift, length).to_index(), leaf);

    // Keys arrive sorted, so pairs sharing a digit are consecutive and a
    // plain append keeps every sub-bucket sorted.
    let mut tail = head;
    for (k, v) in pairs {
        let idx = k.extract(shift, length).to_index();
        match trie.node(node).slots[idx] {
            Slot::Leaf(l) => {
                let existing = trie.leaf(l).value;
                buckets.push_max(existing, k, v);
            }
            Slot::Empty => {
                let fresh = buckets.create_seeded(k, v);
                buckets.get_mut(fresh).prev = Some(tail);
                buckets.get_mut(tail).next = Some(fresh);
                let l = trie.alloc_leaf(k, fresh);
                trie.place_leaf_unindexed(node, idx, l);
                tail = fresh;
            }
            Slot::Node(_) => unreachable!("bursting into an occupied subtrie slot"),
        }
    }
    buckets.get_mut(tail).next = next;
    if let Some(n) = next {
        buckets.get_mut(n).prev = Some(tail);
    }
    head
}
