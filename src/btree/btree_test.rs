// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the B-tree engine, including structural invariant checks
//! after splits, rotations, merges, and root collapse.

use crate::btree::BTree;
use crate::memory::MemTracker;

#[test]
fn test_empty_tree() {
    let tree = BTree::<u32, u32>::new();
    assert_eq!(tree.search(1), None);
    assert_eq!(tree.locate(u32::MAX), None);
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.depth(), 1);
    assert_eq!(tree.iter().count(), 0);
}

#[test]
fn test_sequential_insert_and_split() {
    let mut tree = BTree::<u32, u32>::new();
    for k in 1..=256u32 {
        tree.insert(k, k);
    }
    tree.validate();
    assert!(tree.depth() >= 2);
    assert_eq!(tree.search(1), Some(&1));
    assert_eq!(tree.search(256), Some(&256));
    assert_eq!(tree.search(257), None);
    assert_eq!(tree.locate(257), Some(&256));
    assert_eq!(tree.locate(0), None);

    for k in 1..=128u32 {
        tree.remove(k);
    }
    tree.validate();
    for k in 1..=128u32 {
        assert_eq!(tree.search(k), None);
    }
    for k in 129..=256u32 {
        assert_eq!(tree.search(k), Some(&k));
    }
}

#[test]
fn test_insert_overwrites() {
    let mut tree = BTree::<u32, u32>::new();
    tree.insert(5, 1);
    tree.insert(5, 2);
    assert_eq!(tree.search(5), Some(&2));
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_locate_is_predecessor_search() {
    let mut tree = BTree::<u32, u32>::new();
    for k in [100u32, 300, 500] {
        tree.insert(k, k + 1);
    }
    assert_eq!(tree.locate(99), None);
    assert_eq!(tree.locate(100), Some(&101));
    assert_eq!(tree.locate(299), Some(&101));
    assert_eq!(tree.locate(300), Some(&301));
    assert_eq!(tree.locate(499), Some(&301));
    assert_eq!(tree.locate(u32::MAX), Some(&501));
}

/// A large payload shrinks node capacity to the floor of 6 slots, forcing
/// deep trees and every rebalancing move with few keys.
type WidePayload = [u64; 16];

#[test]
fn test_small_fanout_deep_tree() {
    let mut tree = BTree::<u32, WidePayload>::new();
    for k in 0..500u32 {
        tree.insert(k * 3, [u64::from(k); 16]);
    }
    tree.validate();
    assert!(tree.depth() >= 4, "depth {} too small", tree.depth());
    for k in 0..500u32 {
        assert_eq!(tree.search(k * 3), Some(&[u64::from(k); 16]));
        assert_eq!(tree.locate(k * 3 + 1), Some(&[u64::from(k); 16]));
    }

    // Delete from the middle outward, validating as the tree rebalances.
    for (n, k) in (100..400u32).enumerate() {
        tree.remove(k * 3);
        if n % 3 == 0 {
            tree.validate();
        }
    }
    tree.validate();
    for k in 100..400u32 {
        assert_eq!(tree.search(k * 3), None);
    }
    assert_eq!(tree.search(99 * 3), Some(&[99u64; 16]));
}

#[test]
fn test_root_collapse_to_empty() {
    let mut tree = BTree::<u32, WidePayload>::new();
    for k in 0..200u32 {
        tree.insert(k, [0u64; 16]);
    }
    assert!(tree.depth() >= 3);
    for k in 0..200u32 {
        tree.remove(k);
    }
    tree.validate();
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.depth(), 1);
    assert_eq!(tree.num_nodes(), 1);
    assert_eq!(tree.locate(u32::MAX), None);
}

#[test]
fn test_remove_internal_key_swaps_successor() {
    let mut tree = BTree::<u32, WidePayload>::new();
    for k in 0..60u32 {
        tree.insert(k, [u64::from(k); 16]);
    }
    tree.validate();
    // With the tiny fan-out the middle keys live in internal nodes; removing
    // them exercises the successor swap.
    for k in (0..60u32).step_by(5) {
        tree.remove(k);
        tree.validate();
    }
    for k in 0..60u32 {
        let expected = if k % 5 == 0 { None } else { Some([u64::from(k); 16]) };
        assert_eq!(tree.search(k).copied(), expected);
    }
}

#[test]
fn test_iter_sorted() {
    let mut tree = BTree::<u32, u32>::new();
    for k in (0..1000u32).rev() {
        tree.insert(k.wrapping_mul(0x9E37_79B9) >> 8, k);
    }
    let keys: Vec<u32> = tree.iter().map(|(k, _)| k).collect();
    assert_eq!(keys.len(), tree.len());
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

/// xorshift64 step; deterministic stand-in for an external random source.
fn next_rand(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

#[test]
fn test_matches_btreemap_model() {
    use std::collections::BTreeMap;

    let mut tree = BTree::<u32, u64>::new();
    let mut model: BTreeMap<u32, u64> = BTreeMap::new();
    let mut state = 0xFACE_FEED_0BAD_F00Du64;

    for step in 0..6000u64 {
        let r = next_rand(&mut state);
        let key = (r % 1500) as u32;
        if r & 0x2000 == 0 {
            tree.insert(key, step);
            model.insert(key, step);
        } else {
            tree.remove(key);
            model.remove(&key);
        }

        let probe = ((r >> 17) % 1700) as u32;
        assert_eq!(tree.search(probe), model.get(&probe));
        let expected = model.range(..=probe).next_back().map(|(_, v)| v);
        assert_eq!(tree.locate(probe), expected);
        assert_eq!(tree.len(), model.len());
        if step % 500 == 0 {
            tree.validate();
        }
    }
    tree.validate();

    let collected: Vec<(u32, u64)> = tree.iter().collect();
    let expected: Vec<(u32, u64)> = model.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(collected, expected);
}

#[test]
fn test_memory_round_trip() {
    let tracker = MemTracker::enabled();
    {
        let mut tree: BTree<u32, u64> = BTree::with_tracker(tracker.clone());
        for k in 0..3000u32 {
            tree.insert(k, u64::from(k));
        }
        assert!(tracker.used() > 0);
        for k in 0..3000u32 {
            tree.remove(k);
        }
        // The empty root is still accounted.
        assert!(tracker.used() > 0);
    }
    assert_eq!(tracker.used(), 0);
}

#[test]
fn test_stats_snapshot() {
    let mut tree = BTree::<u32, u32>::new();
    for k in 0..100u32 {
        tree.insert(k, k);
    }
    let stats = tree.stats();
    assert_eq!(stats.backend, "btree");
    assert_eq!(stats.num_keys, 100);
    assert_eq!(stats.num_buckets, 0);
    assert!(stats.num_nodes >= 1);
    assert!(stats.memory_bytes > 0);
}
