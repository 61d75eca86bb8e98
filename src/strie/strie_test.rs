// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the split-trie engine.

use crate::memory::MemTracker;
use crate::config::TrieConfig;
use crate::strie::SplitTrie;

#[test]
fn test_empty_engine() {
    let trie = SplitTrie::<u32, u64>::new();
    assert_eq!(trie.search(0), None);
    assert_eq!(trie.locate(u32::MAX), None);
    assert_eq!(trie.len(), 0);
    assert_eq!(trie.iter().count(), 0);
    // Only the floor bucket exists.
    assert_eq!(trie.num_buckets(), 1);
}

#[test]
fn test_insert_search_locate() {
    let mut trie = SplitTrie::<u32, u64>::new();
    trie.insert(500, 5);
    trie.insert(300, 3);
    trie.insert(0xF000_0000, 15);
    assert_eq!(trie.len(), 3);
    assert_eq!(trie.search(300), Some(&3));
    assert_eq!(trie.search(301), None);
    assert_eq!(trie.locate(299), None);
    assert_eq!(trie.locate(300), Some(&3));
    assert_eq!(trie.locate(499), Some(&3));
    assert_eq!(trie.locate(0xF000_0001), Some(&15));
}

#[test]
fn test_insert_overwrites() {
    let mut trie = SplitTrie::<u32, u64>::new();
    trie.insert(7, 1);
    trie.insert(7, 2);
    assert_eq!(trie.search(7), Some(&2));
    assert_eq!(trie.len(), 1);
}

#[test]
fn test_splits_create_representatives() {
    // A small bucket capacity forces splits early.
    let config = TrieConfig::new(4, 20, 0.75, 0.25, 8).unwrap();
    let mut trie: SplitTrie<u32, u32> = SplitTrie::with_config(config);
    for k in 0..64u32 {
        trie.insert(k, k * 10);
    }
    assert!(trie.num_buckets() > 4, "no splits happened");
    for k in 0..64u32 {
        assert_eq!(trie.search(k), Some(&(k * 10)));
        assert_eq!(trie.locate(k), Some(&(k * 10)));
    }
    let keys: Vec<u32> = trie.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (0..64u32).collect::<Vec<_>>());
}

#[test]
fn test_remove_drains_buckets() {
    let config = TrieConfig::new(4, 20, 0.75, 0.25, 8).unwrap();
    let mut trie: SplitTrie<u32, u32> = SplitTrie::with_config(config);
    for k in 0..64u32 {
        trie.insert(k, k);
    }
    for k in 0..64u32 {
        trie.remove(k);
    }
    assert_eq!(trie.len(), 0);
    assert_eq!(trie.locate(u32::MAX), None);
    for k in 0..64u32 {
        assert_eq!(trie.search(k), None);
    }
}

#[test]
fn test_removing_floor_bucket_promotes_successor() {
    let config = TrieConfig::new(4, 20, 0.75, 0.25, 4).unwrap();
    let mut trie: SplitTrie<u32, u32> = SplitTrie::with_config(config);
    for k in 0..16u32 {
        trie.insert(k, k);
    }
    assert!(trie.num_buckets() >= 3);
    // Drain from the bottom so the floor bucket retires repeatedly.
    for k in 0..8u32 {
        trie.remove(k);
    }
    for k in 8..16u32 {
        assert_eq!(trie.search(k), Some(&k));
    }
    assert_eq!(trie.locate(7), None);
    assert_eq!(trie.locate(100), Some(&15));
}

/// Removing a bucket's smallest key leaves its registered representative
/// stale; lookups and predecessor queries must keep working.
#[test]
fn test_stale_representative() {
    let config = TrieConfig::new(4, 20, 0.75, 0.25, 4).unwrap();
    let mut trie: SplitTrie<u32, u32> = SplitTrie::with_config(config);
    for k in 0..12u32 {
        trie.insert(k * 10, k);
    }
    // Find a non-floor bucket's minimum and remove it.
    trie.remove(40);
    assert_eq!(trie.search(40), None);
    assert_eq!(trie.search(50), trie.locate(50));
    // A query between the stale representative and the new minimum steps
    // back through the chain.
    assert_eq!(trie.locate(45), Some(&3));
    // Re-inserting lands in the same region.
    trie.insert(41, 100);
    assert_eq!(trie.search(41), Some(&100));
    assert_eq!(trie.locate(45), Some(&100));
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

    let mut trie = SplitTrie::<u32, u64>::new();
    let mut model: BTreeMap<u32, u64> = BTreeMap::new();
    let mut state = 0x5EED_5EED_5EED_5EEDu64;

    for step in 0..6000u64 {
        let r = next_rand(&mut state);
        let key = ((r % 1024) * 0x0104_0101) as u32;
        if r & 0x1000 == 0 {
            trie.insert(key, step);
            model.insert(key, step);
        } else {
            trie.remove(key);
            model.remove(&key);
        }

        let probe = (((r >> 22) % 1400) * 0x00C0_3001) as u32;
        assert_eq!(trie.search(probe), model.get(&probe));
        let expected = model.range(..=probe).next_back().map(|(_, v)| v);
        assert_eq!(trie.locate(probe), expected);
        assert_eq!(trie.len(), model.len());
    }

    let collected: Vec<(u32, u64)> = trie.iter().collect();
    let expected: Vec<(u32, u64)> = model.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(collected, expected);
}

#[test]
fn test_memory_round_trip() {
    let tracker = MemTracker::enabled();
    {
        let mut trie: SplitTrie<u32, u64> =
            SplitTrie::with_tracker(TrieConfig::split_trie_default(), tracker.clone());
        for k in 0..4000u32 {
            trie.insert(k.wrapping_mul(0x0101_0101), u64::from(k));
        }
        assert!(tracker.used() > 0);
        assert!(tracker.peak() >= tracker.used());
    }
    assert_eq!(tracker.used(), 0);
}
