// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the sqrt-bucketed occupancy index, including equivalence with
//! the OR-heap realisation under randomised operation sequences.

use crate::bitindex::{BitIndex, HeapBitIndex, SqrtBitIndex};

#[test]
fn test_empty_index() {
    let idx = SqrtBitIndex::new(4);
    assert_eq!(idx.count(), 0);
    assert_eq!(idx.min_idx(), None);
    assert_eq!(idx.max_idx(), None);
    assert_eq!(idx.pred(15), None);
    assert_eq!(idx.succ(0), None);
}

#[test]
fn test_pred_succ_across_groups() {
    // With 16 slots the group width is 4, so these indices span groups.
    let mut idx = SqrtBitIndex::new(4);
    for i in [1u32, 6, 12] {
        idx.set(i);
    }
    assert_eq!(idx.pred(6), Some(1));
    assert_eq!(idx.pred(12), Some(6));
    assert_eq!(idx.succ(1), Some(6));
    assert_eq!(idx.succ(6), Some(12));
    assert_eq!(idx.succ(12), None);
    assert_eq!(idx.pred(1), None);
}

#[test]
fn test_unset_updates_counters() {
    let mut idx = SqrtBitIndex::new(4);
    idx.set(4);
    idx.set(5);
    idx.set(9);
    idx.unset(5);
    assert_eq!(idx.succ(4), Some(9));
    idx.unset(4);
    assert_eq!(idx.min_idx(), Some(9));
    assert_eq!(idx.count(), 1);
}

#[test]
fn test_odd_width() {
    // 32 slots: group width rounds up, counters must still cover all slots.
    let mut idx = SqrtBitIndex::new(5);
    idx.set(0);
    idx.set(31);
    assert_eq!(idx.succ(0), Some(31));
    assert_eq!(idx.pred(31), Some(0));
}

#[test]
fn test_rebuild() {
    let mut idx = SqrtBitIndex::new(4);
    idx.set(2);
    idx.rebuild(&|i| i == 7 || i == 9);
    assert_eq!(idx.count(), 2);
    assert_eq!(idx.min_idx(), Some(7));
    assert_eq!(idx.max_idx(), Some(9));
    assert_eq!(idx.pred(9), Some(7));
    assert_eq!(idx.succ(2), Some(7));
}

/// xorshift64 step; deterministic stand-in for an external random source.
fn next_rand(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

#[test]
fn test_matches_heap_index_under_random_ops() {
    let bits = 6;
    let slots = 1u32 << bits;
    let mut heap = HeapBitIndex::new(bits);
    let mut sqrt = SqrtBitIndex::new(bits);
    let mut state = 0x9E37_79B9_7F4A_7C15u64;

    for _ in 0..4000 {
        let r = next_rand(&mut state);
        let idx = (r % slots as u64) as u32;
        if r & 0x100 == 0 {
            heap.set(idx);
            sqrt.set(idx);
        } else {
            heap.unset(idx);
            sqrt.unset(idx);
        }

        assert_eq!(heap.count(), sqrt.count());
        assert_eq!(heap.min_idx(), sqrt.min_idx());
        assert_eq!(heap.max_idx(), sqrt.max_idx());

        let probe = ((r >> 32) % slots as u64) as u32;
        assert_eq!(heap.pred(probe), sqrt.pred(probe));
        assert_eq!(heap.succ(probe), sqrt.succ(probe));
    }
}
