// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for sorted buckets and the bucket store.

use crate::bucket::{BucketStore, InsertOutcome, INITIAL_BUCKET_CAPACITY};
use crate::memory::MemTracker;

fn store(max: usize) -> BucketStore<u32, u32> {
    BucketStore::new(max, MemTracker::disabled())
}

#[test]
fn test_insert_keeps_sorted_order() {
    let mut s = store(16);
    let b = s.create_seeded(50, 500);
    assert_eq!(s.insert(b, 20, 200), InsertOutcome::Created);
    assert_eq!(s.insert(b, 80, 800), InsertOutcome::Created);
    assert_eq!(s.insert(b, 35, 350), InsertOutcome::Created);
    assert_eq!(s.get(b).keys, vec![20, 35, 50, 80]);
    assert_eq!(s.get(b).values, vec![200, 350, 500, 800]);
}

#[test]
fn test_insert_updates_existing() {
    let mut s = store(16);
    let b = s.create_seeded(7, 70);
    assert_eq!(s.insert(b, 7, 71), InsertOutcome::Updated);
    assert_eq!(s.get(b).len(), 1);
    assert_eq!(s.get(b).search(&7), Some(&71));
}

#[test]
fn test_filled_and_failed() {
    let mut s = store(4);
    let b = s.create_seeded(1, 1);
    assert_eq!(s.insert(b, 2, 2), InsertOutcome::Created);
    assert_eq!(s.insert(b, 3, 3), InsertOutcome::Created);
    // Fourth element reaches maximum capacity.
    assert_eq!(s.insert(b, 4, 4), InsertOutcome::Filled);
    assert_eq!(s.insert(b, 5, 5), InsertOutcome::Failed);
    assert_eq!(s.get(b).len(), 4);
    // Updates still work on a full bucket.
    assert_eq!(s.insert(b, 3, 33), InsertOutcome::Updated);
}

#[test]
fn test_capacity_growth_and_shrink() {
    let mut s = store(128);
    let b = s.create_seeded(0, 0);
    assert_eq!(s.get(b).capacity, INITIAL_BUCKET_CAPACITY);
    for i in 1..9u32 {
        s.insert(b, i, i);
    }
    assert_eq!(s.get(b).capacity, 16);

    for i in (3..9u32).rev() {
        s.remove(b, i);
    }
    // 3 elements in a capacity-16 bucket has shrunk at least once.
    assert!(s.get(b).capacity <= 8);
    assert_eq!(s.get(b).keys, vec![0, 1, 2]);
}

#[test]
fn test_remove_returns_value() {
    let mut s = store(16);
    let b = s.create_seeded(10, 100);
    s.insert(b, 20, 200);
    assert_eq!(s.remove(b, 10), Some(100));
    assert_eq!(s.remove(b, 10), None);
    assert_eq!(s.get(b).keys, vec![20]);
}

#[test]
fn test_search_linear_and_binary() {
    let mut s = store(64);
    let b = s.create_seeded(0, 0);
    // Stay below the binary-search cutoff first.
    for i in 1..5u32 {
        s.insert(b, i * 3, i);
    }
    assert_eq!(s.get(b).search(&6), Some(&2));
    assert_eq!(s.get(b).search(&7), None);

    // Push past the cutoff.
    for i in 5..20u32 {
        s.insert(b, i * 3, i);
    }
    assert!(s.get(b).len() >= 10);
    assert_eq!(s.get(b).search(&57), Some(&19));
    assert_eq!(s.get(b).search(&58), None);
}

#[test]
fn test_locate_within_bucket() {
    let mut s = store(16);
    let b = s.create_seeded(10, 100);
    s.insert(b, 20, 200);
    s.insert(b, 30, 300);
    assert_eq!(s.get(b).locate(&25), Some(&200));
    assert_eq!(s.get(b).locate(&30), Some(&300));
    assert_eq!(s.get(b).locate(&9), None);
    assert_eq!(s.get(b).locate(&99), Some(&300));
}

#[test]
fn test_all_bits_match() {
    let mut s = store(16);
    let b = s.create_seeded(0x1234_5678, 1);
    s.insert(b, 0x1234_5FFF, 2);
    assert!(s.get(b).all_bits_match(0x2, 24, 4));
    assert!(s.get(b).all_bits_match(0x1234_5, 12, 20));
    assert!(!s.get(b).all_bits_match(0x6, 8, 4));
}

#[test]
fn test_split_moves_upper_half() {
    let mut s = store(8);
    let b = s.create_seeded(1, 10);
    for i in 2..9u32 {
        s.insert(b, i, i * 10);
    }
    assert_eq!(s.get(b).len(), 8);
    let upper = s.split(b);
    assert_eq!(s.get(b).keys, vec![1, 2, 3, 4]);
    assert_eq!(s.get(upper).keys, vec![5, 6, 7, 8]);
    assert_eq!(s.get(upper).values, vec![50, 60, 70, 80]);
    assert_eq!(s.get(upper).rep, Some(5));
}

#[test]
fn test_chain_link_and_unlink() {
    let mut s = store(16);
    let a = s.create_seeded(1, 1);
    let c = s.create_seeded(9, 9);
    s.link_after(a, c);
    let b = s.create_seeded(5, 5);
    s.link_after(a, b);

    assert_eq!(s.get(a).next, Some(b));
    assert_eq!(s.get(b).prev, Some(a));
    assert_eq!(s.get(b).next, Some(c));
    assert_eq!(s.get(c).prev, Some(b));

    s.unlink(b);
    assert_eq!(s.get(a).next, Some(c));
    assert_eq!(s.get(c).prev, Some(a));
}

#[test]
fn test_memory_accounting_round_trip() {
    let tracker = MemTracker::enabled();
    {
        let mut s: BucketStore<u32, u32> = BucketStore::new(128, tracker.clone());
        let b = s.create_seeded(1, 1);
        for i in 2..40u32 {
            s.insert(b, i, i);
        }
        let _c = s.create_seeded(1000, 1);
        assert!(tracker.used() > 0);
        assert!(tracker.peak() >= tracker.used());
        s.free(b);
        assert!(tracker.used() > 0);
    }
    assert_eq!(tracker.used(), 0);
}
