// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Arena of buckets with capacity management and allocation accounting.

use crate::arena::Pool;
use crate::bucket::{
    Bucket, BucketId, InsertOutcome, GROWTH_FACTOR, INITIAL_BUCKET_CAPACITY,
};
use crate::keys::KeyBits;
use crate::memory::MemTracker;

/// Bucket arena.
///
/// All capacity transitions go through the store so the tracker observes
/// every growth and shrink, and teardown releases exactly what was charged.
#[derive(Debug)]
pub(crate) struct BucketStore<K, V> {
    pool: Pool<Bucket<K, V>>,
    max_capacity: usize,
    tracker: MemTracker,
}

impl<K: KeyBits, V> BucketStore<K, V> {
    pub fn new(max_capacity: usize, tracker: MemTracker) -> Self {
        Self {
            pool: Pool::new(),
            max_capacity,
            tracker,
        }
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn num_buckets(&self) -> usize {
        self.pool.len()
    }

    pub fn get(&self, id: BucketId) -> &Bucket<K, V> {
        self.pool.get(id.0)
    }

    pub fn get_mut(&mut self, id: BucketId) -> &mut Bucket<K, V> {
        self.pool.get_mut(id.0)
    }

    fn payload_bytes(capacity: usize) -> usize {
        capacity * (std::mem::size_of::<K>() + std::mem::size_of::<V>())
    }

    fn bucket_footprint(capacity: usize) -> usize {
        std::mem::size_of::<Bucket<K, V>>() + Self::payload_bytes(capacity)
    }

    /// Total accounted bytes of all live buckets.
    pub fn footprint(&self) -> usize {
        self.pool
            .iter()
            .map(|b| Self::bucket_footprint(b.capacity))
            .sum()
    }

    /// Create an unlinked bucket holding a single pair.
    pub fn create_seeded(&mut self, key: K, value: V) -> BucketId {
        let mut bucket = self.empty_bucket();
        bucket.keys.push(key);
        bucket.values.push(value);
        self.tracker
            .on_alloc(Self::bucket_footprint(INITIAL_BUCKET_CAPACITY));
        BucketId(self.pool.alloc(bucket))
    }

    /// Create an unlinked empty bucket.
    pub fn create_empty(&mut self) -> BucketId {
        let bucket = self.empty_bucket();
        self.tracker
            .on_alloc(Self::bucket_footprint(INITIAL_BUCKET_CAPACITY));
        BucketId(self.pool.alloc(bucket))
    }

    fn empty_bucket(&self) -> Bucket<K, V> {
        Bucket {
            keys: Vec::with_capacity(INITIAL_BUCKET_CAPACITY),
            values: Vec::with_capacity(INITIAL_BUCKET_CAPACITY),
            capacity: INITIAL_BUCKET_CAPACITY,
            prev: None,
            next: None,
            rep: None,
        }
    }

    /// Release a bucket. The caller must already have unlinked it.
    pub fn free(&mut self, id: BucketId) {
        let bucket = self.pool.free(id.0);
        self.tracker
            .on_free(Self::bucket_footprint(bucket.capacity));
    }

    /// Sorted insert-or-update.
    pub fn insert(&mut self, id: BucketId, key: K, value: V) -> InsertOutcome {
        let max = self.max_capacity;
        let len = self.get(id).len();
        let pos = self.get(id).keys.partition_point(|k| *k < key);
        if pos < len && self.get(id).keys[pos] == key {
            self.get_mut(id).values[pos] = value;
            return InsertOutcome::Updated;
        }
        if len == max {
            return InsertOutcome::Failed;
        }
        self.grow_if_full(id);
        let bucket = self.get_mut(id);
        bucket.keys.insert(pos, key);
        bucket.values.insert(pos, value);
        if len == max - 1 {
            InsertOutcome::Filled
        } else {
            InsertOutcome::Created
        }
    }

    /// Append a pair known to be greater than every stored key.
    pub fn push_max(&mut self, id: BucketId, key: K, value: V) {
        self.grow_if_full(id);
        let bucket = self.get_mut(id);
        bucket.keys.push(key);
        bucket.values.push(value);
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, id: BucketId, key: K) -> Option<V> {
        let pos = self.get(id).keys.partition_point(|k| *k < key);
        if pos >= self.get(id).len() || self.get(id).keys[pos] != key {
            return None;
        }
        let value = {
            let bucket = self.get_mut(id);
            bucket.keys.remove(pos);
            bucket.values.remove(pos)
        };
        self.shrink_if_sparse(id);
        Some(value)
    }

    /// Split a full bucket, moving its upper half into a new unlinked
    /// bucket. The new bucket remembers its smallest key as `rep`.
    pub fn split(&mut self, id: BucketId) -> BucketId {
        let half = self.get(id).len() / 2;
        let (upper_keys, upper_values) = {
            let bucket = self.get_mut(id);
            (bucket.keys.split_off(half), bucket.values.split_off(half))
        };
        let capacity = upper_keys.len().max(INITIAL_BUCKET_CAPACITY);
        self.tracker.on_alloc(Self::bucket_footprint(capacity));
        let rep = upper_keys[0];
        BucketId(self.pool.alloc(Bucket {
            keys: upper_keys,
            values: upper_values,
            capacity,
            prev: None,
            next: None,
            rep: Some(rep),
        }))
    }

    /// Move the contents and chain links out of a bucket about to burst.
    pub fn take_contents(
        &mut self,
        id: BucketId,
    ) -> (Vec<K>, Vec<V>, Option<BucketId>, Option<BucketId>) {
        let bucket = self.get_mut(id);
        (
            std::mem::take(&mut bucket.keys),
            std::mem::take(&mut bucket.values),
            bucket.prev.take(),
            bucket.next.take(),
        )
    }

    /// Splice `b` into the chain directly after `a`.
    pub fn link_after(&mut self, a: BucketId, b: BucketId) {
        let a_next = self.get(a).next;
        self.get_mut(b).prev = Some(a);
        self.get_mut(b).next = a_next;
        if let Some(n) = a_next {
            self.get_mut(n).prev = Some(b);
        }
        self.get_mut(a).next = Some(b);
    }

    /// Remove `id` from the chain, reconnecting its neighbours.
    pub fn unlink(&mut self, id: BucketId) {
        let (prev, next) = {
            let bucket = self.get_mut(id);
            (bucket.prev.take(), bucket.next.take())
        };
        if let Some(p) = prev {
            self.get_mut(p).next = next;
        }
        if let Some(n) = next {
            self.get_mut(n).prev = prev;
        }
    }

    fn grow_if_full(&mut self, id: BucketId) {
        let (len, capacity) = {
            let b = self.get(id);
            (b.len(), b.capacity)
        };
        if len < capacity {
            return;
        }
        let new_capacity = (capacity * GROWTH_FACTOR).min(self.max_capacity);
        if new_capacity == capacity {
            return;
        }
        self.tracker.on_free(Self::payload_bytes(capacity));
        self.tracker.on_alloc(Self::payload_bytes(new_capacity));
        let bucket = self.get_mut(id);
        bucket.capacity = new_capacity;
        bucket.keys.reserve_exact(new_capacity - len);
        bucket.values.reserve_exact(new_capacity - len);
    }

    fn shrink_if_sparse(&mut self, id: BucketId) {
        let (len, capacity) = {
            let b = self.get(id);
            (b.len(), b.capacity)
        };
        if len > capacity / GROWTH_FACTOR || capacity <= INITIAL_BUCKET_CAPACITY {
            return;
        }
        let new_capacity = capacity / GROWTH_FACTOR;
        self.tracker.on_free(Self::payload_bytes(capacity));
        self.tracker.on_alloc(Self::payload_bytes(new_capacity));
        let bucket = self.get_mut(id);
        bucket.capacity = new_capacity;
        bucket.keys.shrink_to(new_capacity);
        bucket.values.shrink_to(new_capacity);
    }
}

impl<K, V> Drop for BucketStore<K, V> {
    fn drop(&mut self) {
        let header = std::mem::size_of::<Bucket<K, V>>();
        let pair = std::mem::size_of::<K>() + std::mem::size_of::<V>();
        for bucket in self.pool.iter() {
            self.tracker.on_free(header + bucket.capacity * pair);
        }
    }
}
