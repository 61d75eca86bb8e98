// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Sqrt-bucketed occupancy index.
//!
//! The slot bitmap plus one counter per group of 2^group_bits slots, where
//! group_bits is half the index width (rounded up). Pred/succ scan the local
//! group linearly and hop over empty groups using the counters.

use crate::bitindex::BitIndex;

/// Sqrt-bucketed realisation of `BitIndex`.
#[derive(Debug)]
pub struct SqrtBitIndex {
    bits: Vec<bool>,
    counters: Vec<u16>,
    group_bits: u32,
    count: u32,
    min: Option<u32>,
    max: Option<u32>,
}

impl SqrtBitIndex {
    #[inline]
    fn group_of(&self, idx: u32) -> usize {
        (idx >> self.group_bits) as usize
    }

    #[inline]
    fn group_start(&self, group: usize) -> u32 {
        (group as u32) << self.group_bits
    }

    #[inline]
    fn group_len(&self) -> u32 {
        1u32 << self.group_bits
    }
}

impl BitIndex for SqrtBitIndex {
    fn new(bits: u32) -> Self {
        let num_slots = 1u32 << bits;
        let group_bits = bits.div_ceil(2);
        let num_groups = 1usize << (bits - group_bits);
        Self {
            bits: vec![false; num_slots as usize],
            counters: vec![0; num_groups],
            group_bits,
            count: 0,
            min: None,
            max: None,
        }
    }

    fn set(&mut self, idx: u32) {
        if self.bits[idx as usize] {
            return;
        }
        self.bits[idx as usize] = true;
        let g = self.group_of(idx);
        self.counters[g] += 1;
        self.count += 1;
        if self.min.map_or(true, |m| idx < m) {
            self.min = Some(idx);
        }
        if self.max.map_or(true, |m| idx > m) {
            self.max = Some(idx);
        }
    }

    fn unset(&mut self, idx: u32) {
        if !self.bits[idx as usize] {
            return;
        }
        self.bits[idx as usize] = false;
        let g = self.group_of(idx);
        self.counters[g] -= 1;
        self.count -= 1;
        if self.count == 0 {
            self.min = None;
            self.max = None;
            return;
        }
        if self.min == Some(idx) {
            self.min = self.succ(idx);
        }
        if self.max == Some(idx) {
            self.max = self.pred(idx);
        }
    }

    fn min_idx(&self) -> Option<u32> {
        self.min
    }

    fn max_idx(&self) -> Option<u32> {
        self.max
    }

    fn count(&self) -> u32 {
        self.count
    }

    fn pred(&self, idx: u32) -> Option<u32> {
        let g = self.group_of(idx);
        // Scan the rest of the local group downward.
        if self.counters[g] > 0 {
            let start = self.group_start(g);
            for j in (start..idx).rev() {
                if self.bits[j as usize] {
                    return Some(j);
                }
            }
        }
        // Skip empty groups, then scan the first non-empty one from its top.
        for pg in (0..g).rev() {
            if self.counters[pg] == 0 {
                continue;
            }
            let start = self.group_start(pg);
            for j in (start..start + self.group_len()).rev() {
                if self.bits[j as usize] {
                    return Some(j);
                }
            }
        }
        None
    }

    fn succ(&self, idx: u32) -> Option<u32> {
        let g = self.group_of(idx);
        if self.counters[g] > 0 {
            let end = self.group_start(g) + self.group_len();
            for j in idx + 1..end {
                if self.bits[j as usize] {
                    return Some(j);
                }
            }
        }
        for ng in g + 1..self.counters.len() {
            if self.counters[ng] == 0 {
                continue;
            }
            let start = self.group_start(ng);
            for j in start..start + self.group_len() {
                if self.bits[j as usize] {
                    return Some(j);
                }
            }
        }
        None
    }

    fn rebuild(&mut self, occupied: &dyn Fn(u32) -> bool) {
        self.count = 0;
        self.min = None;
        self.max = None;
        self.counters.iter_mut().for_each(|c| *c = 0);
        for i in 0..self.bits.len() as u32 {
            let set = occupied(i);
            self.bits[i as usize] = set;
            if set {
                let g = self.group_of(i);
                self.counters[g] += 1;
                self.count += 1;
                if self.min.is_none() {
                    self.min = Some(i);
                }
                self.max = Some(i);
            }
        }
    }

    fn footprint(&self) -> usize {
        self.bits.capacity() * std::mem::size_of::<bool>()
            + self.counters.capacity() * std::mem::size_of::<u16>()
    }
}
