// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Bit-field extraction over fixed-width integer keys.
//!
//! Trie descent consumes a key from the most significant bit downward, a few
//! bits at a time. `KeyBits` provides the digit extraction and aligned-prefix
//! comparison the trie engines are built on, implemented for `u32` and `u64`.

use std::fmt::Debug;
use std::ops::{BitAnd, BitOr, Shl, Shr};

/// Fixed-width unsigned integer key.
///
/// ## Implementations
/// - `u32`: 32-bit keys
/// - `u64`: 64-bit keys
///
/// All operations are pure bit arithmetic with no failure modes.
pub trait KeyBits:
    Copy
    + Ord
    + Default
    + Debug
    + Shl<u32, Output = Self>
    + Shr<u32, Output = Self>
    + BitOr<Output = Self>
    + BitAnd<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// Width of the key in bits.
    const NUM_BITS: u32;

    /// Extract `len` bits starting `shift` bits above the least significant
    /// bit: `(key >> shift) & ((1 << len) - 1)`.
    fn extract(self, shift: u32, len: u32) -> Self;

    /// Mask to the low `len` bits.
    fn low_bits(self, len: u32) -> Self;

    /// Interpret an extracted digit as a slot index.
    fn to_index(self) -> usize;

    /// Lift a slot index back into the key domain.
    fn from_index(idx: usize) -> Self;

    /// Length of the longest common aligned prefix of `k1` and `k2`, in
    /// multiples of `chunk` bits, after ignoring the `skip` most significant
    /// bits. The result is always a multiple of `chunk`.
    ///
    /// ## Example
    /// For `skip = 16`, `chunk = 8`, `k1 = 0xFFAA_BBCC`, `k2 = 0xFFAA_BBDD`
    /// the answer is 8: the `FFAA` is ignored, the `BB`s match, and the
    /// final bytes differ.
    fn match_len(skip: u32, chunk: u32, k1: Self, k2: Self) -> u32 {
        let mut len = 0;
        let mut shift = Self::NUM_BITS as i64 - chunk as i64 - skip as i64;
        while shift >= 0 && k1.extract(shift as u32, chunk) == k2.extract(shift as u32, chunk) {
            len += chunk;
            shift -= chunk as i64;
        }
        len
    }
}

macro_rules! impl_key_bits {
    ($t:ty) => {
        impl KeyBits for $t {
            const NUM_BITS: u32 = <$t>::BITS;

            #[inline]
            fn extract(self, shift: u32, len: u32) -> Self {
                if len == 0 {
                    return 0;
                }
                let mask = if len >= Self::NUM_BITS {
                    <$t>::MAX
                } else {
                    ((1 as $t) << len) - 1
                };
                (self >> shift) & mask
            }

            #[inline]
            fn low_bits(self, len: u32) -> Self {
                if len == 0 {
                    return 0;
                }
                if len >= Self::NUM_BITS {
                    return self;
                }
                self & (((1 as $t) << len) - 1)
            }

            #[inline]
            fn to_index(self) -> usize {
                self as usize
            }

            #[inline]
            fn from_index(idx: usize) -> Self {
                idx as $t
            }
        }
    };
}

impl_key_bits!(u32);
impl_key_bits!(u64);
