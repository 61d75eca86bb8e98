// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Trie engine configuration.
//!
//! Validated construction parameters for the trie-based engines, in the
//! spirit of a B-tree order value: invalid combinations are refused at
//! construction time and never checked again on the hot path.

use crate::error::{MapError, MapResult};
use serde::{Deserialize, Serialize};

/// Smallest accepted bucket capacity.
pub const MIN_BUCKET_CAPACITY: usize = 4;

/// Largest accepted bucket capacity.
pub const MAX_BUCKET_CAPACITY: usize = 4096;

/// Largest accepted per-node fan-out in bits.
pub const MAX_CHILDREN_BITS: u32 = 24;

/// Construction parameters for `BurstTrie` and `SplitTrie`.
///
/// ## Fields
/// - `min_children_bits`: fan-out (in bits) of freshly created nodes; also
///   the step by which fan-out grows and shrinks
/// - `max_children_bits`: ceiling on node fan-out
/// - `expand_threshold`: fraction of slots that must hold prefix-free
///   internal children before a node widens
/// - `contract_threshold`: occupancy fraction below which a node narrows
/// - `max_bucket_capacity`: bucket size that triggers a burst or split
///
/// ## Example
/// ```rust
/// use reedmap::config::TrieConfig;
///
/// let config = TrieConfig::new(4, 24, 0.75, 0.25, 128)?;
/// assert_eq!(config, TrieConfig::default());
/// # Ok::<(), reedmap::MapError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrieConfig {
    pub min_children_bits: u32,
    pub max_children_bits: u32,
    pub expand_threshold: f64,
    pub contract_threshold: f64,
    pub max_bucket_capacity: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            min_children_bits: 4,
            max_children_bits: 24,
            expand_threshold: 0.75,
            contract_threshold: 0.25,
            max_bucket_capacity: 128,
        }
    }
}

impl TrieConfig {
    /// Create a configuration with validation.
    ///
    /// ## Error Conditions
    /// - `InvalidChildrenBits`: `min` is zero, `min > max`, or `max`
    ///   exceeds `MAX_CHILDREN_BITS`
    /// - `InvalidThreshold`: a threshold outside the open interval (0, 1)
    /// - `InvalidBucketCapacity`: capacity outside the supported range
    pub fn new(
        min_children_bits: u32,
        max_children_bits: u32,
        expand_threshold: f64,
        contract_threshold: f64,
        max_bucket_capacity: usize,
    ) -> MapResult<Self> {
        if min_children_bits == 0
            || min_children_bits > max_children_bits
            || max_children_bits > MAX_CHILDREN_BITS
        {
            return Err(MapError::InvalidChildrenBits {
                min: min_children_bits,
                max: max_children_bits,
            });
        }
        if !(expand_threshold > 0.0 && expand_threshold < 1.0) {
            return Err(MapError::InvalidThreshold {
                name: "expand".to_string(),
                value: expand_threshold,
            });
        }
        if !(contract_threshold > 0.0 && contract_threshold < 1.0) {
            return Err(MapError::InvalidThreshold {
                name: "contract".to_string(),
                value: contract_threshold,
            });
        }
        if !(MIN_BUCKET_CAPACITY..=MAX_BUCKET_CAPACITY).contains(&max_bucket_capacity) {
            return Err(MapError::InvalidBucketCapacity {
                capacity: max_bucket_capacity,
                min: MIN_BUCKET_CAPACITY,
                max: MAX_BUCKET_CAPACITY,
            });
        }
        Ok(Self {
            min_children_bits,
            max_children_bits,
            expand_threshold,
            contract_threshold,
            max_bucket_capacity,
        })
    }

    /// Default configuration for `SplitTrie`, which caps fan-out lower than
    /// the burst trie.
    pub fn split_trie_default() -> Self {
        Self {
            max_children_bits: 20,
            ..Self::default()
        }
    }
}
