// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! ReedMap - in-memory ordered index engines for fixed-width integer keys.
//!
//! A library of ordered-dictionary structures tuned for 32/64-bit integer
//! keys, all answering the same operation set: insert, exact search, remove,
//! and locate (greatest stored key less than or equal to a query).
//!
//! ## Engines
//!
//! - **BurstTrie**: a level- and path-compressed burst trie. Keys live in
//!   small sorted buckets at the leaves; a full bucket bursts into a subtrie,
//!   and trie nodes widen or narrow their fan-out as they fill and drain.
//!   Buckets are chained in key order, so predecessor queries finish with a
//!   single list step.
//! - **BTree**: a classical in-memory B-tree with node capacity derived from
//!   the element size, split on overflow and rotation/merging on underflow.
//! - **SplitTrie**: buckets chained in key order and indexed by their
//!   smallest key in a level- and path-compressed trie; a full bucket splits
//!   in half instead of bursting.
//!
//! ## Quick Start
//!
//! ```rust
//! use reedmap::btrie::BurstTrie;
//!
//! let mut trie = BurstTrie::<u32, u64>::new();
//! trie.insert(42, 4200);
//! trie.insert(7, 700);
//!
//! assert_eq!(trie.search(42), Some(&4200));
//! assert_eq!(trie.locate(41), Some(&700)); // greatest key <= 41
//! ```
//!
//! ## Architecture
//!
//! ReedMap is organized into modules:
//!
//! - **keys**: bit-field extraction over fixed-width integer keys
//! - **bitindex**: in-node occupancy indices (OR-heap and sqrt-bucket)
//! - **btrie**: the burst-trie engine
//! - **btree**: the B-tree engine
//! - **strie**: the split-trie engine
//! - **index**: the common `OrderedIndex` trait
//! - **memory**: opt-in allocation accounting
//! - **stats**: per-engine statistics snapshots

pub mod bitindex;
pub mod btree;
pub mod btrie;
pub mod config;
pub mod error;
pub mod index;
pub mod keys;
pub mod memory;
pub mod stats;
pub mod strie;

mod arena;
mod bucket;
mod trie;

// Re-export commonly used types
pub use bitindex::{BitIndex, HeapBitIndex, SqrtBitIndex};
pub use btree::BTree;
pub use btrie::BurstTrie;
pub use config::TrieConfig;
pub use error::{MapError, MapResult};
pub use index::OrderedIndex;
pub use keys::KeyBits;
pub use memory::MemTracker;
pub use stats::IndexStats;
pub use strie::SplitTrie;
