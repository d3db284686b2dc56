//! Binary layout of serialized nodes.
//!
//! Non-leaf node:
//!
//! ```text
//! header: u8            bit 7 = 0
//!                       bits 4-6 = encoded output fp bytes - 1
//!                       bit 3 = has output
//!                       bits 0-2 = children fp bytes - 1
//! count: u16 (LE)       children_count << 3 | prefix length bytes (0..=4)
//! prefix_len: [u8; n]   only if prefix length bytes > 0
//! prefix: [u8; len]
//! child index           Node4/Node16: children_count sorted key bytes
//!                       Node48: 256-byte table, 0xFF = empty, else slot
//!                       Node256: 4 x u64 (LE) membership bitmap
//! deltas: [uN; count]   parent fp - child fp, one per slot
//! output: uM            target_offset << 2 | has_terms << 1 | has_floor_data
//! floor data            raw bytes, only if has_floor_data
//! ```
//!
//! Leaf node:
//!
//! ```text
//! header: u8            bit 7 = 1, bit 6 = 0
//!                       bit 5 = has key, bit 4 = has floor data, bit 3 = has terms
//!                       bits 0-2 = target offset bytes - 1
//! key_len: varint       only if has key
//! key: [u8; key_len]
//! target_offset: uM
//! floor data            raw bytes, only if has floor data
//! ```
//!
//! Nodes are saved children first, so every delta is positive.

pub(crate) mod decode;
pub(crate) mod encode;

pub(crate) const LEAF_NODE: u8 = 1 << 7;
pub(crate) const LEAF_NODE_RESERVED: u8 = 1 << 6;
pub(crate) const LEAF_NODE_HAS_KEY: u8 = 1 << 5;
pub(crate) const LEAF_NODE_HAS_FLOOR: u8 = 1 << 4;
pub(crate) const LEAF_NODE_HAS_TERMS: u8 = 1 << 3;
pub(crate) const NON_LEAF_NODE_HAS_OUTPUT: u8 = 1 << 3;

/// Low three header bits: a byte width minus one.
pub(crate) const WIDTH_BITS: u8 = 0x07;

pub(crate) const MAX_PREFIX_LENGTH_BYTES: usize = 4;
pub(crate) const MAX_CHILDREN: usize = 256;
pub(crate) const NODE256_BITMAP_WORDS: usize = 4;
