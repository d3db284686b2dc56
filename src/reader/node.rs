//! Nodes as decoded from a store.
//!
//! A decoded node holds everything needed to pick a child (prefix, child
//! index, where its delta array starts) but no children. Children are
//! loaded one at a time by the reader.

use smallvec::SmallVec;

use crate::art::{NodeType, NODE48_EMPTY};
use crate::codec::NODE256_BITMAP_WORDS;
use crate::encoding::common_prefix_len;
use crate::output::NodeOutput;

pub(crate) type InlineBytes = SmallVec<[u8; 16]>;

/// A node decoded from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) fp: u64,
    pub(crate) kind: NodeKind,
    pub(crate) output: Option<NodeOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Leaf { key: Option<InlineBytes> },
    Inner(Inner),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Inner {
    pub(crate) prefix: InlineBytes,
    pub(crate) children_count: u16,
    /// Width of each child delta, 1..=8.
    pub(crate) children_fp_bytes: u8,
    /// Absolute offset of the first child delta.
    pub(crate) children_delta_fp_start: u64,
    pub(crate) index: ChildIndex,
}

/// Variant-specific mapping from key bytes to child slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChildIndex {
    /// Sorted key bytes; only the first `children_count` are meaningful.
    Node4([u8; 4]),
    Node16([u8; 16]),
    /// Byte to slot table.
    Node48(Box<[u8; 256]>),
    /// Membership bitmap, bit `b & 63` of word `b >> 6`.
    Node256([u64; NODE256_BITMAP_WORDS]),
}

impl Node {
    /// Offset this node was loaded from.
    pub fn fp(&self) -> u64 {
        self.fp
    }

    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            NodeKind::Leaf { .. } => NodeType::Leaf,
            NodeKind::Inner(inner) => match inner.index {
                ChildIndex::Node4(_) => NodeType::Node4,
                ChildIndex::Node16(_) => NodeType::Node16,
                ChildIndex::Node48(_) => NodeType::Node48,
                ChildIndex::Node256(_) => NodeType::Node256,
            },
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Compressed path bytes of a non-leaf node. Empty for leaves.
    pub fn prefix(&self) -> &[u8] {
        match &self.kind {
            NodeKind::Leaf { .. } => &[],
            NodeKind::Inner(inner) => &inner.prefix,
        }
    }

    /// Remaining key bytes of a leaf. `None` for non-leaf nodes and for
    /// leaves that defer to an external block.
    pub fn key(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::Leaf { key } => key.as_deref(),
            NodeKind::Inner(_) => None,
        }
    }

    /// True for a leaf without a key, whose suffixes live in an external block.
    pub fn is_block_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { key: None })
    }

    pub fn children_count(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf { .. } => 0,
            NodeKind::Inner(inner) => inner.children_count as usize,
        }
    }

    pub fn output(&self) -> Option<NodeOutput> {
        self.output
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Offset of this node's floor data, if its output has any.
    pub fn floor_data_fp(&self) -> Option<u64> {
        self.output.and_then(|o| o.floor_data_fp)
    }

    pub(crate) fn inner(&self) -> Option<&Inner> {
        match &self.kind {
            NodeKind::Leaf { .. } => None,
            NodeKind::Inner(inner) => Some(inner),
        }
    }

    /// How many bytes of `target` this node's own prefix or key consumes,
    /// or `None` if they diverge.
    ///
    /// A keyless leaf matches without consuming anything.
    pub(crate) fn match_len(&self, target: &[u8]) -> Option<usize> {
        let expected: &[u8] = match &self.kind {
            NodeKind::Leaf { key: None } => return Some(0),
            NodeKind::Leaf { key: Some(key) } => key,
            NodeKind::Inner(inner) => &inner.prefix,
        };
        (common_prefix_len(target, expected) == expected.len()).then_some(expected.len())
    }
}

impl Inner {
    /// Position of the child for `index_byte`, if present.
    ///
    /// Node4/Node16 positions index the sorted key array; Node48/Node256
    /// positions are the key byte itself.
    pub(crate) fn child_pos(&self, index_byte: u8) -> Option<usize> {
        let count = self.children_count as usize;
        match &self.index {
            ChildIndex::Node4(keys) => keys[..count].iter().position(|&k| k == index_byte),
            ChildIndex::Node16(keys) => keys[..count].binary_search(&index_byte).ok(),
            ChildIndex::Node48(slots) => {
                (slots[index_byte as usize] != NODE48_EMPTY).then_some(index_byte as usize)
            }
            ChildIndex::Node256(bitmap) => {
                bitmap_contains(bitmap, index_byte).then_some(index_byte as usize)
            }
        }
    }

    /// Key byte at a position returned by [`child_pos`](Self::child_pos).
    pub(crate) fn index_byte_at(&self, pos: usize) -> u8 {
        match &self.index {
            ChildIndex::Node4(keys) => keys[pos],
            ChildIndex::Node16(keys) => keys[pos],
            ChildIndex::Node48(_) | ChildIndex::Node256(_) => pos as u8,
        }
    }

    /// Next populated position after `pos` (or the first for `None`), in
    /// ascending key-byte order.
    pub(crate) fn next_larger_pos(&self, pos: Option<usize>) -> Option<usize> {
        let start = pos.map_or(0, |p| p + 1);
        match &self.index {
            ChildIndex::Node4(_) | ChildIndex::Node16(_) => {
                (start < self.children_count as usize).then_some(start)
            }
            ChildIndex::Node48(slots) => (start..256).find(|&b| slots[b] != NODE48_EMPTY),
            ChildIndex::Node256(bitmap) => {
                (start..256).find(|&b| bitmap_contains(bitmap, b as u8))
            }
        }
    }

    /// Index into the delta array for the child at `pos`.
    ///
    /// Node48 goes through its table; Node256 skips absent bytes, so the
    /// slot is the number of populated bytes below `pos`.
    pub(crate) fn delta_slot(&self, pos: usize) -> usize {
        match &self.index {
            ChildIndex::Node4(_) | ChildIndex::Node16(_) => pos,
            ChildIndex::Node48(slots) => slots[pos] as usize,
            ChildIndex::Node256(bitmap) => bitmap_rank(bitmap, pos as u8),
        }
    }

    /// Absolute offset of the delta for the child at `pos`.
    pub(crate) fn delta_fp(&self, pos: usize) -> u64 {
        let slot = self.delta_slot(pos) * self.children_fp_bytes as usize;
        self.children_delta_fp_start + slot as u64
    }
}

#[inline]
fn bitmap_contains(bitmap: &[u64; NODE256_BITMAP_WORDS], b: u8) -> bool {
    bitmap[(b >> 6) as usize] & (1u64 << (b & 63)) != 0
}

/// Number of set bits strictly below `b`.
#[inline]
fn bitmap_rank(bitmap: &[u64; NODE256_BITMAP_WORDS], b: u8) -> usize {
    let word = (b >> 6) as usize;
    let below: u32 = bitmap[..word].iter().map(|w| w.count_ones()).sum();
    let partial = bitmap[word] & ((1u64 << (b & 63)) - 1);
    (below + partial.count_ones()) as usize
}
