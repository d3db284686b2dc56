//! In-memory Adaptive Radix Tree builder.
//!
//! Based on "The Adaptive Radix Tree: ARTful Indexing for Main-Memory Databases"
//! by Leis et al., 2013.
//!
//! The builder collects keys (or block prefixes) with their outputs, then
//! [`save`](ArtBuilder::save)s the whole tree once, children before parents.
//! There is no delete: a saved tree is immutable and a new one is built
//! for every segment.

mod node;

use tracing::debug;

use crate::codec::encode::{encode_inner, encode_leaf};
use crate::encoding::common_prefix_len;
use crate::output::Output;
use crate::store::DataOutput;
use crate::{Error, Result};

pub(crate) use node::NODE48_EMPTY;
pub use node::{NodeType, TrieNode};

/// Number of nodes of each type in a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCounts {
    pub leaf: usize,
    pub node4: usize,
    pub node16: usize,
    pub node48: usize,
    pub node256: usize,
}

impl NodeCounts {
    fn record(&mut self, node_type: NodeType) {
        match node_type {
            NodeType::Leaf => self.leaf += 1,
            NodeType::Node4 => self.node4 += 1,
            NodeType::Node16 => self.node16 += 1,
            NodeType::Node48 => self.node48 += 1,
            NodeType::Node256 => self.node256 += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.leaf + self.node4 + self.node16 + self.node48 + self.node256
    }
}

/// Mutable tree that is filled in memory and then written out.
#[derive(Debug, Default)]
pub struct ArtBuilder {
    root: Option<Box<TrieNode>>,
    len: usize,
}

impl ArtBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an exact key.
    ///
    /// Returns the output previously stored at the same path, if any.
    pub fn insert(&mut self, key: &[u8], output: Output) -> Option<Output> {
        self.insert_entry(key, output, false)
    }

    /// Insert a block boundary: every lookup that reaches `prefix` resolves
    /// to `output`, and the suffixes themselves are looked up in the block.
    ///
    /// If a node already ends at `prefix` with children below it, the output
    /// is attached to that node instead.
    pub fn insert_block(&mut self, prefix: &[u8], output: Output) -> Option<Output> {
        self.insert_entry(prefix, output, true)
    }

    fn insert_entry(&mut self, key: &[u8], output: Output, block: bool) -> Option<Output> {
        let old = if let Some(root) = self.root.as_deref_mut() {
            insert_recursive(root, key, output, block)
        } else {
            self.root = Some(Box::new(new_subtree(key, output, block)));
            None
        };
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Number of distinct keys and blocks inserted.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn root(&self) -> Option<&TrieNode> {
        self.root.as_deref()
    }

    /// Walk the tree and count nodes by type.
    pub fn node_counts(&self) -> NodeCounts {
        let mut counts = NodeCounts::default();
        if let Some(root) = &self.root {
            compute_counts(root, &mut counts);
        }
        counts
    }

    /// Write every node to `out` and return the root's fp.
    ///
    /// Children are written in ascending key-byte order before their
    /// parent, so a parent's fp is always larger than its children's.
    pub fn save<O: DataOutput + ?Sized>(&self, out: &mut O) -> Result<u64> {
        let root = self.root.as_deref().ok_or(Error::EmptyTree)?;
        let start = out.position();
        let mut buf = Vec::with_capacity(64);
        let mut counts = NodeCounts::default();
        let root_fp = save_recursive(root, out, &mut buf, &mut counts)?;
        debug!(
            root_fp,
            entries = self.len,
            nodes = counts.total(),
            leaves = counts.leaf,
            bytes = out.position() - start,
            "saved tree"
        );
        Ok(root_fp)
    }
}

/// Build the subtree for a path of `tail` bytes ending in `output`.
///
/// A keyless leaf has no bytes of its own, so a block with a non-empty tail
/// gets a single-child node carrying all but the last byte as its prefix.
fn new_subtree(tail: &[u8], output: Output, block: bool) -> TrieNode {
    if !block {
        return TrieNode::new_leaf(Some(tail.to_vec()), output);
    }
    match tail.split_last() {
        None => TrieNode::new_leaf(None, output),
        Some((&last, head)) => {
            let mut node = TrieNode::new_node4(head.to_vec());
            node.add_child_grow(last, Box::new(TrieNode::new_leaf(None, output)));
            node
        }
    }
}

/// Insert below `node`, where `rest` is the part of the path not consumed
/// by `node`'s ancestors or the index byte leading to it.
fn insert_recursive(
    node: &mut TrieNode,
    rest: &[u8],
    output: Output,
    block: bool,
) -> Option<Output> {
    match node {
        TrieNode::Leaf { key, output: existing } => {
            let same_path = match key {
                Some(key) => key.as_slice() == rest,
                None => rest.is_empty(),
            };
            if same_path {
                let old = std::mem::take(existing);
                *node = new_subtree(rest, output, block);
                return Some(old);
            }
            let old_key = key.take();
            let old_output = std::mem::take(existing);
            *node = split_leaf(old_key, old_output, rest, output, block);
            None
        }
        _ => {
            let prefix_len = node.prefix().len();
            let common = common_prefix_len(node.prefix(), rest);

            if common < prefix_len {
                // Split the prefix: a new parent keeps the shared part, the
                // old node moves under the first byte that differs.
                let prefix = node.prefix().to_vec();
                let parent = TrieNode::new_node4(prefix[..common].to_vec());
                let mut old = std::mem::replace(node, parent);
                old.set_prefix(&prefix[common + 1..]);
                node.add_child_grow(prefix[common], Box::new(old));
                match rest.get(common) {
                    Some(&b) => {
                        let subtree = new_subtree(&rest[common + 1..], output, block);
                        node.add_child_grow(b, Box::new(subtree));
                    }
                    None => *node.inner_output_mut() = Some(output),
                }
                return None;
            }

            let Some((&b, tail)) = rest[prefix_len..].split_first() else {
                return node.inner_output_mut().replace(output);
            };
            match node.find_child_mut(b) {
                Some(child) => insert_recursive(child, tail, output, block),
                None => {
                    node.add_child_grow(b, Box::new(new_subtree(tail, output, block)));
                    None
                }
            }
        }
    }
}

/// Replace a leaf whose path differs from `rest` by a Node4 holding both.
fn split_leaf(
    old_key: Option<Vec<u8>>,
    old_output: Output,
    rest: &[u8],
    output: Output,
    block: bool,
) -> TrieNode {
    // A keyless leaf ends exactly where it sits, so everything in `rest`
    // lies below it.
    let old_key = old_key.unwrap_or_default();
    let common = common_prefix_len(&old_key, rest);
    let mut node = TrieNode::new_node4(rest[..common].to_vec());

    match old_key.get(common) {
        Some(&b) => {
            let leaf = TrieNode::new_leaf(Some(old_key[common + 1..].to_vec()), old_output);
            node.add_child_grow(b, Box::new(leaf));
        }
        None => *node.inner_output_mut() = Some(old_output),
    }
    match rest.get(common) {
        Some(&b) => {
            let subtree = new_subtree(&rest[common + 1..], output, block);
            node.add_child_grow(b, Box::new(subtree));
        }
        None => *node.inner_output_mut() = Some(output),
    }
    node
}

fn save_recursive<O: DataOutput + ?Sized>(
    node: &TrieNode,
    out: &mut O,
    buf: &mut Vec<u8>,
    counts: &mut NodeCounts,
) -> Result<u64> {
    counts.record(node.node_type());
    if let TrieNode::Leaf { key, output } = node {
        encode_leaf(key.as_deref(), output, buf)?;
        let fp = out.position();
        out.write_bytes(buf)?;
        return Ok(fp);
    }

    let mut children = Vec::with_capacity(node.num_children());
    let mut pos = node.next_larger_pos(None);
    while let Some(p) = pos {
        if let Some((b, child)) = node.child_at(p) {
            let child_fp = save_recursive(child, out, buf, counts)?;
            children.push((b, child_fp));
        }
        pos = node.next_larger_pos(Some(p));
    }

    let fp = out.position();
    encode_inner(fp, node.prefix(), &children, node.node48_index(), node.output(), buf)?;
    out.write_bytes(buf)?;
    Ok(fp)
}

fn compute_counts(node: &TrieNode, counts: &mut NodeCounts) {
    counts.record(node.node_type());
    let mut pos = node.next_larger_pos(None);
    while let Some(p) = pos {
        if let Some((_, child)) = node.child_at(p) {
            compute_counts(child, counts);
        }
        pos = node.next_larger_pos(Some(p));
    }
}
