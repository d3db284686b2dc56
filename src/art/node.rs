//! ART node types with adaptive sizing.
//!
//! The key insight of ART is using different node layouts based on
//! the actual number of children:
//!
//! - Node4: Up to 4 children (most common, smallest)
//! - Node16: 5-16 children (sorted keys, binary search)
//! - Node48: 17-48 children (256-byte index + 48 pointers)
//! - Node256: 49-256 children (direct array indexing)
//!
//! The same thresholds pick the on-disk layout of a serialized node.

use crate::output::Output;

/// Marks an unused entry of a Node48 index table.
pub(crate) const NODE48_EMPTY: u8 = 0xFF;

/// The type of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// A leaf node holding an output and an optional key suffix.
    Leaf,
    /// A node with up to 4 children.
    Node4,
    /// A node with 5-16 children.
    Node16,
    /// A node with 17-48 children.
    Node48,
    /// A node with 49-256 children.
    Node256,
}

impl NodeType {
    /// Layout used for a non-leaf node with `count` children.
    pub fn for_children(count: usize) -> NodeType {
        if count > 48 {
            NodeType::Node256
        } else if count > 16 {
            NodeType::Node48
        } else if count > 4 {
            NodeType::Node16
        } else {
            NodeType::Node4
        }
    }

    /// The upper bound on the number of children this type can hold.
    pub const fn upper_capacity(self) -> usize {
        match self {
            NodeType::Leaf => 0,
            NodeType::Node4 => 4,
            NodeType::Node16 => 16,
            NodeType::Node48 => 48,
            NodeType::Node256 => 256,
        }
    }
}

/// A node of the in-memory tree a builder assembles before saving.
///
/// A node's full path is its parent's path, the index byte leading to it,
/// and then its own prefix (non-leaf) or key (leaf).
pub enum TrieNode {
    /// Terminal node.
    Leaf {
        /// Remaining key bytes after the index byte. `None` marks a block
        /// whose suffixes are resolved outside the tree.
        key: Option<Vec<u8>>,
        output: Output,
    },

    /// A node with up to 4 children.
    Node4 {
        /// Compressed path prefix.
        prefix: Vec<u8>,
        /// Child keys, sorted.
        keys: [u8; 4],
        /// Child nodes, parallel to `keys`.
        children: Vec<Box<TrieNode>>,
        /// Output if a key ends at this node.
        output: Option<Output>,
    },

    /// A node with 5-16 children.
    Node16 {
        prefix: Vec<u8>,
        /// Child keys, sorted.
        keys: [u8; 16],
        children: Vec<Box<TrieNode>>,
        output: Option<Output>,
    },

    /// A node with 17-48 children.
    Node48 {
        prefix: Vec<u8>,
        /// Index mapping bytes to child positions (0xFF = empty). Boxed to reduce enum size.
        child_index: Box<[u8; 256]>,
        /// Child nodes in insertion order.
        children: Vec<Box<TrieNode>>,
        output: Option<Output>,
    },

    /// A node with 49-256 children.
    Node256 {
        prefix: Vec<u8>,
        num_children: u16,
        /// Child nodes (direct indexing by byte). Boxed to reduce enum size.
        children: Box<[Option<Box<TrieNode>>; 256]>,
        output: Option<Output>,
    },
}

impl TrieNode {
    /// Create a new leaf node.
    pub fn new_leaf(key: Option<Vec<u8>>, output: Output) -> Self {
        TrieNode::Leaf { key, output }
    }

    /// Create a new, childless Node4.
    pub fn new_node4(prefix: Vec<u8>) -> Self {
        TrieNode::Node4 {
            prefix,
            keys: [0; 4],
            children: Vec::with_capacity(4),
            output: None,
        }
    }

    /// Get the node type.
    pub fn node_type(&self) -> NodeType {
        match self {
            TrieNode::Leaf { .. } => NodeType::Leaf,
            TrieNode::Node4 { .. } => NodeType::Node4,
            TrieNode::Node16 { .. } => NodeType::Node16,
            TrieNode::Node48 { .. } => NodeType::Node48,
            TrieNode::Node256 { .. } => NodeType::Node256,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TrieNode::Leaf { .. })
    }

    /// Get the number of children.
    pub fn num_children(&self) -> usize {
        match self {
            TrieNode::Leaf { .. } => 0,
            TrieNode::Node4 { children, .. }
            | TrieNode::Node16 { children, .. }
            | TrieNode::Node48 { children, .. } => children.len(),
            TrieNode::Node256 { num_children, .. } => *num_children as usize,
        }
    }

    /// Get the prefix. Leaves have none.
    pub fn prefix(&self) -> &[u8] {
        match self {
            TrieNode::Leaf { .. } => &[],
            TrieNode::Node4 { prefix, .. }
            | TrieNode::Node16 { prefix, .. }
            | TrieNode::Node48 { prefix, .. }
            | TrieNode::Node256 { prefix, .. } => prefix,
        }
    }

    /// Set the prefix.
    pub fn set_prefix(&mut self, new_prefix: &[u8]) {
        match self {
            TrieNode::Leaf { .. } => {}
            TrieNode::Node4 { prefix, .. }
            | TrieNode::Node16 { prefix, .. }
            | TrieNode::Node48 { prefix, .. }
            | TrieNode::Node256 { prefix, .. } => {
                prefix.clear();
                prefix.extend_from_slice(new_prefix);
            }
        }
    }

    /// The output attached to this node, if any.
    pub fn output(&self) -> Option<&Output> {
        match self {
            TrieNode::Leaf { output, .. } => Some(output),
            TrieNode::Node4 { output, .. }
            | TrieNode::Node16 { output, .. }
            | TrieNode::Node48 { output, .. }
            | TrieNode::Node256 { output, .. } => output.as_ref(),
        }
    }

    /// Output slot of a non-leaf node.
    pub(crate) fn inner_output_mut(&mut self) -> &mut Option<Output> {
        match self {
            TrieNode::Leaf { .. } => panic!("Leaf output is not optional"),
            TrieNode::Node4 { output, .. }
            | TrieNode::Node16 { output, .. }
            | TrieNode::Node48 { output, .. }
            | TrieNode::Node256 { output, .. } => output,
        }
    }

    /// Find the child for the given key byte.
    pub fn find_child_mut(&mut self, key: u8) -> Option<&mut Box<TrieNode>> {
        match self {
            TrieNode::Leaf { .. } => None,
            TrieNode::Node4 { keys, children, .. } => {
                let n = children.len();
                keys[..n].iter().position(|&k| k == key).map(|i| &mut children[i])
            }
            TrieNode::Node16 { keys, children, .. } => {
                let n = children.len();
                keys[..n].binary_search(&key).ok().map(|i| &mut children[i])
            }
            TrieNode::Node48 { child_index, children, .. } => {
                let idx = child_index[key as usize];
                if idx != NODE48_EMPTY {
                    Some(&mut children[idx as usize])
                } else {
                    None
                }
            }
            TrieNode::Node256 { children, .. } => children[key as usize].as_mut(),
        }
    }

    /// Add a child node for a key byte that has no child yet.
    fn add_child(&mut self, key: u8, child: Box<TrieNode>) {
        match self {
            TrieNode::Leaf { .. } => panic!("Cannot add child to leaf"),

            TrieNode::Node4 { keys, children, .. } => {
                let n = children.len();
                assert!(n < 4, "Node4 is full, should grow first");
                let idx = keys[..n].partition_point(|&k| k < key);
                keys.copy_within(idx..n, idx + 1);
                keys[idx] = key;
                children.insert(idx, child);
            }

            TrieNode::Node16 { keys, children, .. } => {
                let n = children.len();
                assert!(n < 16, "Node16 is full, should grow first");
                let idx = keys[..n].partition_point(|&k| k < key);
                keys.copy_within(idx..n, idx + 1);
                keys[idx] = key;
                children.insert(idx, child);
            }

            TrieNode::Node48 {
                child_index,
                children,
                ..
            } => {
                assert!(children.len() < 48, "Node48 is full, should grow first");
                debug_assert_eq!(child_index[key as usize], NODE48_EMPTY);
                child_index[key as usize] = children.len() as u8;
                children.push(child);
            }

            TrieNode::Node256 {
                children,
                num_children,
                ..
            } => {
                debug_assert!(children[key as usize].is_none());
                children[key as usize] = Some(child);
                *num_children += 1;
            }
        }
    }

    /// Add a child, growing the node if necessary.
    pub fn add_child_grow(&mut self, key: u8, child: Box<TrieNode>) {
        if self.num_children() >= self.node_type().upper_capacity() {
            match self.node_type() {
                NodeType::Node4 => self.grow_to_node16(),
                NodeType::Node16 => self.grow_to_node48(),
                NodeType::Node48 => self.grow_to_node256(),
                NodeType::Leaf | NodeType::Node256 => {}
            }
        }
        self.add_child(key, child);
    }

    /// Grow Node4 to Node16.
    fn grow_to_node16(&mut self) {
        if let TrieNode::Node4 {
            prefix,
            keys,
            children,
            output,
        } = self
        {
            let mut new_keys = [0u8; 16];
            new_keys[..4].copy_from_slice(keys);

            *self = TrieNode::Node16 {
                prefix: std::mem::take(prefix),
                keys: new_keys,
                children: std::mem::take(children),
                output: output.take(),
            };
        }
    }

    /// Grow Node16 to Node48.
    fn grow_to_node48(&mut self) {
        if let TrieNode::Node16 {
            prefix,
            keys,
            children,
            output,
        } = self
        {
            let mut child_index = Box::new([NODE48_EMPTY; 256]);
            for (i, &k) in keys[..children.len()].iter().enumerate() {
                child_index[k as usize] = i as u8;
            }

            *self = TrieNode::Node48 {
                prefix: std::mem::take(prefix),
                child_index,
                children: std::mem::take(children),
                output: output.take(),
            };
        }
    }

    /// Grow Node48 to Node256.
    fn grow_to_node256(&mut self) {
        if let TrieNode::Node48 {
            prefix,
            child_index,
            children,
            output,
        } = self
        {
            let num_children = children.len() as u16;
            let mut slots: Vec<Option<Box<TrieNode>>> =
                std::mem::take(children).into_iter().map(Some).collect();
            let mut new_children: Box<[Option<Box<TrieNode>>; 256]> =
                Box::new(std::array::from_fn(|_| None));

            for (byte, &idx) in child_index.iter().enumerate() {
                if idx != NODE48_EMPTY {
                    new_children[byte] = slots[idx as usize].take();
                }
            }

            *self = TrieNode::Node256 {
                prefix: std::mem::take(prefix),
                num_children,
                children: new_children,
                output: output.take(),
            };
        }
    }

    /// Next populated position after `pos` (or the first one for `None`),
    /// in ascending key-byte order.
    ///
    /// Positions index `keys` for Node4/Node16 and are the key byte itself
    /// for Node48/Node256.
    pub fn next_larger_pos(&self, pos: Option<usize>) -> Option<usize> {
        let start = pos.map_or(0, |p| p + 1);
        match self {
            TrieNode::Leaf { .. } => None,
            TrieNode::Node4 { children, .. } | TrieNode::Node16 { children, .. } => {
                (start < children.len()).then_some(start)
            }
            TrieNode::Node48 { child_index, .. } => {
                (start..256).find(|&b| child_index[b] != NODE48_EMPTY)
            }
            TrieNode::Node256 { children, .. } => (start..256).find(|&b| children[b].is_some()),
        }
    }

    /// Key byte and child at a position returned by [`next_larger_pos`](Self::next_larger_pos).
    pub fn child_at(&self, pos: usize) -> Option<(u8, &TrieNode)> {
        match self {
            TrieNode::Leaf { .. } => None,
            TrieNode::Node4 { keys, children, .. } => {
                let child: &TrieNode = children.get(pos)?;
                Some((keys[pos], child))
            }
            TrieNode::Node16 { keys, children, .. } => {
                let child: &TrieNode = children.get(pos)?;
                Some((keys[pos], child))
            }
            TrieNode::Node48 {
                child_index,
                children,
                ..
            } => {
                let idx = *child_index.get(pos)?;
                let child: &TrieNode = children.get(idx as usize)?;
                Some((pos as u8, child))
            }
            TrieNode::Node256 { children, .. } => Some((pos as u8, children.get(pos)?.as_deref()?)),
        }
    }

    /// Byte-to-slot table of a Node48.
    pub(crate) fn node48_index(&self) -> Option<&[u8; 256]> {
        match self {
            TrieNode::Node48 { child_index, .. } => Some(child_index),
            _ => None,
        }
    }
}

impl std::fmt::Debug for TrieNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrieNode::Leaf { key, output } => f
                .debug_struct("Leaf")
                .field("key", &key.as_deref().map(String::from_utf8_lossy))
                .field("output", output)
                .finish(),
            _ => f
                .debug_struct(match self.node_type() {
                    NodeType::Node4 => "Node4",
                    NodeType::Node16 => "Node16",
                    NodeType::Node48 => "Node48",
                    _ => "Node256",
                })
                .field("prefix", &String::from_utf8_lossy(self.prefix()))
                .field("num_children", &self.num_children())
                .field("output", &self.output())
                .finish(),
        }
    }
}
