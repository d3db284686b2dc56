//! Read-only traversal of a saved tree.
//!
//! A [`Reader`] owns a [`ByteStore`] and the decoded root. Every other node
//! is decoded on demand, one level at a time, as a lookup consumes the
//! target key through a [`KeyCursor`].

pub(crate) mod node;

use std::borrow::Cow;
use std::path::Path;

use tracing::{debug, trace};

use crate::codec::decode::load_node;
use crate::output::NodeOutput;
use crate::store::{ByteStore, MmapStore, StoreInput};
use crate::{Config, Error, Result};

pub use node::Node;
use node::Inner;

/// A target key being consumed by a lookup.
///
/// Only `bytes[offset..end]` remains to be matched. [`Reader::descend`]
/// advances `offset`; nothing else moves it except [`advance`](Self::advance).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
    end: usize,
}

impl<'a> KeyCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            end: bytes.len(),
        }
    }

    /// Cursor over `bytes[offset..offset + len]`, clamped to `bytes`.
    pub fn with_range(bytes: &'a [u8], offset: usize, len: usize) -> Self {
        let end = offset.saturating_add(len).min(bytes.len());
        Self {
            bytes,
            offset: offset.min(end),
            end,
        }
    }

    /// Absolute offset of the next unconsumed byte.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Number of bytes left to consume.
    pub fn len(&self) -> usize {
        self.end - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.end
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.offset..self.end]
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Exclusive end of the readable range.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Skip `n` bytes, stopping at the end.
    pub fn advance(&mut self, n: usize) {
        self.offset = self.offset.saturating_add(n).min(self.end);
    }

    fn target(&self) -> &'a [u8] {
        &self.bytes[..self.end]
    }
}

/// Result of one descent step from a parent node.
#[derive(Debug, PartialEq, Eq)]
pub enum Descend<'n> {
    /// No child for the next key byte, or nothing left to consume.
    NoMatch,
    /// The child for the next key byte, whose prefix or key matched.
    Child(Node),
    /// A child exists for the next key byte, but its prefix or key does
    /// not match the rest of the target. Carries the parent.
    PartialMatch(&'n Node),
}

/// Read-only view of a saved tree.
///
/// All lookups take `&self`; a reader over a `Sync` store can be shared
/// across threads, each thread using its own cursors.
pub struct Reader<S> {
    store: S,
    root: Node,
    config: Config,
}

impl Reader<MmapStore> {
    /// Map the file at `path` and open the tree rooted at `root_fp`.
    pub fn open_file(path: impl AsRef<Path>, root_fp: u64, config: Config) -> Result<Self> {
        let store = MmapStore::open(path, &config)?;
        Self::with_config(store, root_fp, config)
    }
}

impl<S: ByteStore> Reader<S> {
    /// Open the tree rooted at `root_fp` with the default [`Config`].
    pub fn open(store: S, root_fp: u64) -> Result<Self> {
        Self::with_config(store, root_fp, Config::default())
    }

    pub fn with_config(store: S, root_fp: u64, config: Config) -> Result<Self> {
        let root = load_node(&store, root_fp, &config)?;
        debug!(
            root_fp,
            root_type = ?root.node_type(),
            store_len = store.len(),
            "opened tree"
        );
        Ok(Self {
            store,
            root,
            config,
        })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decode the node at `fp`.
    pub fn load(&self, fp: u64) -> Result<Node> {
        load_node(&self.store, fp, &self.config)
    }

    /// Take one step from `node` using the next byte of `cursor`.
    ///
    /// With an empty cursor or a leaf `node` the cursor is left alone.
    /// Otherwise the index byte is always consumed, and on
    /// [`Descend::Child`] so is the child's prefix or key. A keyless leaf
    /// matches whatever follows.
    pub fn descend<'n>(&self, cursor: &mut KeyCursor<'_>, node: &'n Node) -> Result<Descend<'n>> {
        let (result, offset) = self.step(cursor.target(), node, cursor.offset)?;
        cursor.offset = offset;
        Ok(result)
    }

    /// Same decision as [`descend`](Self::descend), reading the target
    /// from `offset` without moving the cursor.
    ///
    /// Offsets outside the cursor's unconsumed range return
    /// [`Descend::NoMatch`].
    pub fn descend_at<'n>(
        &self,
        cursor: &KeyCursor<'_>,
        node: &'n Node,
        offset: usize,
    ) -> Result<Descend<'n>> {
        if offset < cursor.offset || offset >= cursor.end {
            return Ok(Descend::NoMatch);
        }
        let (result, _) = self.step(cursor.target(), node, offset)?;
        Ok(result)
    }

    /// Returns the step's outcome and the offset the cursor should move to.
    fn step<'n>(
        &self,
        target: &[u8],
        node: &'n Node,
        offset: usize,
    ) -> Result<(Descend<'n>, usize)> {
        let Some(inner) = node.inner() else {
            return Ok((Descend::NoMatch, offset));
        };
        let Some(&index_byte) = target.get(offset) else {
            return Ok((Descend::NoMatch, offset));
        };
        let offset = offset + 1;
        let Some(pos) = inner.child_pos(index_byte) else {
            return Ok((Descend::NoMatch, offset));
        };
        let child = self.load_child(node, inner, pos)?;
        match child.match_len(&target[offset..]) {
            Some(matched) => Ok((Descend::Child(child), offset + matched)),
            None => Ok((Descend::PartialMatch(node), offset)),
        }
    }

    fn load_child(&self, parent: &Node, inner: &Inner, pos: usize) -> Result<Node> {
        let delta = self
            .store
            .read_fixed_width(inner.delta_fp(pos), inner.children_fp_bytes as usize)?;
        if delta == 0 || delta > parent.fp {
            return Err(Error::corrupt(
                parent.fp,
                format!("child delta {delta} out of range"),
            ));
        }
        let child_fp = parent.fp - delta;
        trace!(
            parent_fp = parent.fp,
            child_fp,
            index_byte = inner.index_byte_at(pos),
            "load child"
        );
        self.load(child_fp)
    }

    /// The child of `node` for `index_byte`, without matching its prefix.
    pub fn child(&self, node: &Node, index_byte: u8) -> Result<Option<Node>> {
        let Some(inner) = node.inner() else {
            return Ok(None);
        };
        match inner.child_pos(index_byte) {
            Some(pos) => self.load_child(node, inner, pos).map(Some),
            None => Ok(None),
        }
    }

    /// Children of `node` in ascending key-byte order.
    pub fn children<'r>(&'r self, node: &'r Node) -> Children<'r, S> {
        Children {
            reader: self,
            node,
            pos: None,
        }
    }

    /// Output for `key`.
    ///
    /// A keyless leaf reached on the way answers for every key below it;
    /// the caller resolves the key inside that block.
    pub fn get(&self, key: &[u8]) -> Result<Option<NodeOutput>> {
        let Some(matched) = self.root.match_len(key) else {
            return Ok(None);
        };
        let mut cursor = KeyCursor::new(key);
        cursor.advance(matched);
        let mut current = Cow::Borrowed(&self.root);
        loop {
            if cursor.is_empty() || current.is_block_leaf() {
                return Ok(current.output());
            }
            let next = match self.descend(&mut cursor, &current)? {
                Descend::Child(child) => child,
                Descend::NoMatch | Descend::PartialMatch(_) => return Ok(None),
            };
            current = Cow::Owned(next);
        }
    }

    /// Deepest node with an output on the path `key` matches.
    ///
    /// This is the block a term-dictionary lookup for `key` starts in.
    pub fn floor_block(&self, key: &[u8]) -> Result<Option<Node>> {
        let Some(matched) = self.root.match_len(key) else {
            return Ok(None);
        };
        let mut cursor = KeyCursor::new(key);
        cursor.advance(matched);
        let mut best = self.root.has_output().then(|| self.root.clone());
        let mut current = Cow::Borrowed(&self.root);
        loop {
            let next = match self.descend(&mut cursor, &current)? {
                Descend::Child(child) => child,
                Descend::NoMatch | Descend::PartialMatch(_) => return Ok(best),
            };
            if next.has_output() {
                best = Some(next.clone());
            }
            current = Cow::Owned(next);
        }
    }

    /// Sequential input over the floor data of `node`'s output.
    pub fn floor_data(&self, node: &Node) -> Option<StoreInput<'_, S>> {
        node.floor_data_fp().map(|fp| StoreInput::new(&self.store, fp))
    }

    /// Every output in the tree with its full path, in key order.
    ///
    /// Paths ending in a keyless leaf name the block prefix.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, NodeOutput)>> {
        let mut out = Vec::new();
        self.collect_entries(&self.root, &mut Vec::new(), &mut out)?;
        Ok(out)
    }

    fn collect_entries(
        &self,
        node: &Node,
        path: &mut Vec<u8>,
        out: &mut Vec<(Vec<u8>, NodeOutput)>,
    ) -> Result<()> {
        let base = path.len();
        path.extend_from_slice(node.prefix());
        if let Some(key) = node.key() {
            path.extend_from_slice(key);
        }
        if let Some(output) = node.output() {
            out.push((path.clone(), output));
        }
        for child in self.children(node) {
            let (b, child) = child?;
            path.push(b);
            self.collect_entries(&child, path, out)?;
            path.pop();
        }
        path.truncate(base);
        Ok(())
    }

    /// Indented, human-readable rendering of the whole tree.
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        self.dump_node(&self.root, None, 0, &mut out)?;
        Ok(out)
    }

    fn dump_node(
        &self,
        node: &Node,
        index_byte: Option<u8>,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        let indent = "  ".repeat(depth);
        let edge = index_byte.map_or_else(String::new, |b| format!("[{}] ", escape(&[b])));
        let detail = match node.key() {
            Some(key) => format!("key={:?}", escape(key)),
            None if node.is_leaf() => "block".to_string(),
            None => format!(
                "prefix={:?} children={}",
                escape(node.prefix()),
                node.children_count()
            ),
        };
        out.push_str(&format!("{indent}{edge}{:?} fp={} {detail}", node.node_type(), node.fp()));
        if let Some(output) = node.output() {
            out.push_str(&format!(
                " -> {}{}{}",
                output.target_offset,
                if output.has_terms { " terms" } else { "" },
                if output.has_floor_data() { " floor" } else { "" },
            ));
        }
        out.push('\n');
        for child in self.children(node) {
            let (b, child) = child?;
            self.dump_node(&child, Some(b), depth + 1, out)?;
        }
        Ok(())
    }
}

fn escape(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

/// Iterator over a node's children, see [`Reader::children`].
pub struct Children<'r, S> {
    reader: &'r Reader<S>,
    node: &'r Node,
    pos: Option<usize>,
}

impl<S: ByteStore> Iterator for Children<'_, S> {
    type Item = Result<(u8, Node)>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.node.inner()?;
        let pos = inner.next_larger_pos(self.pos)?;
        self.pos = Some(pos);
        let child = self.reader.load_child(self.node, inner, pos);
        Some(child.map(|child| (inner.index_byte_at(pos), child)))
    }
}
