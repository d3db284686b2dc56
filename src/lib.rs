//! # blocktree-art
//!
//! An immutable, on-disk Adaptive Radix Tree used as the index of a
//! block-oriented term dictionary.
//!
//! Based on "The Adaptive Radix Tree: ARTful Indexing for Main-Memory Databases"
//! (ICDE 2013, Leis et al.), with nodes serialized children-first and linked
//! by variable-width backward deltas.
//!
//! A tree maps byte-string keys (or block prefixes) to [`Output`]s that
//! point into a separate block store. It is built once in memory with
//! [`ArtBuilder`], saved to any [`DataOutput`], and then read in place
//! through a [`ByteStore`] without loading more than the nodes a lookup
//! visits.
//!
//! ## Example
//!
//! ```rust
//! use blocktree_art::{ArtBuilder, Descend, KeyCursor, Output, Reader};
//!
//! let mut builder = ArtBuilder::new();
//! builder.insert(b"ai", Output::new(1));
//! builder.insert(b"an", Output::new(2));
//! builder.insert(b"bat", Output::new(3).with_terms());
//!
//! let mut bytes = Vec::new();
//! let root_fp = builder.save(&mut bytes)?;
//!
//! let reader = Reader::open(bytes, root_fp)?;
//! assert_eq!(reader.get(b"an")?.map(|o| o.target_offset), Some(2));
//! assert_eq!(reader.get(b"ax")?, None);
//!
//! let mut cursor = KeyCursor::new(b"bat");
//! match reader.descend(&mut cursor, reader.root())? {
//!     Descend::Child(leaf) => assert!(leaf.output().unwrap().has_terms),
//!     other => panic!("unexpected {other:?}"),
//! }
//! # Ok::<(), blocktree_art::Error>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod art;
mod codec;
mod encoding;
mod error;
mod output;
mod reader;
mod store;

pub use art::{ArtBuilder, NodeCounts, NodeType, TrieNode};
pub use error::{Error, Result};
pub use output::{NodeOutput, Output, MAX_TARGET_OFFSET};
pub use reader::{Children, Descend, KeyCursor, Node, Reader};
pub use store::{ByteStore, DataOutput, FileOutput, MmapStore, StoreInput};

/// Reader and store options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Run the structural checks that cost extra work on every decoded
    /// node: ascending Node4/Node16 keys and a consistent Node48 table.
    /// Checks that keep offsets in range always run.
    pub validate: bool,
    /// Prefault all pages when memory-mapping an index file.
    pub populate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validate: cfg!(debug_assertions),
            populate: false,
        }
    }
}

#[cfg(test)]
mod proptests;
