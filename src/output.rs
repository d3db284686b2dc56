//! Values attached to keys.
//!
//! An output points into a separate metadata block store. On disk it is a
//! single packed integer, `target_offset << 2 | has_terms << 1 | has_floor_data`,
//! optionally followed by the raw floor data.

use crate::{Error, Result};

pub(crate) const HAS_FLOOR_DATA: u64 = 1 << 0;
pub(crate) const HAS_TERMS: u64 = 1 << 1;

/// Largest target offset that survives the two flag bits.
pub const MAX_TARGET_OFFSET: u64 = (1 << 62) - 1;

/// Output as supplied when building a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Offset into the metadata block store.
    pub target_offset: u64,
    /// Whether the block behind `target_offset` holds terms.
    pub has_terms: bool,
    /// Auxiliary record written in place after the output.
    pub floor_data: Option<Vec<u8>>,
}

impl Output {
    pub fn new(target_offset: u64) -> Self {
        Self {
            target_offset,
            has_terms: false,
            floor_data: None,
        }
    }

    pub fn with_terms(mut self) -> Self {
        self.has_terms = true;
        self
    }

    pub fn with_floor_data(mut self, floor_data: impl Into<Vec<u8>>) -> Self {
        self.floor_data = Some(floor_data.into());
        self
    }

    /// Pack into the on-disk integer form.
    pub(crate) fn encode(&self) -> Result<u64> {
        if self.target_offset > MAX_TARGET_OFFSET {
            return Err(Error::OutputTooLarge(self.target_offset));
        }
        let mut encoded = self.target_offset << 2;
        if self.floor_data.is_some() {
            encoded |= HAS_FLOOR_DATA;
        }
        if self.has_terms {
            encoded |= HAS_TERMS;
        }
        Ok(encoded)
    }
}

/// Output as decoded from a serialized node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeOutput {
    pub target_offset: u64,
    pub has_terms: bool,
    /// Absolute offset of the floor data, if any.
    pub floor_data_fp: Option<u64>,
}

impl NodeOutput {
    /// Unpack an encoded output whose floor data (if flagged) starts at `floor_data_fp`.
    pub(crate) fn decode(encoded: u64, floor_data_fp: u64) -> Self {
        Self {
            target_offset: encoded >> 2,
            has_terms: encoded & HAS_TERMS != 0,
            floor_data_fp: (encoded & HAS_FLOOR_DATA != 0).then_some(floor_data_fp),
        }
    }

    pub fn has_floor_data(&self) -> bool {
        self.floor_data_fp.is_some()
    }

    /// True if this decoded output describes the same value as `output`,
    /// ignoring where the floor data was placed.
    pub fn matches(&self, output: &Output) -> bool {
        self.target_offset == output.target_offset
            && self.has_terms == output.has_terms
            && self.has_floor_data() == output.floor_data.is_some()
    }
}
