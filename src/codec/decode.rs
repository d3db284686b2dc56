//! Node deserialization.
//!
//! Only the parts needed to choose a child are read. Deltas and children
//! stay in the store until a traversal asks for them.

use super::*;
use crate::art::{NodeType, NODE48_EMPTY};
use crate::output::{NodeOutput, MAX_TARGET_OFFSET};
use crate::reader::node::{ChildIndex, InlineBytes, Inner, Node, NodeKind};
use crate::store::{ByteStore, StoreInput};
use crate::{Config, Error, Result};

/// Decode the node stored at `fp`.
pub(crate) fn load_node<S: ByteStore + ?Sized>(
    store: &S,
    fp: u64,
    config: &Config,
) -> Result<Node> {
    let header = store.read_byte(fp)?;
    if header & LEAF_NODE != 0 {
        load_leaf(store, fp, header)
    } else {
        load_inner(store, fp, header, config)
    }
}

/// Read `len` bytes at `fp` after checking they fit in the store.
fn read_inline<S: ByteStore + ?Sized>(
    store: &S,
    node_fp: u64,
    fp: u64,
    len: u64,
) -> Result<InlineBytes> {
    if len > store.len().saturating_sub(fp) {
        return Err(Error::corrupt(
            node_fp,
            format!("{len} bytes at {fp} run past end of store"),
        ));
    }
    let mut bytes = InlineBytes::from_elem(0, len as usize);
    store.read_bytes(fp, &mut bytes)?;
    Ok(bytes)
}

fn load_leaf<S: ByteStore + ?Sized>(store: &S, fp: u64, header: u8) -> Result<Node> {
    if header & LEAF_NODE_RESERVED != 0 {
        return Err(Error::corrupt(fp, format!("reserved leaf bit set in header {header:#04x}")));
    }
    let mut input = StoreInput::new(store, fp + 1);
    let key = if header & LEAF_NODE_HAS_KEY != 0 {
        let len = input.read_vint()?;
        let key = read_inline(store, fp, input.position(), len)?;
        input.skip(len);
        Some(key)
    } else {
        None
    };

    let target_fp_bytes = (header & WIDTH_BITS) as usize + 1;
    let target_offset = store.read_fixed_width(input.position(), target_fp_bytes)?;
    if target_offset > MAX_TARGET_OFFSET {
        return Err(Error::corrupt(fp, format!("target offset {target_offset} exceeds 62 bits")));
    }
    input.skip(target_fp_bytes as u64);

    let output = NodeOutput {
        target_offset,
        has_terms: header & LEAF_NODE_HAS_TERMS != 0,
        floor_data_fp: (header & LEAF_NODE_HAS_FLOOR != 0).then_some(input.position()),
    };
    Ok(Node {
        fp,
        kind: NodeKind::Leaf { key },
        output: Some(output),
    })
}

fn load_inner<S: ByteStore + ?Sized>(
    store: &S,
    fp: u64,
    header: u8,
    config: &Config,
) -> Result<Node> {
    let children_fp_bytes = (header & WIDTH_BITS) + 1;
    let encoded_output_fp_bytes = ((header >> 4) & WIDTH_BITS) as usize + 1;
    let has_output = header & NON_LEAF_NODE_HAS_OUTPUT != 0;

    let count_word = store.read_short(fp + 1)?;
    let count = (count_word >> 3) as usize;
    let prefix_length_bytes = (count_word & 0x07) as usize;
    if !(1..=MAX_CHILDREN).contains(&count) {
        return Err(Error::corrupt(fp, format!("invalid children count {count}")));
    }
    if prefix_length_bytes > MAX_PREFIX_LENGTH_BYTES {
        return Err(Error::corrupt(
            fp,
            format!("prefix length width {prefix_length_bytes} exceeds {MAX_PREFIX_LENGTH_BYTES}"),
        ));
    }

    let mut pos = fp + 3;
    let prefix = if prefix_length_bytes > 0 {
        let len = store.read_fixed_width(pos, prefix_length_bytes)?;
        pos += prefix_length_bytes as u64;
        let prefix = read_inline(store, fp, pos, len)?;
        pos += len;
        prefix
    } else {
        InlineBytes::new()
    };

    let index = match NodeType::for_children(count) {
        NodeType::Node4 => {
            let mut keys = [0u8; 4];
            store.read_bytes(pos, &mut keys[..count])?;
            pos += count as u64;
            ChildIndex::Node4(keys)
        }
        NodeType::Node16 => {
            let mut keys = [0u8; 16];
            store.read_bytes(pos, &mut keys[..count])?;
            pos += count as u64;
            ChildIndex::Node16(keys)
        }
        NodeType::Node48 => {
            let mut slots = Box::new([0u8; 256]);
            store.read_bytes(pos, &mut slots[..])?;
            pos += 256;
            // Slots index the delta array, so they are range checked even
            // when `validate` is off.
            let bad = slots
                .iter()
                .enumerate()
                .find(|&(_, &slot)| slot != NODE48_EMPTY && slot as usize >= count);
            if let Some((b, &slot)) = bad {
                return Err(Error::corrupt(
                    fp,
                    format!("byte {b} maps to slot {slot} of {count}"),
                ));
            }
            ChildIndex::Node48(slots)
        }
        NodeType::Node256 => {
            let mut bitmap = [0u64; NODE256_BITMAP_WORDS];
            for word in bitmap.iter_mut() {
                *word = store.read_long(pos)?;
                pos += 8;
            }
            let population: u32 = bitmap.iter().map(|w| w.count_ones()).sum();
            if population as usize != count {
                return Err(Error::corrupt(
                    fp,
                    format!("bitmap has {population} children, header says {count}"),
                ));
            }
            ChildIndex::Node256(bitmap)
        }
        NodeType::Leaf => unreachable!("count is at least 1"),
    };
    if config.validate {
        validate_index(fp, count, &index)?;
    }

    let children_delta_fp_start = pos;
    pos += (count * children_fp_bytes as usize) as u64;

    let output = if has_output {
        let encoded = store.read_fixed_width(pos, encoded_output_fp_bytes)?;
        pos += encoded_output_fp_bytes as u64;
        Some(NodeOutput::decode(encoded, pos))
    } else {
        None
    };

    Ok(Node {
        fp,
        kind: NodeKind::Inner(Inner {
            prefix,
            children_count: count as u16,
            children_fp_bytes,
            children_delta_fp_start,
            index,
        }),
        output,
    })
}

/// Checks that lookups do not depend on for memory safety but do for
/// correct results.
fn validate_index(fp: u64, count: usize, index: &ChildIndex) -> Result<()> {
    match index {
        ChildIndex::Node4(keys) => validate_sorted(fp, &keys[..count]),
        ChildIndex::Node16(keys) => validate_sorted(fp, &keys[..count]),
        ChildIndex::Node48(slots) => {
            let mut seen = [false; 48];
            let mut populated = 0;
            for (b, &slot) in slots.iter().enumerate() {
                if slot == NODE48_EMPTY {
                    continue;
                }
                // In range, checked at load.
                let slot = slot as usize;
                if seen[slot] {
                    return Err(Error::corrupt(fp, format!("byte {b} reuses slot {slot}")));
                }
                seen[slot] = true;
                populated += 1;
            }
            if populated != count {
                return Err(Error::corrupt(
                    fp,
                    format!("table has {populated} children, header says {count}"),
                ));
            }
            Ok(())
        }
        ChildIndex::Node256(_) => Ok(()),
    }
}

fn validate_sorted(fp: u64, keys: &[u8]) -> Result<()> {
    if keys.windows(2).all(|w| w[0] < w[1]) {
        Ok(())
    } else {
        Err(Error::corrupt(fp, "child keys not strictly ascending"))
    }
}
