//! Node serialization.

use super::*;
use crate::art::{NodeType, NODE48_EMPTY};
use crate::encoding::{bytes_required, encode_varint, write_fixed_width};
use crate::output::{Output, MAX_TARGET_OFFSET};
use crate::{Error, Result};

/// Encode a non-leaf node that will be written at `fp` into `buf`.
///
/// `children` holds `(key byte, child fp)` in ascending key-byte order.
/// `node48_slots`, when given, is the byte-to-slot table to use if the
/// node is laid out as a Node48; otherwise slots follow key-byte order.
pub(crate) fn encode_inner(
    fp: u64,
    prefix: &[u8],
    children: &[(u8, u64)],
    node48_slots: Option<&[u8; 256]>,
    output: Option<&Output>,
    buf: &mut Vec<u8>,
) -> Result<()> {
    buf.clear();
    let count = children.len();
    debug_assert!((1..=MAX_CHILDREN).contains(&count), "bad children count {count}");
    debug_assert!(children.windows(2).all(|w| w[0].0 < w[1].0));

    let mut max_delta = 0u64;
    for &(_, child_fp) in children {
        if child_fp >= fp {
            return Err(Error::corrupt(
                fp,
                format!("child at {child_fp} must be saved before its parent"),
            ));
        }
        max_delta = max_delta.max(fp - child_fp);
    }
    let children_fp_bytes = bytes_required(max_delta);

    let encoded_output = output.map(Output::encode).transpose()?;
    let encoded_output_fp_bytes = encoded_output.map_or(1, bytes_required);

    let mut header = (children_fp_bytes - 1) as u8 | ((encoded_output_fp_bytes - 1) as u8) << 4;
    if encoded_output.is_some() {
        header |= NON_LEAF_NODE_HAS_OUTPUT;
    }
    buf.push(header);

    let prefix_length_bytes = if prefix.is_empty() {
        0
    } else {
        bytes_required(prefix.len() as u64)
    };
    if prefix_length_bytes > MAX_PREFIX_LENGTH_BYTES {
        return Err(Error::PrefixTooLong(prefix.len()));
    }
    let count_word = (count as u16) << 3 | prefix_length_bytes as u16;
    buf.extend_from_slice(&count_word.to_le_bytes());
    if !prefix.is_empty() {
        write_fixed_width(prefix.len() as u64, prefix_length_bytes, buf);
        buf.extend_from_slice(prefix);
    }

    // Child fps in slot order.
    let mut slot_fps: Vec<u64> = children.iter().map(|&(_, child_fp)| child_fp).collect();
    match NodeType::for_children(count) {
        NodeType::Node4 | NodeType::Node16 => {
            buf.extend(children.iter().map(|&(b, _)| b));
        }
        NodeType::Node48 => {
            let table = match node48_slots {
                Some(table) => *table,
                None => {
                    let mut table = [NODE48_EMPTY; 256];
                    for (slot, &(b, _)) in children.iter().enumerate() {
                        table[b as usize] = slot as u8;
                    }
                    table
                }
            };
            for &(b, child_fp) in children {
                let slot = table[b as usize] as usize;
                debug_assert!(slot < count, "byte {b} has no slot");
                slot_fps[slot] = child_fp;
            }
            buf.extend_from_slice(&table);
        }
        NodeType::Node256 => {
            let mut bitmap = [0u64; NODE256_BITMAP_WORDS];
            for &(b, _) in children {
                bitmap[(b >> 6) as usize] |= 1u64 << (b & 63);
            }
            for word in bitmap {
                buf.extend_from_slice(&word.to_le_bytes());
            }
        }
        NodeType::Leaf => unreachable!("non-leaf layout"),
    }

    for child_fp in slot_fps {
        write_fixed_width(fp - child_fp, children_fp_bytes, buf);
    }

    if let (Some(encoded), Some(output)) = (encoded_output, output) {
        write_fixed_width(encoded, encoded_output_fp_bytes, buf);
        if let Some(floor_data) = &output.floor_data {
            buf.extend_from_slice(floor_data);
        }
    }
    Ok(())
}

/// Encode a leaf node into `buf`.
pub(crate) fn encode_leaf(key: Option<&[u8]>, output: &Output, buf: &mut Vec<u8>) -> Result<()> {
    buf.clear();
    if output.target_offset > MAX_TARGET_OFFSET {
        return Err(Error::OutputTooLarge(output.target_offset));
    }
    let target_fp_bytes = bytes_required(output.target_offset);

    let mut header = LEAF_NODE | (target_fp_bytes - 1) as u8;
    if key.is_some() {
        header |= LEAF_NODE_HAS_KEY;
    }
    if output.floor_data.is_some() {
        header |= LEAF_NODE_HAS_FLOOR;
    }
    if output.has_terms {
        header |= LEAF_NODE_HAS_TERMS;
    }
    buf.push(header);

    if let Some(key) = key {
        encode_varint(key.len() as u64, buf);
        buf.extend_from_slice(key);
    }
    write_fixed_width(output.target_offset, target_fp_bytes, buf);
    if let Some(floor_data) = &output.floor_data {
        buf.extend_from_slice(floor_data);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_layout() {
        let mut buf = Vec::new();
        let output = Output::new(0x1234).with_terms().with_floor_data(vec![0xAA]);
        encode_leaf(Some(b"xy"), &output, &mut buf).unwrap();
        assert_eq!(
            buf,
            vec![
                LEAF_NODE | LEAF_NODE_HAS_KEY | LEAF_NODE_HAS_FLOOR | LEAF_NODE_HAS_TERMS | 1,
                2,
                b'x',
                b'y',
                0x34,
                0x12,
                0xAA,
            ]
        );

        encode_leaf(None, &Output::new(9), &mut buf).unwrap();
        assert_eq!(buf, vec![LEAF_NODE, 9]);
    }

    #[test]
    fn test_inner_layout_node4() {
        // Node at fp 300 with children at 10 and 290, prefix "ab", output 5.
        let mut buf = Vec::new();
        let children = [(b'c', 10u64), (b'd', 290u64)];
        let output = Output::new(5).with_terms();
        encode_inner(300, b"ab", &children, None, Some(&output), &mut buf).unwrap();

        let expected_header = 1 | NON_LEAF_NODE_HAS_OUTPUT; // 290 needs 2 bytes, output 1 byte
        assert_eq!(buf[0], expected_header);
        assert_eq!(u16::from_le_bytes([buf[1], buf[2]]), 2 << 3 | 1);
        assert_eq!(&buf[3..6], &[2, b'a', b'b']);
        assert_eq!(&buf[6..8], b"cd");
        assert_eq!(&buf[8..12], &[0x22, 0x01, 10, 0]);
        assert_eq!(buf[12], 5 << 2 | 2);
        assert_eq!(buf.len(), 13);
    }

    #[test]
    fn test_node48_deltas_follow_slots() {
        let mut buf = Vec::new();
        let children: Vec<(u8, u64)> = (0..17u8).map(|i| (i * 2, 100 + i as u64)).collect();
        // Reverse slot assignment: the largest byte takes slot 0.
        let mut table = [NODE48_EMPTY; 256];
        for (i, &(b, _)) in children.iter().enumerate() {
            table[b as usize] = (16 - i) as u8;
        }
        encode_inner(200, b"", &children, Some(&table), None, &mut buf).unwrap();

        let deltas_start = 3 + 256;
        assert_eq!(&buf[3..deltas_start], &table[..]);
        let deltas = &buf[deltas_start..];
        assert_eq!(deltas.len(), 17);
        // Slot 0 belongs to byte 32, saved at fp 116.
        assert_eq!(deltas[0], 200 - 116);
        assert_eq!(deltas[16], 200 - 100);
    }

    #[test]
    fn test_node256_bitmap() {
        let mut buf = Vec::new();
        let children: Vec<(u8, u64)> = (0..49u8).map(|i| (i * 5, i as u64)).collect();
        encode_inner(1000, b"", &children, None, None, &mut buf).unwrap();
        assert_eq!(buf[0] & WIDTH_BITS, 1); // delta 1000 needs two bytes
        let mut bitmap = [0u64; 4];
        for (w, word) in bitmap.iter_mut().enumerate() {
            let start = 3 + w * 8;
            *word = u64::from_le_bytes(buf[start..start + 8].try_into().unwrap());
        }
        assert_eq!(bitmap.iter().map(|w| w.count_ones()).sum::<u32>(), 49);
        assert_eq!(bitmap[0] & 1, 1);
        assert_ne!(bitmap[(240 >> 6) as usize] & (1 << (240 & 63)), 0);
        assert_eq!(buf.len(), 3 + 32 + 49 * 2);
    }

    #[test]
    fn test_child_after_parent_is_rejected() {
        let mut buf = Vec::new();
        let err = encode_inner(10, b"", &[(b'a', 10)], None, None, &mut buf).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_oversized_output_is_rejected() {
        let mut buf = Vec::new();
        let output = Output::new(u64::MAX);
        assert!(matches!(
            encode_leaf(None, &output, &mut buf),
            Err(Error::OutputTooLarge(_))
        ));
        assert!(matches!(
            encode_inner(10, b"", &[(b'a', 1)], None, Some(&output), &mut buf),
            Err(Error::OutputTooLarge(_))
        ));
    }
}
