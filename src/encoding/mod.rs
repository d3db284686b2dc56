//! Encoding utilities shared by the node codec.
//!
//! This module provides the integer encodings used by the on-disk format:
//! - Fixed-width little-endian integers sized to the smallest byte count
//! - Variable-length integers (VarInt) for leaf key lengths
//! - Prefix comparison over byte ranges

/// Masks keeping the low `n + 1` bytes of a `u64`, indexed by `n`.
pub const BYTES_MINUS_1_MASK: [u64; 8] = [
    0xFF,
    0xFFFF,
    0xFF_FFFF,
    0xFFFF_FFFF,
    0xFF_FFFF_FFFF,
    0xFFFF_FFFF_FFFF,
    0xFF_FFFF_FFFF_FFFF,
    0xFFFF_FFFF_FFFF_FFFF,
];

/// Smallest number of bytes (1..=8) whose unsigned range covers `v`.
#[inline]
pub fn bytes_required(v: u64) -> usize {
    8 - ((v | 1).leading_zeros() as usize >> 3)
}

/// Keep only the low `n` bytes of `v`.
///
/// `n` must be in `1..=8`.
#[inline]
pub fn mask_to_width(v: u64, n: usize) -> u64 {
    debug_assert!((1..=8).contains(&n));
    v & BYTES_MINUS_1_MASK[n - 1]
}

/// Append the low `n` bytes of `v` in little-endian order.
///
/// Trailing zero bytes are written when `n` is larger than [`bytes_required`].
pub fn write_fixed_width(v: u64, n: usize, buf: &mut Vec<u8>) {
    debug_assert!((1..=8).contains(&n));
    debug_assert!(n == 8 || v >> (n * 8) == 0, "{v} does not fit in {n} bytes");
    buf.extend_from_slice(&v.to_le_bytes()[..n]);
}

/// Read exactly `n` little-endian bytes from the front of `bytes`.
pub fn read_fixed_width(bytes: &[u8], n: usize) -> u64 {
    debug_assert!((1..=8).contains(&n) && bytes.len() >= n);
    let mut word = [0u8; 8];
    word[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(word)
}

/// Encode a u64 as a variable-length integer, appending to `buf`.
///
/// Uses 1-10 bytes depending on the value:
/// - 0-127: 1 byte
/// - 128-16383: 2 bytes
/// - etc.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
    buf.len() - start
}

/// Maximum encoded length of a u64 varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Length of the longest common prefix of `a` and `b`.
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
