//! Byte storage the tree is written to and read from.
//!
//! Reading goes through [`ByteStore`], a random-access view over an already
//! sealed byte region. All reads are absolute and side-effect free, so one
//! store can serve any number of concurrent traversals. Writing goes through
//! [`DataOutput`], an append-only sink that knows its current offset.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use memmap2::{Mmap, MmapOptions};

use crate::encoding::{mask_to_width, read_fixed_width, MAX_VARINT_LEN};
use crate::{Config, Error, Result};

/// Random-access reads over an immutable byte region.
///
/// Multi-byte integers are little-endian.
pub trait ByteStore {
    /// Total number of readable bytes.
    fn len(&self) -> u64;

    /// Fill `buf` with the bytes starting at `fp`.
    fn read_bytes(&self, fp: u64, buf: &mut [u8]) -> io::Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_byte(&self, fp: u64) -> io::Result<u8> {
        let mut b = [0u8; 1];
        self.read_bytes(fp, &mut b)?;
        Ok(b[0])
    }

    fn read_short(&self, fp: u64) -> io::Result<u16> {
        let mut b = [0u8; 2];
        self.read_bytes(fp, &mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    fn read_int(&self, fp: u64) -> io::Result<u32> {
        let mut b = [0u8; 4];
        self.read_bytes(fp, &mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn read_long(&self, fp: u64) -> io::Result<u64> {
        let mut b = [0u8; 8];
        self.read_bytes(fp, &mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    /// Read an `n`-byte (1..=8) little-endian integer at `fp`.
    ///
    /// When a full word is available this reads 8 bytes and masks off
    /// whatever follows the declared width.
    fn read_fixed_width(&self, fp: u64, n: usize) -> io::Result<u64> {
        debug_assert!((1..=8).contains(&n));
        if fp.checked_add(8).is_some_and(|end| end <= self.len()) {
            return Ok(mask_to_width(self.read_long(fp)?, n));
        }
        let mut b = [0u8; 8];
        self.read_bytes(fp, &mut b[..n])?;
        Ok(read_fixed_width(&b, n))
    }
}

fn out_of_bounds(fp: u64, len: usize, store_len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("read of {len} bytes at {fp} past end of store ({store_len} bytes)"),
    )
}

impl ByteStore for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_bytes(&self, fp: u64, buf: &mut [u8]) -> io::Result<()> {
        let src = usize::try_from(fp)
            .ok()
            .and_then(|start| Some(start..start.checked_add(buf.len())?))
            .and_then(|range| self.get(range))
            .ok_or_else(|| out_of_bounds(fp, buf.len(), <[u8]>::len(self)))?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

impl ByteStore for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn read_bytes(&self, fp: u64, buf: &mut [u8]) -> io::Result<()> {
        self.as_slice().read_bytes(fp, buf)
    }
}

impl<S: ByteStore + ?Sized> ByteStore for &S {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_bytes(&self, fp: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_bytes(fp, buf)
    }
}

impl<S: ByteStore + ?Sized> ByteStore for Arc<S> {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_bytes(&self, fp: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_bytes(fp, buf)
    }
}

/// A sealed index file mapped into memory.
pub struct MmapStore {
    mmap: Mmap,
}

impl MmapStore {
    /// Map the file at `path` read-only.
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut options = MmapOptions::new();
        if config.populate {
            options.populate();
        }
        // SAFETY: index files are sealed before readers open them and are
        // never modified while mapped.
        let mmap = unsafe { options.map(&file)? };
        tracing::debug!(path = %path.as_ref().display(), len = mmap.len(), "mapped index file");
        Ok(Self { mmap })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}

impl ByteStore for MmapStore {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_bytes(&self, fp: u64, buf: &mut [u8]) -> io::Result<()> {
        self.as_bytes().read_bytes(fp, buf)
    }
}

/// Sequential reader over a [`ByteStore`], starting at a fixed offset.
///
/// Used to hand floor data to callers, which parse it themselves.
pub struct StoreInput<'a, S: ?Sized> {
    store: &'a S,
    pos: u64,
}

impl<'a, S: ByteStore + ?Sized> StoreInput<'a, S> {
    pub fn new(store: &'a S, pos: u64) -> Self {
        Self { store, pos }
    }

    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn skip(&mut self, n: u64) {
        self.pos += n;
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let b = self.store.read_byte(self.pos)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.store.read_bytes(self.pos, buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Decode a variable-length integer.
    pub fn read_vint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::corrupt(start, "varint longer than 10 bytes"))
    }
}

/// Append-only sink that nodes are saved to.
pub trait DataOutput {
    /// Offset the next written byte will land at.
    fn position(&self) -> u64;

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn write_byte(&mut self, b: u8) -> io::Result<()> {
        self.write_bytes(&[b])
    }

    fn write_short(&mut self, v: u16) -> io::Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }
}

impl DataOutput for Vec<u8> {
    fn position(&self) -> u64 {
        self.len() as u64
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Buffered file writer that tracks its own offset.
pub struct FileOutput {
    inner: BufWriter<File>,
    pos: u64,
}

impl FileOutput {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: BufWriter::new(file),
            pos: 0,
        })
    }

    /// Flush buffered bytes and sync the file to disk.
    ///
    /// Returns the total number of bytes written.
    pub fn finish(mut self) -> io::Result<u64> {
        self.inner.flush()?;
        self.inner.get_ref().sync_all()?;
        Ok(self.pos)
    }
}

impl DataOutput for FileOutput {
    fn position(&self) -> u64 {
        self.pos
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }
}
