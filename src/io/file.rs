// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The MXF file handle.
//!
//! [`MxfFile`] wraps a boxed [`MxfStream`] and carries the file-level state
//! the KLV codec needs: the configured minimum BER length size and the
//! length of any vendor run-in preceding the header partition. Big-endian
//! primitive integer I/O lives here; KLV framing is layered on top in
//! [`crate::container::klv`].

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

use crate::core::error::{MxfError, Result};
use crate::io::disk::DiskStream;
use crate::io::memory::MemoryStream;
use crate::io::stream::{MxfStream, SeekFrom};

/// Maximum supported run-in length preceding the header partition pack.
pub const MAX_RUNIN_LEN: u16 = 0xffff;

const SKIP_BUFFER_SIZE: usize = 2048;
const ZEROS_BUFFER: [u8; 8192] = [0; 8192];

/// An MXF file: a byte stream plus KLV framing state.
pub struct MxfFile {
    stream: Box<dyn MxfStream>,
    min_llen: u8,
    runin_len: u16,
}

impl MxfFile {
    /// Wrap a stream in a file handle.
    pub fn new(stream: Box<dyn MxfStream>) -> Self {
        MxfFile {
            stream,
            min_llen: 1,
            runin_len: 0,
        }
    }

    /// Create a new disk file, truncating existing content.
    pub fn open_disk_new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Box::new(DiskStream::open_new(path)?)))
    }

    /// Open a disk file read-only.
    pub fn open_disk_read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Box::new(DiskStream::open_read(path)?)))
    }

    /// Open a disk file for reading and in-place modification.
    pub fn open_disk_modify<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Box::new(DiskStream::open_modify(path)?)))
    }

    /// Create a file over an empty in-memory stream.
    pub fn memory() -> Self {
        Self::new(Box::new(MemoryStream::new()))
    }

    /// Minimum BER length size used when encoding lengths.
    pub fn min_llen(&self) -> u8 {
        self.min_llen
    }

    /// Set the minimum BER length size (clamped to 1..=9).
    pub fn set_min_llen(&mut self, llen: u8) {
        self.min_llen = llen.clamp(1, 9);
    }

    /// Length of the vendor run-in preceding the header partition.
    pub fn runin_len(&self) -> u16 {
        self.runin_len
    }

    /// Record the run-in length discovered when scanning for the header.
    pub fn set_runin_len(&mut self, runin_len: u16) {
        self.runin_len = runin_len;
    }

    /// Read up to `buf.len()` bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.stream.read(buf)?)
    }

    /// Read exactly `buf.len()` bytes or fail with `ShortRead`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut total_read = 0usize;
        while total_read < buf.len() {
            let num_read = self.stream.read(&mut buf[total_read..])?;
            if num_read == 0 {
                return Err(MxfError::short_read(buf.len() as u64, total_read as u64));
            }
            total_read += num_read;
        }
        Ok(())
    }

    /// Write all of `buf` or fail with `ShortRead`.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut total_written = 0usize;
        while total_written < buf.len() {
            let num_written = self.stream.write(&buf[total_written..])?;
            if num_written == 0 {
                return Err(MxfError::short_read(
                    buf.len() as u64,
                    total_written as u64,
                ));
            }
            total_written += num_written;
        }
        Ok(())
    }

    /// Reposition the stream.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.stream.seek(pos)?)
    }

    /// Current stream position.
    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.stream.tell()?)
    }

    /// Total stream size.
    pub fn size(&mut self) -> Result<u64> {
        Ok(self.stream.size()?)
    }

    /// True when positioned at or beyond end of stream.
    pub fn eof(&mut self) -> Result<bool> {
        Ok(self.stream.eof()?)
    }

    /// True if the underlying stream supports seeking.
    pub fn is_seekable(&self) -> bool {
        self.stream.is_seekable()
    }

    /// Advance past `len` bytes, seeking when possible and reading and
    /// discarding otherwise.
    pub fn skip(&mut self, len: u64) -> Result<()> {
        if self.stream.is_seekable() {
            self.stream.seek(SeekFrom::Current(len as i64))?;
            return Ok(());
        }

        let mut buffer = [0u8; SKIP_BUFFER_SIZE];
        let mut total_read = 0u64;
        while total_read < len {
            let num_read = (len - total_read).min(SKIP_BUFFER_SIZE as u64) as usize;
            self.read_exact(&mut buffer[..num_read])?;
            total_read += num_read as u64;
        }
        Ok(())
    }

    /// Write `len` zero bytes.
    pub fn write_zeros(&mut self, len: u64) -> Result<()> {
        let mut remaining = len;
        while remaining > 0 {
            let num_write = remaining.min(ZEROS_BUFFER.len() as u64) as usize;
            self.write_all(&ZEROS_BUFFER[..num_write])?;
            remaining -= num_write as u64;
        }
        Ok(())
    }

    // --- big-endian primitive integers ---

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(BigEndian::read_u16(&buf))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(BigEndian::read_u32(&buf))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(BigEndian::read_u64(&buf))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_all(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, value);
        self.write_all(&buf)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, value);
        self.write_all(&buf)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; 8];
        BigEndian::write_u64(&mut buf, value);
        self.write_all(&buf)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_u16(value as u16)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_u32(value as u32)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_u64(value as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_int_round_trip() {
        let mut file = MxfFile::memory();
        file.write_u8(0xab).unwrap();
        file.write_u16(0x1234).unwrap();
        file.write_u32(0xdead_beef).unwrap();
        file.write_u64(0x0102_0304_0506_0708).unwrap();
        file.write_i8(-5).unwrap();
        file.write_i32(-100_000).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(file.read_u8().unwrap(), 0xab);
        assert_eq!(file.read_u16().unwrap(), 0x1234);
        assert_eq!(file.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(file.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(file.read_i8().unwrap(), -5);
        assert_eq!(file.read_i32().unwrap(), -100_000);
    }

    #[test]
    fn test_integers_are_big_endian_on_the_wire() {
        let mut file = MxfFile::memory();
        file.write_u32(0x0102_0304).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = [0u8; 4];
        file.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_read_exact_short_read() {
        let mut file = MxfFile::memory();
        file.write_all(b"abc").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut buf = [0u8; 8];
        let err = file.read_exact(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            MxfError::ShortRead {
                requested: 8,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_skip_and_eof() {
        let mut file = MxfFile::memory();
        file.write_zeros(100).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        file.skip(40).unwrap();
        assert_eq!(file.tell().unwrap(), 40);
        assert!(!file.eof().unwrap());

        file.skip(60).unwrap();
        assert!(file.eof().unwrap());
    }

    #[test]
    fn test_min_llen_clamped() {
        let mut file = MxfFile::memory();
        assert_eq!(file.min_llen(), 1);
        file.set_min_llen(4);
        assert_eq!(file.min_llen(), 4);
        file.set_min_llen(200);
        assert_eq!(file.min_llen(), 9);
        file.set_min_llen(0);
        assert_eq!(file.min_llen(), 1);
    }
}
