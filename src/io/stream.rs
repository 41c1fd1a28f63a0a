// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Byte stream abstraction consumed by all container components.
//!
//! Concrete backends (disk file, in-memory buffer, checksum wrapper, paged
//! write-back cache, interleaver handles) implement [`MxfStream`] and may be
//! stacked, e.g. an interleaver handle wrapping a checksum wrapper wrapping
//! a disk file.
//!
//! Methods use `std::io` error types so backends compose with the standard
//! library; the [`MxfFile`](crate::io::file::MxfFile) handle converts
//! failures into [`MxfError`](crate::core::error::MxfError) at the API
//! boundary.

use std::io;

pub use std::io::SeekFrom;

/// A positioned, optionally seekable byte stream.
///
/// All operations are blocking; the library imposes no timeouts. A stream
/// that cannot seek (e.g. a pipe) reports `is_seekable() == false` and fails
/// `seek` with [`io::ErrorKind::Unsupported`].
pub trait MxfStream: Send {
    /// Read up to `buf.len()` bytes; returns the number read (0 at EOF).
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write up to `buf.len()` bytes; returns the number written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Reposition the stream.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Current position.
    fn tell(&mut self) -> io::Result<u64>;

    /// True if `seek` is supported.
    fn is_seekable(&self) -> bool;

    /// Total stream size in bytes.
    fn size(&mut self) -> io::Result<u64>;

    /// True when positioned at or beyond the end of the stream.
    fn eof(&mut self) -> io::Result<bool> {
        Ok(self.tell()? >= self.size()?)
    }
}

impl MxfStream for Box<dyn MxfStream> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (**self).seek(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        (**self).tell()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn size(&mut self) -> io::Result<u64> {
        (**self).size()
    }

    fn eof(&mut self) -> io::Result<bool> {
        (**self).eof()
    }
}

/// Error for seek attempts on non-seekable backends.
pub(crate) fn unsupported_seek() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "stream is not seekable")
}
