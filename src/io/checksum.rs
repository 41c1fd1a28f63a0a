// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CRC-32 computing passthrough stream.
//!
//! Wraps another stream and folds every byte transferred in the hashed
//! direction into a running CRC-32. The checksum covers bytes in transfer
//! order; rewrites after a backward seek are folded in again, so the
//! checksum of a file written with in-place patches differs from the
//! checksum of the final file content. Callers that need a content checksum
//! should wrap a linear (no-seek-back) writer, which all streaming essence
//! paths are.

use std::io;

use crc32fast::Hasher;

use crate::io::stream::{MxfStream, SeekFrom};

/// Which transfer direction feeds the checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumDirection {
    Read,
    Write,
}

/// A passthrough stream computing a CRC-32 over transferred bytes.
pub struct Crc32Stream<S: MxfStream> {
    inner: S,
    hasher: Hasher,
    direction: ChecksumDirection,
}

impl<S: MxfStream> Crc32Stream<S> {
    /// Wrap a stream, hashing bytes in the given direction.
    pub fn new(inner: S, direction: ChecksumDirection) -> Self {
        Crc32Stream {
            inner,
            hasher: Hasher::new(),
            direction,
        }
    }

    /// Current checksum over the bytes transferred so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Unwrap the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: MxfStream> MxfStream for Crc32Stream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let num_read = self.inner.read(buf)?;
        if self.direction == ChecksumDirection::Read {
            self.hasher.update(&buf[..num_read]);
        }
        Ok(num_read)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let num_written = self.inner.write(buf)?;
        if self.direction == ChecksumDirection::Write {
            self.hasher.update(&buf[..num_written]);
        }
        Ok(num_written)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.inner.tell()
    }

    fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    fn size(&mut self) -> io::Result<u64> {
        self.inner.size()
    }

    fn eof(&mut self) -> io::Result<bool> {
        self.inner.eof()
    }
}
