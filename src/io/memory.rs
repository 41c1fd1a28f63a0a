// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Growable in-memory stream backend.
//!
//! Used by tests and for building virtual files (e.g. header metadata
//! staging) before copying to disk. Seeking past the end and writing pads
//! the gap with zeros, matching disk file semantics.

use std::io;

use crate::io::stream::{MxfStream, SeekFrom};

/// A stream over an owned, growable byte buffer.
pub struct MemoryStream {
    data: Vec<u8>,
    position: u64,
}

impl MemoryStream {
    /// Create an empty in-memory stream.
    pub fn new() -> Self {
        MemoryStream {
            data: Vec::new(),
            position: 0,
        }
    }

    /// Create a stream positioned at the start of existing content.
    pub fn from_vec(data: Vec<u8>) -> Self {
        MemoryStream { data, position: 0 }
    }

    /// Borrow the underlying bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream and return the underlying bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MxfStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.position as usize;
        if pos >= self.data.len() {
            return Ok(0);
        }
        let num_read = buf.len().min(self.data.len() - pos);
        buf[..num_read].copy_from_slice(&self.data[pos..pos + num_read]);
        self.position += num_read as u64;
        Ok(num_read)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let pos = self.position as usize;
        let end = pos + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[pos..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(buf.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_position = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => self.position as i64 + offset,
            SeekFrom::End(offset) => self.data.len() as i64 + offset,
        };
        if new_position < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream",
            ));
        }
        self.position = new_position as u64;
        Ok(self.position)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_round_trip() {
        let mut stream = MemoryStream::new();
        assert_eq!(stream.write(b"hello").unwrap(), 5);
        stream.seek(SeekFrom::Start(0)).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_seek_past_end_pads_with_zeros() {
        let mut stream = MemoryStream::new();
        stream.seek(SeekFrom::Start(4)).unwrap();
        stream.write(b"x").unwrap();
        assert_eq!(stream.data(), &[0, 0, 0, 0, b'x']);
    }

    #[test]
    fn test_overwrite_in_place() {
        let mut stream = MemoryStream::from_vec(vec![1, 2, 3, 4]);
        stream.seek(SeekFrom::Start(1)).unwrap();
        stream.write(&[9, 9]).unwrap();
        assert_eq!(stream.data(), &[1, 9, 9, 4]);
        assert_eq!(stream.tell().unwrap(), 3);
    }

    #[test]
    fn test_seek_before_start_fails() {
        let mut stream = MemoryStream::new();
        assert!(stream.seek(SeekFrom::Current(-1)).is_err());
    }
}
