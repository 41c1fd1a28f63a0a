// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Disk file and standard stream backends.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use crate::io::stream::{unsupported_seek, MxfStream, SeekFrom};

/// A disk-file backed stream.
pub struct DiskStream {
    file: File,
}

impl DiskStream {
    /// Create a new file, truncating any existing content. The file is
    /// opened read/write so partition packs can be rewritten in place.
    pub fn open_new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(DiskStream { file })
    }

    /// Open an existing file read-only.
    pub fn open_read<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(DiskStream { file })
    }

    /// Open an existing file for reading and in-place modification.
    pub fn open_modify<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(DiskStream { file })
    }
}

impl MxfStream for DiskStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// Standard input wrapped as a read-only, non-seekable stream.
pub struct StdinStream {
    position: u64,
    at_eof: bool,
}

impl StdinStream {
    pub fn new() -> Self {
        StdinStream {
            position: 0,
            at_eof: false,
        }
    }
}

impl Default for StdinStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MxfStream for StdinStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let num_read = io::stdin().lock().read(buf)?;
        self.position += num_read as u64;
        if num_read == 0 && !buf.is_empty() {
            self.at_eof = true;
        }
        Ok(num_read)
    }

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stdin stream is read-only",
        ))
    }

    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(unsupported_seek())
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn size(&mut self) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stdin stream has no known size",
        ))
    }

    fn eof(&mut self) -> io::Result<bool> {
        Ok(self.at_eof)
    }
}

/// Standard output wrapped as a write-only, non-seekable stream.
pub struct StdoutStream {
    position: u64,
}

impl StdoutStream {
    pub fn new() -> Self {
        StdoutStream { position: 0 }
    }
}

impl Default for StdoutStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MxfStream for StdoutStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stdout stream is write-only",
        ))
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let num_written = io::stdout().lock().write(buf)?;
        self.position += num_written as u64;
        Ok(num_written)
    }

    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(unsupported_seek())
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }

    fn eof(&mut self) -> io::Result<bool> {
        Ok(true)
    }
}
