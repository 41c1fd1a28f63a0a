// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Paged write-back cache stream.
//!
//! Buffers writes in a contiguous dirty window and flushes them to the
//! target in whole pages, oldest first. The interleaver drives flushing
//! through [`CacheStream::dirty_count`] and [`CacheStream::flush_up_to`] to
//! hold each writer's data back until the interleave schedule demands it.
//!
//! Writes behind the dirty window (in-place patches of already flushed
//! bytes) pass straight through to the target; writes inside the window
//! modify the cached bytes. The dirty window stays contiguous.

use std::io;

use crate::io::stream::{MxfStream, SeekFrom};

/// Default flush page size.
pub const DEFAULT_PAGE_SIZE: u32 = 8192;

/// A write-back cache over another stream.
pub struct CacheStream {
    target: Box<dyn MxfStream>,
    page_size: u32,
    max_cache_size: u32,
    /// Target position of the first buffered byte.
    base_position: u64,
    /// Contiguous dirty bytes starting at `base_position`.
    buffer: Vec<u8>,
    /// Logical stream position.
    position: u64,
}

impl CacheStream {
    /// Wrap `target` with a write-back cache of at most `max_cache_size`
    /// bytes, flushed in pages of `page_size` (0 selects the default).
    pub fn new(target: Box<dyn MxfStream>, page_size: u32, max_cache_size: u32) -> Self {
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        CacheStream {
            target,
            page_size,
            max_cache_size: max_cache_size.max(page_size),
            base_position: 0,
            buffer: Vec::new(),
            position: 0,
        }
    }

    /// Number of dirty bytes pending flush.
    pub fn dirty_count(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Flush whole pages from the front of the dirty window until at least
    /// `max` bytes have been flushed or no dirty bytes remain. The final
    /// page may exceed `max`; the byte count actually flushed is returned.
    pub fn flush_up_to(&mut self, max: u64) -> io::Result<u64> {
        let mut flushed = 0u64;
        while !self.buffer.is_empty() && flushed < max {
            let num_flush = (self.page_size as usize).min(self.buffer.len());
            self.target.seek(SeekFrom::Start(self.base_position))?;
            write_all(&mut self.target, &self.buffer[..num_flush])?;
            self.buffer.drain(..num_flush);
            self.base_position += num_flush as u64;
            flushed += num_flush as u64;
        }
        Ok(flushed)
    }

    /// Flush the entire dirty window.
    pub fn flush_all(&mut self) -> io::Result<()> {
        self.flush_up_to(u64::MAX)?;
        Ok(())
    }

    fn buffer_end(&self) -> u64 {
        self.base_position + self.buffer.len() as u64
    }

    /// Flush pages until the dirty window fits the configured budget.
    fn enforce_cache_size(&mut self) -> io::Result<()> {
        if self.buffer.len() > self.max_cache_size as usize {
            let excess = self.buffer.len() as u64 - self.max_cache_size as u64;
            self.flush_up_to(excess)?;
        }
        Ok(())
    }
}

fn write_all(target: &mut Box<dyn MxfStream>, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        let num_written = target.write(data)?;
        if num_written == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "cache flush wrote zero bytes",
            ));
        }
        data = &data[num_written..];
    }
    Ok(())
}

impl MxfStream for CacheStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total_read = 0usize;
        while total_read < buf.len() {
            let pos = self.position;
            let remaining = &mut buf[total_read..];

            let num_read = if !self.buffer.is_empty()
                && pos >= self.base_position
                && pos < self.buffer_end()
            {
                // serve from the dirty window
                let offset = (pos - self.base_position) as usize;
                let available = self.buffer.len() - offset;
                let num_read = remaining.len().min(available);
                remaining[..num_read].copy_from_slice(&self.buffer[offset..offset + num_read]);
                num_read
            } else {
                // serve from the target, bounded by the dirty window start
                let limit = if pos < self.base_position && !self.buffer.is_empty() {
                    remaining.len().min((self.base_position - pos) as usize)
                } else {
                    remaining.len()
                };
                self.target.seek(SeekFrom::Start(pos))?;
                let num_read = self.target.read(&mut remaining[..limit])?;
                if num_read == 0 {
                    break;
                }
                num_read
            };

            self.position += num_read as u64;
            total_read += num_read;
        }
        Ok(total_read)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut total_written = 0usize;
        while total_written < buf.len() {
            let pos = self.position;
            let remaining = &buf[total_written..];

            let num_written = if self.buffer.is_empty() || pos == self.buffer_end() {
                // start or extend the dirty window
                if self.buffer.is_empty() {
                    self.base_position = pos;
                }
                self.buffer.extend_from_slice(remaining);
                remaining.len()
            } else if pos >= self.base_position && pos < self.buffer_end() {
                // overwrite inside the dirty window, extending if needed
                let offset = (pos - self.base_position) as usize;
                let overlap = (self.buffer.len() - offset).min(remaining.len());
                self.buffer[offset..offset + overlap].copy_from_slice(&remaining[..overlap]);
                if overlap < remaining.len() {
                    self.buffer.extend_from_slice(&remaining[overlap..]);
                }
                remaining.len()
            } else if pos < self.base_position {
                // patch already flushed bytes, bounded by the window start
                let limit = remaining.len().min((self.base_position - pos) as usize);
                self.target.seek(SeekFrom::Start(pos))?;
                let num_written = self.target.write(&remaining[..limit])?;
                if num_written == 0 {
                    break;
                }
                num_written
            } else {
                // forward gap: flush and restart the window at the new position
                self.flush_all()?;
                self.base_position = pos;
                self.buffer.extend_from_slice(remaining);
                remaining.len()
            };

            self.position += num_written as u64;
            total_written += num_written;
        }
        self.enforce_cache_size()?;
        Ok(total_written)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_position = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => self.position as i64 + offset,
            SeekFrom::End(offset) => self.size()? as i64 + offset,
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
        self.target.is_seekable()
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.target.size()?.max(self.buffer_end()))
    }
}

impl Drop for CacheStream {
    fn drop(&mut self) {
        let _ = self.flush_all();
    }
}
