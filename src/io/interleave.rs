// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Read/write interleaver.
//!
//! Presents N logical writers as independent streams and multiplexes their
//! bytes into one shared physical target in `block_size`-sized round-robin
//! slices. Each writer accumulates dirty bytes in a FIFO cache; a reader
//! handle opened on the same target triggers one flush round per
//! `block_size` bytes it consumes, visiting writers round-robin, so written
//! data lands in the file in bounded interleave units without the
//! application scheduling writes itself.
//!
//! Each flush appends one contiguous extent to the target and records the
//! logical-to-physical mapping, so a writer can still seek back and patch
//! bytes that have already been flushed (unknown-length essence finalize,
//! temporal offset backpatches). Relative ordering between writers is
//! guaranteed only at block granularity; within one writer, bytes keep
//! their write order.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::core::error::MxfError;
use crate::io::stream::{MxfStream, SeekFrom};

/// One flushed run of a writer's bytes in the physical target.
#[derive(Debug, Clone, Copy)]
struct Extent {
    logical_start: u64,
    physical_start: u64,
    len: u64,
}

/// Per-writer FIFO cache with a ledger of flushed extents.
struct WriterCache {
    /// Dirty bytes not yet in the target.
    pending: Vec<u8>,
    /// Logical offset of `pending[0]`; equals the flushed byte count.
    flushed_len: u64,
    extents: Vec<Extent>,
    /// This writer's logical stream position.
    position: u64,
}

impl WriterCache {
    fn new() -> Self {
        WriterCache {
            pending: Vec::new(),
            flushed_len: 0,
            extents: Vec::new(),
            position: 0,
        }
    }

    fn logical_size(&self) -> u64 {
        self.flushed_len + self.pending.len() as u64
    }

    fn dirty_count(&self) -> u64 {
        self.pending.len() as u64
    }

    /// Translate a logical offset inside the flushed region to the
    /// physical target offset.
    fn physical_offset(&self, logical: u64) -> Option<u64> {
        self.extents
            .iter()
            .find(|extent| {
                logical >= extent.logical_start && logical < extent.logical_start + extent.len
            })
            .map(|extent| extent.physical_start + (logical - extent.logical_start))
    }
}

struct IntlShared {
    block_size: u32,
    writer_cache_size: u32,
    target: Box<dyn MxfStream>,
    /// Bytes delivered to readers so far.
    read_count: u64,
    writers: Vec<WriterCache>,
    /// Round-robin cursor: index of the writer flushed last.
    last_writer_flush: usize,
}

impl IntlShared {
    fn have_writer_data(&self) -> bool {
        self.writers.iter().any(|w| w.dirty_count() > 0)
    }

    /// Append up to `max` pending bytes of one writer to the target as one
    /// extent; returns the byte count flushed.
    fn flush_writer(&mut self, writer_index: usize, max: u64) -> io::Result<u64> {
        let IntlShared {
            writers, target, ..
        } = self;
        let writer = &mut writers[writer_index];

        let num_flush = (writer.pending.len() as u64).min(max) as usize;
        if num_flush == 0 {
            return Ok(0);
        }

        let physical_start = target.seek(SeekFrom::End(0))?;
        write_all(target, &writer.pending[..num_flush])?;

        writer.extents.push(Extent {
            logical_start: writer.flushed_len,
            physical_start,
            len: num_flush as u64,
        });
        writer.pending.drain(..num_flush);
        writer.flushed_len += num_flush as u64;

        Ok(num_flush as u64)
    }

    /// One flush round: visit writers round-robin starting after the last
    /// one flushed, flushing up to `block_size` bytes in total.
    fn flush_writer_data(&mut self) -> io::Result<()> {
        let num_writers = self.writers.len();
        if num_writers == 0 {
            return Ok(());
        }

        let mut flush_rem = self.block_size as u64;
        let mut writer_index = (self.last_writer_flush + 1) % num_writers;

        for _ in 0..num_writers {
            if self.writers[writer_index].dirty_count() > 0 {
                let num_flush = self.flush_writer(writer_index, flush_rem)?;
                if num_flush == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "writer cache flushed zero bytes",
                    ));
                }

                self.last_writer_flush = writer_index;
                if flush_rem <= num_flush {
                    break;
                }
                flush_rem -= num_flush;
            }

            writer_index = (writer_index + 1) % num_writers;
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
                "interleave flush wrote zero bytes",
            ));
        }
        data = &data[num_written..];
    }
    Ok(())
}

fn lock_state(state: &Arc<Mutex<IntlShared>>) -> io::Result<MutexGuard<'_, IntlShared>> {
    state
        .lock()
        .map_err(|e| io::Error::other(format!("interleaver state lock poisoned: {e}")))
}

/// Interleaver coordinating N cached writers and readers over one target.
pub struct RwInterleaver {
    state: Arc<Mutex<IntlShared>>,
}

impl RwInterleaver {
    /// Create an interleaver over `target` with the given block size
    /// (interleave granularity) and per-writer cache budget.
    pub fn new(block_size: u32, writer_cache_size: u32, target: Box<dyn MxfStream>) -> Self {
        RwInterleaver {
            state: Arc::new(Mutex::new(IntlShared {
                block_size: block_size.max(1),
                writer_cache_size: writer_cache_size.max(1),
                target,
                read_count: 0,
                writers: Vec::new(),
                last_writer_flush: 0,
            })),
        }
    }

    /// Register a logical writer.
    pub fn open_writer(&self) -> io::Result<IntlWriterStream> {
        let mut state = lock_state(&self.state)?;
        state.writers.push(WriterCache::new());
        Ok(IntlWriterStream {
            state: Arc::clone(&self.state),
            index: state.writers.len() - 1,
        })
    }

    /// Open a reader on the physical target. Every `block_size` bytes read
    /// triggers one flush round across writers with pending data.
    pub fn open_reader(&self) -> IntlReaderStream {
        IntlReaderStream {
            state: Arc::clone(&self.state),
            position: 0,
        }
    }

    /// Flush all writers to the target in block-sized round-robin slices.
    /// Used when closing without a reader driving the interleave.
    pub fn flush_all(&self) -> io::Result<()> {
        let mut state = lock_state(&self.state)?;
        while state.have_writer_data() {
            state.flush_writer_data()?;
        }
        Ok(())
    }
}

/// Writer-side handle: an independent logical stream.
pub struct IntlWriterStream {
    state: Arc<Mutex<IntlShared>>,
    index: usize,
}

impl MxfStream for IntlWriterStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = lock_state(&self.state)?;
        let IntlShared {
            writers, target, ..
        } = &mut *state;
        let writer = &mut writers[self.index];
        let position = writer.position;

        if position >= writer.logical_size() {
            return Ok(0);
        }

        if position >= writer.flushed_len {
            // serve from the pending FIFO
            let offset = (position - writer.flushed_len) as usize;
            let num_read = buf.len().min(writer.pending.len() - offset);
            buf[..num_read].copy_from_slice(&writer.pending[offset..offset + num_read]);
            writer.position += num_read as u64;
            return Ok(num_read);
        }

        // serve from a flushed extent, one extent at a time
        let Some(physical) = writer.physical_offset(position) else {
            return Err(io::Error::other("flushed extent missing for logical offset"));
        };
        let extent_rem = writer
            .extents
            .iter()
            .find(|e| position >= e.logical_start && position < e.logical_start + e.len)
            .map(|e| e.logical_start + e.len - position)
            .unwrap_or(0);
        let num_read = buf.len().min(extent_rem as usize);
        target.seek(SeekFrom::Start(physical))?;
        let num_actual = target.read(&mut buf[..num_read])?;
        writer.position += num_actual as u64;
        Ok(num_actual)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = lock_state(&self.state)?;
        let cache_budget = state.writer_cache_size as u64;
        let mut total_written = 0usize;

        {
            let IntlShared {
                writers, target, ..
            } = &mut *state;
            let writer = &mut writers[self.index];
            let mut position = writer.position;

            while total_written < buf.len() {
                let remaining = &buf[total_written..];

                let num_written = if position >= writer.flushed_len {
                    // inside or at the end of the pending FIFO
                    let offset = (position - writer.flushed_len) as usize;
                    if offset > writer.pending.len() {
                        // forward gap: pad with zeros
                        writer.pending.resize(offset, 0);
                    }
                    let overlap = (writer.pending.len() - offset).min(remaining.len());
                    writer.pending[offset..offset + overlap]
                        .copy_from_slice(&remaining[..overlap]);
                    if overlap < remaining.len() {
                        writer.pending.extend_from_slice(&remaining[overlap..]);
                    }
                    remaining.len()
                } else {
                    // patch an already flushed extent in place
                    let Some(physical) = writer.physical_offset(position) else {
                        return Err(io::Error::other(
                            "flushed extent missing for logical offset",
                        ));
                    };
                    let extent_rem = writer
                        .extents
                        .iter()
                        .find(|e| {
                            position >= e.logical_start && position < e.logical_start + e.len
                        })
                        .map(|e| e.logical_start + e.len - position)
                        .unwrap_or(0);
                    let num_write = remaining.len().min(extent_rem as usize);
                    target.seek(SeekFrom::Start(physical))?;
                    write_all(target, &remaining[..num_write])?;
                    num_write
                };

                position += num_written as u64;
                total_written += num_written;
                writer.position = position;
            }
        }

        // keep the pending FIFO within budget, degrading interleave
        // granularity rather than growing without bound
        while state.writers[self.index].dirty_count() > cache_budget {
            let excess = state.writers[self.index].dirty_count() - cache_budget;
            if state.flush_writer(self.index, excess)? == 0 {
                break;
            }
        }

        Ok(total_written)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut state = lock_state(&self.state)?;
        let writer = &mut state.writers[self.index];
        let new_position = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => writer.position as i64 + offset,
            SeekFrom::End(offset) => writer.logical_size() as i64 + offset,
        };
        if new_position < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream",
            ));
        }
        writer.position = new_position as u64;
        Ok(writer.position)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(lock_state(&self.state)?.writers[self.index].position)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(lock_state(&self.state)?.writers[self.index].logical_size())
    }
}

/// Reader-side handle: reads the physical target and advances writer flush
/// state at block boundaries.
pub struct IntlReaderStream {
    state: Arc<Mutex<IntlShared>>,
    position: u64,
}

impl MxfStream for IntlReaderStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = buf.len();
        let mut rem_count = count;

        let (block_size, mut flush_count) = {
            let state = lock_state(&self.state)?;
            let block_size = state.block_size as usize;
            let flush_count =
                ((state.read_count % block_size as u64) + count as u64) / block_size as u64;
            (block_size, flush_count)
        };

        while rem_count > 0 {
            let mut flush_writer = false;
            let num_read = if flush_count > 0 {
                if lock_state(&self.state)?.have_writer_data() {
                    flush_writer = true;
                    rem_count.min(block_size)
                } else {
                    flush_count = 0;
                    rem_count
                }
            } else {
                rem_count
            };

            let num_actual_read = {
                let mut state = lock_state(&self.state)?;
                state.target.seek(SeekFrom::Start(self.position))?;
                let num_actual = state.target.read(&mut buf[count - rem_count..][..num_read])?;
                state.read_count += num_actual as u64;
                num_actual
            };
            self.position += num_actual_read as u64;
            rem_count -= num_actual_read;

            if flush_writer {
                if let Err(err) = lock_state(&self.state)?.flush_writer_data() {
                    warn!(
                        error = %err,
                        "interleaved read failed because writer cache data flush failed"
                    );
                    return Err(io::Error::other(MxfError::InterleaveFlushFailed));
                }
                flush_count -= 1;
            }

            if num_actual_read != num_read {
                break;
            }
        }

        Ok(count - rem_count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = lock_state(&self.state)?;
        state.target.seek(SeekFrom::Start(self.position))?;
        let num_written = state.target.write(buf)?;
        self.position += num_written as u64;
        Ok(num_written)
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
        true
    }

    fn size(&mut self) -> io::Result<u64> {
        lock_state(&self.state)?.target.size()
    }
}
