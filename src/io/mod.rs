// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for MXF container data.
//!
//! This module provides the byte stream abstraction, its concrete backends
//! (disk, memory, checksum wrapper, write-back cache, interleaver handles)
//! and the [`MxfFile`](file::MxfFile) handle the container codec operates
//! on. Backends are stackable.

pub mod cache;
pub mod checksum;
pub mod disk;
pub mod file;
pub mod interleave;
pub mod memory;
pub mod stream;

// Re-exports
pub use cache::CacheStream;
pub use checksum::{ChecksumDirection, Crc32Stream};
pub use disk::{DiskStream, StdinStream, StdoutStream};
pub use file::{MxfFile, MAX_RUNIN_LEN};
pub use interleave::{IntlReaderStream, IntlWriterStream, RwInterleaver};
pub use memory::MemoryStream;
pub use stream::{MxfStream, SeekFrom};
