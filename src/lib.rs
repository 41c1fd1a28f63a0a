// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # mxfcodec
//!
//! MXF container I/O library: the KLV-based partition, index table and
//! essence container byte engine.
//!
//! The library is organized into three layers:
//! - `core/` - value types (keys, rationals, timestamps), SMPTE key
//!   constants and predicates, and the error type
//! - `io/` - the byte stream abstraction with its backends (disk, memory,
//!   CRC-32 wrapper, write-back cache, read/write interleaver) and the
//!   [`MxfFile`] handle
//! - `container/` - the KLV primitive codec, partition pack model, index
//!   table segment codec, essence element streaming and the essence chunk
//!   locator
//!
//! ## Example: writing a partitioned file
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use mxfcodec::container::partition::{self, Partition};
//! use mxfcodec::core::labels::{PartitionKind, PartitionStatus};
//! use mxfcodec::io::file::MxfFile;
//!
//! let mut file = MxfFile::open_disk_new("out.mxf")?;
//!
//! let mut header = Partition::new(PartitionKind::Header, PartitionStatus::ClosedComplete);
//! header.body_sid = 1;
//! header.write(&mut file)?;
//!
//! // ... essence and index segments ...
//!
//! let mut footer = Partition::new(PartitionKind::Footer, PartitionStatus::ClosedComplete);
//! footer.write(&mut file)?;
//!
//! let mut partitions = vec![header, footer];
//! partition::update_partitions(&mut file, &mut partitions)?;
//! partition::write_rip(&mut file, &partitions)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: random access via the chunk locator
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use mxfcodec::container::locator::{EssenceChunkIndex, WrappingType};
//! use mxfcodec::io::file::MxfFile;
//!
//! # let partitions = vec![];
//! let mut file = MxfFile::open_disk_read("in.mxf")?;
//! let mut chunks =
//!     EssenceChunkIndex::extract(&mut file, &partitions, 1, WrappingType::ClipWrapped, 0)?;
//! let position = chunks.file_position(0x1000)?;
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use crate::core::{BuildInfo, Key, MxfError, OptBool, Rational, Result, Timestamp, Umid};

// I/O layer (stream abstraction, backends, the MxfFile handle)
pub mod io;

pub use io::{MxfFile, MxfStream, RwInterleaver, SeekFrom};

// Container engine (KLV, partitions, index tables, essence)
pub mod container;

pub use container::{
    EssenceChunkIndex, EssenceElement, IndexEntryLedger, IndexSegmentBuilder, IndexTableSegment,
    Partition, WrappingType,
};
