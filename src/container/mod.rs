// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! MXF container engine.
//!
//! The KLV primitive codec, the partition pack model, the index table
//! segment codec, essence element streaming and the essence chunk locator.
//! All of it operates on an [`MxfFile`](crate::io::file::MxfFile).

pub mod essence;
pub mod index;
pub mod klv;
pub mod locator;
pub mod partition;

// Re-exports
pub use essence::EssenceElement;
pub use index::{
    DeltaEntry, IndexEntry, IndexEntryLedger, IndexSegmentBuilder, IndexTableSegment, PatchSlot,
};
pub use locator::{EssenceChunk, EssenceChunkIndex, WrappingType};
pub use partition::{Partition, RipEntry};
