// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Index table segment codec.
//!
//! A segment maps edit-unit positions to byte offsets in one of two shapes,
//! selected by `edit_unit_byte_count`:
//!
//! - **CBE** (constant bytes per edit unit, `edit_unit_byte_count != 0`):
//!   the segment carries *delta entries* (6 bytes each) describing slice
//!   offsets within the constant-size edit unit.
//! - **VBE** (`edit_unit_byte_count == 0`): the segment carries *index
//!   entries* of `11 + 4 * slice_count + 8 * pos_table_count` bytes each,
//!   one per edit unit.
//!
//! Exactly one of the two entry arrays is populated per segment.
//!
//! The wire format is a local set: (u16 tag, u16 len) items after the
//! segment KL. The fixed header (the always-present items) is 80 bytes.
//! Entry arrays embed a u32 count and u32 element length before the
//! entries. Avid products ignore the local set's 16-bit length restriction
//! for the index entry array and rely on the embedded count; writers target
//! that layout only via the explicit
//! [`write_avid_index_entry_array_header`] opt-in.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::core::error::{MxfError, Result};
use crate::core::labels::INDEX_TABLE_SEGMENT_KEY;
use crate::core::types::{OptBool, Rational};
use crate::io::file::MxfFile;
use crate::io::stream::SeekFrom;

/// Size of the always-present local set items.
const FIXED_HEADER_LEN: u64 = 80;

/// Fixed portion of an index entry (temporal offset, key frame offset,
/// flags, stream offset).
pub const INDEX_ENTRY_FIXED_LEN: u32 = 11;

/// Size of one delta entry on the wire.
pub const DELTA_ENTRY_LEN: u32 = 6;

// local set item tags
const TAG_INSTANCE_UID: u16 = 0x3c0a;
const TAG_INDEX_EDIT_RATE: u16 = 0x3f0b;
const TAG_INDEX_START_POSITION: u16 = 0x3f0c;
const TAG_INDEX_DURATION: u16 = 0x3f0d;
const TAG_EDIT_UNIT_BYTE_COUNT: u16 = 0x3f05;
const TAG_INDEX_SID: u16 = 0x3f06;
const TAG_BODY_SID: u16 = 0x3f07;
const TAG_SLICE_COUNT: u16 = 0x3f08;
const TAG_POS_TABLE_COUNT: u16 = 0x3f0e;
const TAG_EXT_START_OFFSET: u16 = 0x3f0f;
const TAG_VBE_BYTE_COUNT: u16 = 0x3f10;
const TAG_SINGLE_INDEX_LOCATION: u16 = 0x3f11;
const TAG_SINGLE_ESSENCE_LOCATION: u16 = 0x3f12;
const TAG_FORWARD_INDEX_DIRECTION: u16 = 0x3f13;
const TAG_DELTA_ENTRY_ARRAY: u16 = 0x3f09;
const TAG_INDEX_ENTRY_ARRAY: u16 = 0x3f0a;

/// One CBE delta entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeltaEntry {
    /// Index into the pos table, or -1 when no pos table applies.
    pub pos_table_index: i8,
    pub slice: u8,
    /// Byte offset of this slice within the edit unit.
    pub element_data: u32,
}

/// One VBE index entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexEntry {
    /// Signed frame-reordering offset.
    pub temporal_offset: i8,
    pub key_frame_offset: i8,
    pub flags: u8,
    /// Byte offset of this edit unit within the body stream.
    pub stream_offset: u64,
    /// One offset per slice; length equals the segment's `slice_count`.
    pub slice_offset: Vec<u32>,
    /// One rational per pos table; length equals `pos_table_count`.
    pub pos_table: Vec<Rational>,
}

/// An index table segment.
#[derive(Debug, Clone, Serialize)]
pub struct IndexTableSegment {
    pub instance_uid: Uuid,
    pub index_edit_rate: Rational,
    /// First edit-unit position covered.
    pub index_start_position: i64,
    /// Edit units covered; 0 means unbounded for CBE.
    pub index_duration: i64,
    /// Nonzero selects CBE; zero selects VBE.
    pub edit_unit_byte_count: u32,
    pub index_sid: u32,
    pub body_sid: u32,
    pub slice_count: u8,
    pub pos_table_count: u8,
    pub ext_start_offset: u64,
    pub vbe_byte_count: u64,
    pub single_index_location: OptBool,
    pub single_essence_location: OptBool,
    pub forward_index_direction: OptBool,
    /// Write the slice count item even without an index entry array.
    pub force_write_slice_count: bool,
    /// Write duration 0 for CBE segments regardless of `index_duration`.
    pub force_write_cbe_duration0: bool,
    pub delta_entries: Vec<DeltaEntry>,
    pub index_entries: Vec<IndexEntry>,
}

impl Default for IndexTableSegment {
    fn default() -> Self {
        IndexTableSegment {
            instance_uid: Uuid::nil(),
            index_edit_rate: Rational::default(),
            index_start_position: 0,
            index_duration: 0,
            edit_unit_byte_count: 0,
            index_sid: 0,
            body_sid: 0,
            slice_count: 0,
            pos_table_count: 0,
            ext_start_offset: 0,
            vbe_byte_count: 0,
            single_index_location: OptBool::NotPresent,
            single_essence_location: OptBool::NotPresent,
            forward_index_direction: OptBool::NotPresent,
            force_write_slice_count: false,
            force_write_cbe_duration0: false,
            delta_entries: Vec::new(),
            index_entries: Vec::new(),
        }
    }
}

impl IndexTableSegment {
    /// Create an empty segment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of one index entry given this segment's slice and pos table
    /// counts.
    pub fn index_entry_len(&self) -> u32 {
        INDEX_ENTRY_FIXED_LEN + self.slice_count as u32 * 4 + self.pos_table_count as u32 * 8
    }

    /// Byte length of the segment value for the given entry counts.
    fn value_len(&self, num_delta_entries: u64, num_index_entries: u64) -> u64 {
        let mut len = FIXED_HEADER_LEN;
        if num_delta_entries > 0 {
            len += 12 + num_delta_entries * DELTA_ENTRY_LEN as u64;
        }
        if num_index_entries > 0 {
            // includes the SliceCount and PosTableCount items
            len += 22 + num_index_entries * self.index_entry_len() as u64;
        } else if self.force_write_slice_count {
            len += 5;
        }
        if self.ext_start_offset != 0 {
            len += 12;
        }
        if self.vbe_byte_count != 0 {
            len += 12;
        }
        if self.single_index_location.is_present() {
            len += 5;
        }
        if self.single_essence_location.is_present() {
            len += 5;
        }
        if self.forward_index_direction.is_present() {
            len += 5;
        }
        len
    }

    /// Byte length of the segment value with the populated entry arrays.
    pub fn segment_len(&self) -> u64 {
        self.value_len(self.delta_entries.len() as u64, self.index_entries.len() as u64)
    }

    fn check_entry_invariant(&self) -> Result<()> {
        if !self.delta_entries.is_empty() && !self.index_entries.is_empty() {
            return Err(MxfError::corrupt_index(
                "segment",
                "both delta and index entry arrays are populated",
            ));
        }
        for entry in &self.index_entries {
            if entry.slice_offset.len() != self.slice_count as usize
                || entry.pos_table.len() != self.pos_table_count as usize
            {
                return Err(MxfError::corrupt_index(
                    "segment",
                    "index entry slice or pos table length does not match segment counts",
                ));
            }
        }
        Ok(())
    }

    /// Write the segment KL, fixed items and optional items, declaring the
    /// given entry counts. Entries are not written; streaming writers
    /// append them with [`write_delta_entry`] / [`write_index_entry`] after
    /// the matching array header.
    pub fn write_header(
        &self,
        file: &mut MxfFile,
        num_delta_entries: u32,
        num_index_entries: u32,
    ) -> Result<()> {
        let segment_len = self.value_len(num_delta_entries as u64, num_index_entries as u64);
        file.write_kl(&INDEX_TABLE_SEGMENT_KEY, segment_len)?;

        file.write_local_tl(TAG_INSTANCE_UID, 16)?;
        file.write_all(self.instance_uid.as_bytes())?;
        file.write_local_tl(TAG_INDEX_EDIT_RATE, 8)?;
        file.write_i32(self.index_edit_rate.numerator)?;
        file.write_i32(self.index_edit_rate.denominator)?;
        file.write_local_tl(TAG_INDEX_START_POSITION, 8)?;
        file.write_i64(self.index_start_position)?;
        file.write_local_tl(TAG_INDEX_DURATION, 8)?;
        let duration = if num_index_entries > 0 || !self.force_write_cbe_duration0 {
            self.index_duration
        } else {
            0
        };
        file.write_i64(duration)?;
        file.write_local_tl(TAG_EDIT_UNIT_BYTE_COUNT, 4)?;
        file.write_u32(self.edit_unit_byte_count)?;
        file.write_local_tl(TAG_INDEX_SID, 4)?;
        file.write_u32(self.index_sid)?;
        file.write_local_tl(TAG_BODY_SID, 4)?;
        file.write_u32(self.body_sid)?;

        if num_index_entries > 0 {
            file.write_local_tl(TAG_SLICE_COUNT, 1)?;
            file.write_u8(self.slice_count)?;
            file.write_local_tl(TAG_POS_TABLE_COUNT, 1)?;
            file.write_u8(self.pos_table_count)?;
        } else if self.force_write_slice_count {
            file.write_local_tl(TAG_SLICE_COUNT, 1)?;
            file.write_u8(self.slice_count)?;
        }
        if self.ext_start_offset != 0 {
            file.write_local_tl(TAG_EXT_START_OFFSET, 8)?;
            file.write_u64(self.ext_start_offset)?;
        }
        if self.vbe_byte_count != 0 {
            file.write_local_tl(TAG_VBE_BYTE_COUNT, 8)?;
            file.write_u64(self.vbe_byte_count)?;
        }
        if self.single_index_location.is_present() {
            file.write_local_tl(TAG_SINGLE_INDEX_LOCATION, 1)?;
            file.write_u8(self.single_index_location.wire_value())?;
        }
        if self.single_essence_location.is_present() {
            file.write_local_tl(TAG_SINGLE_ESSENCE_LOCATION, 1)?;
            file.write_u8(self.single_essence_location.wire_value())?;
        }
        if self.forward_index_direction.is_present() {
            file.write_local_tl(TAG_FORWARD_INDEX_DIRECTION, 1)?;
            file.write_u8(self.forward_index_direction.wire_value())?;
        }

        Ok(())
    }

    /// Write the complete segment: header, array headers and entries.
    pub fn write_to(&self, file: &mut MxfFile) -> Result<()> {
        self.check_entry_invariant()?;

        self.write_header(
            file,
            self.delta_entries.len() as u32,
            self.index_entries.len() as u32,
        )?;

        if !self.delta_entries.is_empty() {
            write_delta_entry_array_header(file, self.delta_entries.len() as u32)?;
            for entry in &self.delta_entries {
                write_delta_entry(file, entry)?;
            }
        }
        if !self.index_entries.is_empty() {
            write_index_entry_array_header(
                file,
                self.slice_count,
                self.pos_table_count,
                self.index_entries.len() as u32,
            )?;
            for entry in &self.index_entries {
                write_index_entry(file, entry)?;
            }
        }

        Ok(())
    }

    /// Read a segment whose KL has already been consumed; `segment_len` is
    /// the declared value length.
    pub fn read_from(file: &mut MxfFile, segment_len: u64) -> Result<IndexTableSegment> {
        let mut segment = IndexTableSegment::new();

        let mut total_len = 0u64;
        while total_len < segment_len {
            let (tag, local_len) = file.read_local_tl()?;
            total_len += 4;

            match tag {
                TAG_INSTANCE_UID => {
                    expect_len(tag, local_len, 16)?;
                    let mut bytes = [0u8; 16];
                    file.read_exact(&mut bytes)?;
                    segment.instance_uid = Uuid::from_bytes(bytes);
                }
                TAG_INDEX_EDIT_RATE => {
                    expect_len(tag, local_len, 8)?;
                    segment.index_edit_rate.numerator = file.read_i32()?;
                    segment.index_edit_rate.denominator = file.read_i32()?;
                }
                TAG_INDEX_START_POSITION => {
                    expect_len(tag, local_len, 8)?;
                    segment.index_start_position = file.read_i64()?;
                }
                TAG_INDEX_DURATION => {
                    expect_len(tag, local_len, 8)?;
                    segment.index_duration = file.read_i64()?;
                }
                TAG_EDIT_UNIT_BYTE_COUNT => {
                    expect_len(tag, local_len, 4)?;
                    segment.edit_unit_byte_count = file.read_u32()?;
                }
                TAG_INDEX_SID => {
                    expect_len(tag, local_len, 4)?;
                    segment.index_sid = file.read_u32()?;
                }
                TAG_BODY_SID => {
                    expect_len(tag, local_len, 4)?;
                    segment.body_sid = file.read_u32()?;
                }
                TAG_SLICE_COUNT => {
                    expect_len(tag, local_len, 1)?;
                    segment.slice_count = file.read_u8()?;
                }
                TAG_POS_TABLE_COUNT => {
                    expect_len(tag, local_len, 1)?;
                    segment.pos_table_count = file.read_u8()?;
                }
                TAG_EXT_START_OFFSET => {
                    expect_len(tag, local_len, 8)?;
                    segment.ext_start_offset = file.read_u64()?;
                }
                TAG_VBE_BYTE_COUNT => {
                    expect_len(tag, local_len, 8)?;
                    segment.vbe_byte_count = file.read_u64()?;
                }
                TAG_SINGLE_INDEX_LOCATION => {
                    expect_len(tag, local_len, 1)?;
                    segment.single_index_location = OptBool::from(file.read_u8()?);
                }
                TAG_SINGLE_ESSENCE_LOCATION => {
                    expect_len(tag, local_len, 1)?;
                    segment.single_essence_location = OptBool::from(file.read_u8()?);
                }
                TAG_FORWARD_INDEX_DIRECTION => {
                    expect_len(tag, local_len, 1)?;
                    segment.forward_index_direction = OptBool::from(file.read_u8()?);
                }
                TAG_DELTA_ENTRY_ARRAY => {
                    let (num_entries, entry_len) = file.read_array_header()?;
                    if num_entries != 0 && entry_len != DELTA_ENTRY_LEN {
                        return Err(MxfError::corrupt_index(
                            "delta entry array",
                            format!("entry length {entry_len} is not {DELTA_ENTRY_LEN}"),
                        ));
                    }
                    if local_len as u64 != 8 + num_entries as u64 * DELTA_ENTRY_LEN as u64 {
                        return Err(MxfError::corrupt_index(
                            "delta entry array",
                            format!(
                                "item length {local_len} does not cover {num_entries} entries"
                            ),
                        ));
                    }
                    for _ in 0..num_entries {
                        let pos_table_index = file.read_i8()?;
                        let slice = file.read_u8()?;
                        let element_data = file.read_u32()?;
                        segment.delta_entries.push(DeltaEntry {
                            pos_table_index,
                            slice,
                            element_data,
                        });
                    }
                }
                TAG_INDEX_ENTRY_ARRAY => {
                    let (num_entries, entry_len) = file.read_array_header()?;
                    let expected_entry_len = segment.index_entry_len();
                    if num_entries != 0 && entry_len != expected_entry_len {
                        // real-world sample files have been seen declaring
                        // SliceCount 1 with 11-byte entries
                        warn!(
                            entry_len,
                            expected_entry_len, "index entry length is incorrect"
                        );
                    }
                    if local_len as u64 != 8 + num_entries as u64 * entry_len as u64 {
                        return Err(MxfError::corrupt_index(
                            "index entry array",
                            format!(
                                "item length {local_len} does not cover {num_entries} entries"
                            ),
                        ));
                    }
                    for _ in 0..num_entries {
                        let mut actual_entry_len = 0u32;
                        let temporal_offset = file.read_i8()?;
                        let key_frame_offset = file.read_i8()?;
                        let flags = file.read_u8()?;
                        let stream_offset = file.read_u64()?;
                        actual_entry_len += INDEX_ENTRY_FIXED_LEN;

                        let mut slice_offset = Vec::with_capacity(segment.slice_count as usize);
                        for _ in 0..segment.slice_count {
                            if actual_entry_len >= entry_len {
                                break;
                            }
                            slice_offset.push(file.read_u32()?);
                            actual_entry_len += 4;
                        }
                        let mut pos_table = Vec::with_capacity(segment.pos_table_count as usize);
                        for _ in 0..segment.pos_table_count {
                            if actual_entry_len >= entry_len {
                                break;
                            }
                            let numerator = file.read_i32()?;
                            let denominator = file.read_i32()?;
                            pos_table.push(Rational {
                                numerator,
                                denominator,
                            });
                            actual_entry_len += 8;
                        }

                        if actual_entry_len < entry_len {
                            file.skip((entry_len - actual_entry_len) as u64)?;
                        }

                        segment.index_entries.push(IndexEntry {
                            temporal_offset,
                            key_frame_offset,
                            flags,
                            stream_offset,
                            slice_offset,
                            pos_table,
                        });
                    }
                }
                _ => {
                    warn!(tag, "unknown local item in index table segment");
                    file.skip(local_len as u64)?;
                }
            }

            total_len += local_len as u64;
        }

        if total_len != segment_len {
            return Err(MxfError::corrupt_index(
                "segment",
                format!("consumed {total_len} bytes of a {segment_len} byte segment"),
            ));
        }

        Ok(segment)
    }
}

fn expect_len(tag: u16, actual: u16, expected: u16) -> Result<()> {
    if actual != expected {
        return Err(MxfError::corrupt_index(
            format!("local item {tag:#06x}"),
            format!("length {actual} is not {expected}"),
        ));
    }
    Ok(())
}

/// Write the delta entry array item header.
pub fn write_delta_entry_array_header(file: &mut MxfFile, num_entries: u32) -> Result<()> {
    let item_len = 8 + num_entries as u64 * DELTA_ENTRY_LEN as u64;
    if item_len > u16::MAX as u64 {
        return Err(MxfError::corrupt_index(
            "delta entry array",
            format!("{num_entries} entries exceed the local set length limit"),
        ));
    }
    file.write_local_tl(TAG_DELTA_ENTRY_ARRAY, item_len as u16)?;
    file.write_array_header(num_entries, DELTA_ENTRY_LEN)
}

/// Write one delta entry.
pub fn write_delta_entry(file: &mut MxfFile, entry: &DeltaEntry) -> Result<()> {
    file.write_i8(entry.pos_table_index)?;
    file.write_u8(entry.slice)?;
    file.write_u32(entry.element_data)
}

fn index_entry_len(slice_count: u8, pos_table_count: u8) -> u32 {
    INDEX_ENTRY_FIXED_LEN + slice_count as u32 * 4 + pos_table_count as u32 * 8
}

/// Write the index entry array item header.
pub fn write_index_entry_array_header(
    file: &mut MxfFile,
    slice_count: u8,
    pos_table_count: u8,
    num_entries: u32,
) -> Result<()> {
    let entry_len = index_entry_len(slice_count, pos_table_count);
    let item_len = 8 + num_entries as u64 * entry_len as u64;
    if item_len > u16::MAX as u64 {
        return Err(MxfError::corrupt_index(
            "index entry array",
            format!(
                "{num_entries} entries exceed the local set length limit; \
                 use the Avid array header variant"
            ),
        ));
    }
    file.write_local_tl(TAG_INDEX_ENTRY_ARRAY, item_len as u16)?;
    file.write_array_header(num_entries, entry_len)
}

/// Write the index entry array item header in the Avid layout.
///
/// Avid products ignore the local set 16-bit size restriction and rely on
/// the embedded entry count; an oversized array declares local length
/// 0xffff. Callers select this layout explicitly; there is no
/// autodetection.
pub fn write_avid_index_entry_array_header(
    file: &mut MxfFile,
    slice_count: u8,
    pos_table_count: u8,
    num_entries: u32,
) -> Result<()> {
    let entry_len = index_entry_len(slice_count, pos_table_count);
    let item_len = 8 + num_entries as u64 * entry_len as u64;
    if item_len > u16::MAX as u64 {
        file.write_local_tl(TAG_INDEX_ENTRY_ARRAY, u16::MAX)?;
    } else {
        file.write_local_tl(TAG_INDEX_ENTRY_ARRAY, item_len as u16)?;
    }
    file.write_array_header(num_entries, entry_len)
}

/// Write one index entry.
pub fn write_index_entry(file: &mut MxfFile, entry: &IndexEntry) -> Result<()> {
    file.write_i8(entry.temporal_offset)?;
    file.write_i8(entry.key_frame_offset)?;
    file.write_u8(entry.flags)?;
    file.write_u64(entry.stream_offset)?;
    for offset in &entry.slice_offset {
        file.write_u32(*offset)?;
    }
    for pos in &entry.pos_table {
        file.write_i32(pos.numerator)?;
        file.write_i32(pos.denominator)?;
    }
    Ok(())
}

/// Builder accumulating entries in memory so the header is always written
/// with the correct count.
pub struct IndexSegmentBuilder {
    segment: IndexTableSegment,
}

impl IndexSegmentBuilder {
    /// Start a segment for the given stream identifiers and edit rate,
    /// with a freshly generated instance UID.
    pub fn new(index_sid: u32, body_sid: u32, index_edit_rate: Rational) -> Self {
        IndexSegmentBuilder {
            segment: IndexTableSegment {
                instance_uid: Uuid::new_v4(),
                index_edit_rate,
                index_sid,
                body_sid,
                ..Default::default()
            },
        }
    }

    pub fn start_position(mut self, position: i64) -> Self {
        self.segment.index_start_position = position;
        self
    }

    /// Select CBE mode with the given constant edit unit size.
    pub fn edit_unit_byte_count(mut self, byte_count: u32) -> Self {
        self.segment.edit_unit_byte_count = byte_count;
        self
    }

    pub fn shape(mut self, slice_count: u8, pos_table_count: u8) -> Self {
        self.segment.slice_count = slice_count;
        self.segment.pos_table_count = pos_table_count;
        self
    }

    /// Mutable access to the segment for optional items.
    pub fn segment_mut(&mut self) -> &mut IndexTableSegment {
        &mut self.segment
    }

    /// Append a delta entry (CBE mode).
    pub fn add_delta_entry(
        &mut self,
        pos_table_index: i8,
        slice: u8,
        element_data: u32,
    ) -> Result<()> {
        if self.segment.edit_unit_byte_count == 0 {
            return Err(MxfError::corrupt_index(
                "builder",
                "delta entries require a nonzero edit unit byte count",
            ));
        }
        self.segment.delta_entries.push(DeltaEntry {
            pos_table_index,
            slice,
            element_data,
        });
        Ok(())
    }

    /// Append an index entry (VBE mode) and grow the duration.
    pub fn add_index_entry(&mut self, entry: IndexEntry) -> Result<()> {
        if self.segment.edit_unit_byte_count != 0 {
            return Err(MxfError::corrupt_index(
                "builder",
                "index entries require a zero edit unit byte count",
            ));
        }
        if entry.slice_offset.len() != self.segment.slice_count as usize
            || entry.pos_table.len() != self.segment.pos_table_count as usize
        {
            return Err(MxfError::corrupt_index(
                "builder",
                "index entry slice or pos table length does not match segment counts",
            ));
        }
        self.segment.index_entries.push(entry);
        self.segment.index_duration += 1;
        Ok(())
    }

    /// Write header then entries in one shot.
    pub fn finalize(self, file: &mut MxfFile) -> Result<IndexTableSegment> {
        self.segment.write_to(file)?;
        Ok(self.segment)
    }

    /// Take the segment without writing it.
    pub fn into_segment(self) -> IndexTableSegment {
        self.segment
    }
}

/// Where an already-written index entry lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSlot {
    /// Absolute file offset of the entry's first byte (the temporal
    /// offset).
    pub file_offset: u64,
}

#[derive(Debug, Clone, Copy)]
struct LedgerSegment {
    first_position: i64,
    num_entries: u64,
    entries_file_offset: u64,
}

/// Ledger of flushed index-entry arrays, supporting temporal-offset
/// backpatching.
///
/// Essence writers record each flushed segment's entry area; when a
/// frame's true temporal offset becomes known one or more frames later,
/// [`IndexEntryLedger::patch_slot`] computes where the provisional entry
/// lives as a pure function of the ledger, and
/// [`patch_temporal_offset`] rewrites that one byte in place.
#[derive(Debug)]
pub struct IndexEntryLedger {
    entry_size: u32,
    retention: usize,
    segments: VecDeque<LedgerSegment>,
    next_position: i64,
}

impl IndexEntryLedger {
    /// Create a ledger for entries of `entry_size` bytes, retaining the
    /// most recent `retention` segments as patchable.
    pub fn new(entry_size: u32, retention: usize) -> Self {
        IndexEntryLedger {
            entry_size,
            retention: retention.max(1),
            segments: VecDeque::new(),
            next_position: 0,
        }
    }

    /// Record a flushed entry array of `num_entries` entries whose first
    /// entry starts at `entries_file_offset`.
    pub fn record_segment(&mut self, num_entries: u64, entries_file_offset: u64) {
        self.segments.push_back(LedgerSegment {
            first_position: self.next_position,
            num_entries,
            entries_file_offset,
        });
        self.next_position += num_entries as i64;
        while self.segments.len() > self.retention {
            self.segments.pop_front();
        }
    }

    /// Next edit-unit position to be recorded.
    pub fn next_position(&self) -> i64 {
        self.next_position
    }

    /// Locate the file slot of the entry at `position`, or `None` when the
    /// entry was never recorded or has aged out of the retention window.
    pub fn patch_slot(&self, position: i64) -> Option<PatchSlot> {
        self.segments
            .iter()
            .find(|seg| {
                position >= seg.first_position
                    && position < seg.first_position + seg.num_entries as i64
            })
            .map(|seg| PatchSlot {
                file_offset: seg.entries_file_offset
                    + (position - seg.first_position) as u64 * self.entry_size as u64,
            })
    }
}

/// Overwrite the temporal offset of the already-written entry at
/// `position`, restoring the file position afterwards. Returns false (with
/// a warning) when the entry is outside the ledger's retention window.
pub fn patch_temporal_offset(
    file: &mut MxfFile,
    ledger: &IndexEntryLedger,
    position: i64,
    temporal_offset: i8,
) -> Result<bool> {
    let Some(slot) = ledger.patch_slot(position) else {
        warn!(
            position,
            "skipping temporal offset patch for an entry outside the ledger window"
        );
        return Ok(false);
    };

    if !file.is_seekable() {
        return Err(MxfError::non_seekable("temporal offset patch"));
    }

    let saved_pos = file.tell()?;
    file.seek(SeekFrom::Start(slot.file_offset))?;
    file.write_i8(temporal_offset)?;
    file.seek(SeekFrom::Start(saved_pos))?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_len_cbe() {
        let mut segment = IndexTableSegment::new();
        segment.edit_unit_byte_count = 1000;
        segment.delta_entries.push(DeltaEntry::default());
        segment.delta_entries.push(DeltaEntry::default());
        assert_eq!(segment.segment_len(), 80 + 12 + 2 * 6);
    }

    #[test]
    fn test_value_len_vbe_with_slices() {
        let mut segment = IndexTableSegment::new();
        segment.slice_count = 1;
        segment.pos_table_count = 1;
        segment.index_entries.push(IndexEntry {
            slice_offset: vec![0],
            pos_table: vec![Rational::default()],
            ..Default::default()
        });
        // entry size 11 + 4 + 8 = 23
        assert_eq!(segment.segment_len(), 80 + 22 + 23);
    }

    #[test]
    fn test_value_len_optional_items() {
        let mut segment = IndexTableSegment::new();
        segment.ext_start_offset = 100;
        segment.vbe_byte_count = 5;
        segment.single_index_location = OptBool::False;
        segment.forward_index_direction = OptBool::True;
        assert_eq!(segment.segment_len(), 80 + 12 + 12 + 5 + 5);
    }

    #[test]
    fn test_both_arrays_is_an_invariant_violation() {
        let mut segment = IndexTableSegment::new();
        segment.delta_entries.push(DeltaEntry::default());
        segment.index_entries.push(IndexEntry::default());
        let mut file = MxfFile::memory();
        assert!(segment.write_to(&mut file).is_err());
    }

    #[test]
    fn test_builder_rejects_mode_mismatch() {
        let mut builder = IndexSegmentBuilder::new(1, 2, Rational::new(25, 1));
        assert!(builder.add_delta_entry(-1, 0, 0).is_err());

        let mut builder = IndexSegmentBuilder::new(1, 2, Rational::new(25, 1))
            .edit_unit_byte_count(1000);
        assert!(builder.add_index_entry(IndexEntry::default()).is_err());
    }

    #[test]
    fn test_builder_duration_tracks_index_entries() {
        let mut builder = IndexSegmentBuilder::new(1, 2, Rational::new(25, 1));
        for i in 0..3u64 {
            builder
                .add_index_entry(IndexEntry {
                    stream_offset: i * 100,
                    ..Default::default()
                })
                .unwrap();
        }
        let segment = builder.into_segment();
        assert_eq!(segment.index_duration, 3);
        assert_eq!(segment.index_entries.len(), 3);
    }

    #[test]
    fn test_ledger_patch_slot_computation() {
        let mut ledger = IndexEntryLedger::new(11, 4);
        ledger.record_segment(10, 1000);
        ledger.record_segment(5, 5000);

        // entry 3 lives in the first segment
        assert_eq!(
            ledger.patch_slot(3),
            Some(PatchSlot {
                file_offset: 1000 + 3 * 11
            })
        );
        // entry 12 is the third entry of the second segment
        assert_eq!(
            ledger.patch_slot(12),
            Some(PatchSlot {
                file_offset: 5000 + 2 * 11
            })
        );
        assert_eq!(ledger.patch_slot(15), None);
        assert_eq!(ledger.next_position(), 15);
    }

    #[test]
    fn test_ledger_retention_window() {
        let mut ledger = IndexEntryLedger::new(11, 2);
        ledger.record_segment(4, 100);
        ledger.record_segment(4, 200);
        ledger.record_segment(4, 300);

        // the first segment aged out
        assert_eq!(ledger.patch_slot(0), None);
        assert!(ledger.patch_slot(4).is_some());
        assert!(ledger.patch_slot(11).is_some());
    }

    #[test]
    fn test_avid_array_header_oversized_uses_ffff() {
        let mut file = MxfFile::memory();
        // 11-byte entries, 6000 entries: 8 + 66000 > u16::MAX
        write_avid_index_entry_array_header(&mut file, 0, 0, 6000).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let (tag, local_len) = file.read_local_tl().unwrap();
        assert_eq!(tag, 0x3f0a);
        assert_eq!(local_len, u16::MAX);
        assert_eq!(file.read_array_header().unwrap(), (6000, 11));

        // the standard header refuses the same array
        let mut file = MxfFile::memory();
        assert!(write_index_entry_array_header(&mut file, 0, 0, 6000).is_err());
    }
}
