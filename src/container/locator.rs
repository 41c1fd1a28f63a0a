// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Essence chunk locator.
//!
//! Builds an ordered index of essence byte ranges by scanning a file's
//! partitions once, mapping offsets within one body SID's logical essence
//! stream to absolute file positions. Chunks are ordered by essence offset
//! and non-overlapping; a chunk's expected offset is the partition pack's
//! `body_offset`, and a mismatch is clamped to the expected value with a
//! warning rather than rejecting the file. Real-world files occasionally
//! carry minor body offset miscounts that must not prevent playback of
//! otherwise valid essence.

use tracing::warn;

use crate::container::partition::Partition;
use crate::core::error::{MxfError, Result};
use crate::core::labels::{
    is_avid_essence_element, is_gc_essence_element, is_header_metadata, is_index_table_segment,
    is_partition_pack,
};
use crate::core::types::{Key, KEY_LEN};
use crate::io::file::MxfFile;
use crate::io::stream::SeekFrom;

/// Essence element granularity: one KLV per edit unit, or one KLV for the
/// whole clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrappingType {
    FrameWrapped,
    ClipWrapped,
}

/// One contiguous run of essence bytes.
#[derive(Debug, Clone)]
pub struct EssenceChunk {
    /// Offset within the logical (body SID scoped) essence stream.
    pub essence_offset: u64,
    /// Absolute file position of the first essence byte.
    pub file_position: u64,
    pub size: u64,
    /// False while the chunk's extent is still open (frame-wrapped chunks
    /// grow until the partition end is known).
    pub is_complete: bool,
    pub partition_id: usize,
    pub element_key: Key,
}

/// Index of essence chunks for one body SID.
pub struct EssenceChunkIndex {
    chunks: Vec<EssenceChunk>,
    /// Cursor for the usual sequential or nearby access pattern.
    last_chunk: usize,
}

impl EssenceChunkIndex {
    /// Scan `partitions` and build the chunk index for `body_sid`.
    ///
    /// Header metadata and index segments are skipped in one jump using the
    /// partition pack's declared byte counts where they exceed the current
    /// KLV. `first_frame_offset` trims the first clip-wrapped chunk (a
    /// quirk of certain Avid files); pass 0 otherwise.
    pub fn extract(
        file: &mut MxfFile,
        partitions: &[Partition],
        body_sid: u32,
        wrapping: WrappingType,
        first_frame_offset: u64,
    ) -> Result<EssenceChunkIndex> {
        let mut index = EssenceChunkIndex {
            chunks: Vec::new(),
            last_chunk: 0,
        };

        let runin_len = file.runin_len() as u64;
        let file_size = file.size()?;

        for (partition_id, partition) in partitions.iter().enumerate() {
            if partition.body_sid != body_sid {
                continue;
            }

            let partition_end = partitions
                .get(partition_id + 1)
                .map(|next| next.this_partition + runin_len)
                .unwrap_or(file_size);

            file.seek(SeekFrom::Start(partition.this_partition + runin_len))?;
            let (_key, _llen, len) = file.read_kl()?;
            file.skip(len)?;

            while !file.eof()? {
                let (key, llen, len) = file.read_next_nonfiller_kl()?;
                let kl_len = KEY_LEN as u64 + llen as u64;

                if is_partition_pack(&key) {
                    break;
                } else if is_header_metadata(&key) {
                    if partition.header_byte_count > kl_len + len {
                        file.skip(partition.header_byte_count - kl_len)?;
                    } else {
                        file.skip(len)?;
                    }
                } else if is_index_table_segment(&key) {
                    if partition.index_byte_count > kl_len + len {
                        file.skip(partition.index_byte_count - kl_len)?;
                    } else {
                        file.skip(len)?;
                    }
                } else if is_gc_essence_element(&key) || is_avid_essence_element(&key) {
                    let element_pos = file.tell()?;
                    index.append_chunk(
                        partition,
                        partition_id,
                        element_pos,
                        &key,
                        llen,
                        len,
                        wrapping,
                        first_frame_offset,
                    );
                    if wrapping == WrappingType::FrameWrapped {
                        index.update_last_chunk(partition_end, true);
                    }
                    break;
                } else {
                    file.skip(len)?;
                }
            }
        }

        Ok(index)
    }

    /// The indexed chunks, ordered by essence offset.
    pub fn chunks(&self) -> &[EssenceChunk] {
        &self.chunks
    }

    /// Total essence bytes covered.
    pub fn essence_data_size(&self) -> u64 {
        self.chunks
            .last()
            .map(|chunk| chunk.essence_offset + chunk.size)
            .unwrap_or(0)
    }

    #[allow(clippy::too_many_arguments)]
    fn append_chunk(
        &mut self,
        partition: &Partition,
        partition_id: usize,
        file_position: u64,
        element_key: &Key,
        element_llen: u8,
        element_len: u64,
        wrapping: WrappingType,
        first_frame_offset: u64,
    ) {
        // file_position is after the KL

        // check the essence container data is contiguous
        let mut body_offset = partition.body_offset;
        let expected_offset = self
            .chunks
            .last()
            .map(|chunk| chunk.essence_offset + chunk.size)
            .unwrap_or(0);
        if body_offset > expected_offset {
            warn!(
                body_offset,
                expected_offset, "ignoring potential missing essence container data"
            );
            body_offset = expected_offset;
        } else if body_offset < expected_offset {
            warn!(
                body_offset,
                expected_offset, "ignoring potential overlapping essence container data"
            );
            body_offset = expected_offset;
        }

        let mut chunk = EssenceChunk {
            essence_offset: body_offset,
            file_position,
            size: 0,
            is_complete: false,
            partition_id,
            element_key: *element_key,
        };
        if wrapping == WrappingType::FrameWrapped {
            // the chunk spans from the element's key to the partition end
            chunk.file_position -= KEY_LEN as u64 + element_llen as u64;
        } else {
            chunk.size = element_len;
            if first_frame_offset > 0 && self.chunks.is_empty() {
                chunk.file_position += first_frame_offset;
                chunk.size = chunk.size.saturating_sub(first_frame_offset);
            }
            chunk.is_complete = true;
        }
        self.chunks.push(chunk);
    }

    fn update_last_chunk(&mut self, file_position: u64, is_end: bool) {
        if let Some(chunk) = self.chunks.last_mut() {
            if !chunk.is_complete && file_position >= chunk.file_position + chunk.size {
                chunk.size = file_position - chunk.file_position;
                chunk.is_complete = is_end;
            }
        }
    }

    /// True if `essence_offset` falls inside an indexed chunk.
    pub fn have_file_position(&mut self, essence_offset: u64) -> bool {
        if self.chunks.is_empty() {
            return false;
        }
        self.offset_update(essence_offset);

        let chunk = &self.chunks[self.last_chunk];
        chunk.essence_offset <= essence_offset
            && chunk.essence_offset + chunk.size >= essence_offset
    }

    /// Map a logical essence offset to an absolute file position.
    pub fn file_position(&mut self, essence_offset: u64) -> Result<u64> {
        if self.chunks.is_empty() {
            return Err(MxfError::edit_unit_not_indexed(essence_offset, 0));
        }
        self.offset_update(essence_offset);

        let chunk = &self.chunks[self.last_chunk];
        if chunk.essence_offset > essence_offset
            || chunk.essence_offset + chunk.size < essence_offset
        {
            return Err(MxfError::edit_unit_not_indexed(essence_offset, 0));
        }

        Ok(chunk.file_position + (essence_offset - chunk.essence_offset))
    }

    /// Map an edit unit's byte range to its element key and absolute file
    /// position, requiring the chunk to cover the whole range.
    pub fn key_and_file_position(
        &mut self,
        essence_offset: u64,
        size: u64,
    ) -> Result<(Key, u64)> {
        if self.chunks.is_empty() {
            return Err(MxfError::edit_unit_not_indexed(essence_offset, size));
        }
        self.offset_update(essence_offset);

        let chunk = &self.chunks[self.last_chunk];
        let mut have_position = true;
        if chunk.essence_offset > essence_offset {
            have_position = false;
        } else if chunk.essence_offset + chunk.size < essence_offset + size {
            // an incomplete (still growing) chunk may cover bytes beyond
            // its recorded size
            if chunk.essence_offset + chunk.size < essence_offset || chunk.is_complete {
                have_position = false;
            }
        }
        if !have_position {
            return Err(MxfError::edit_unit_not_indexed(essence_offset, size));
        }

        Ok((
            chunk.element_key,
            chunk.file_position + (essence_offset - chunk.essence_offset),
        ))
    }

    /// Map an absolute file position back to a logical essence offset.
    pub fn essence_offset(&mut self, file_position: u64) -> Result<u64> {
        if self.chunks.is_empty() {
            return Err(MxfError::edit_unit_not_indexed(0, 0));
        }
        self.position_update(file_position);

        let chunk = &self.chunks[self.last_chunk];
        if chunk.file_position > file_position
            || chunk.file_position + chunk.size < file_position
        {
            return Err(MxfError::edit_unit_not_indexed(0, 0));
        }

        Ok(chunk.essence_offset + (file_position - chunk.file_position))
    }

    fn offset_update(&mut self, essence_offset: u64) {
        if self.chunks[self.last_chunk].essence_offset > essence_offset {
            // edit unit is in a chunk before the cursor
            for i in (0..self.last_chunk).rev() {
                if self.chunks[i].essence_offset <= essence_offset {
                    self.last_chunk = i;
                    break;
                }
            }
        } else if self.chunks[self.last_chunk].essence_offset + self.chunks[self.last_chunk].size
            <= essence_offset
        {
            // edit unit is in a chunk after the cursor
            for i in self.last_chunk + 1..self.chunks.len() {
                if self.chunks[i].essence_offset + self.chunks[i].size > essence_offset {
                    self.last_chunk = i;
                    break;
                }
            }
        }
    }

    fn position_update(&mut self, file_position: u64) {
        if self.chunks[self.last_chunk].file_position > file_position {
            for i in (0..self.last_chunk).rev() {
                if self.chunks[i].file_position <= file_position {
                    self.last_chunk = i;
                    break;
                }
            }
        } else if self.chunks[self.last_chunk].file_position + self.chunks[self.last_chunk].size
            <= file_position
        {
            for i in self.last_chunk + 1..self.chunks.len() {
                if self.chunks[i].file_position + self.chunks[i].size > file_position {
                    self.last_chunk = i;
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::labels::gc_essence_element_key;

    fn chunk(essence_offset: u64, file_position: u64, size: u64) -> EssenceChunk {
        EssenceChunk {
            essence_offset,
            file_position,
            size,
            is_complete: true,
            partition_id: 0,
            element_key: gc_essence_element_key(0x16, 0x01, 0x01, 0x01),
        }
    }

    fn index_with_chunks(chunks: Vec<EssenceChunk>) -> EssenceChunkIndex {
        EssenceChunkIndex {
            chunks,
            last_chunk: 0,
        }
    }

    #[test]
    fn test_file_position_lookup_across_chunks() {
        let mut index = index_with_chunks(vec![
            chunk(0, 100, 50),
            chunk(50, 300, 50),
            chunk(100, 700, 25),
        ]);

        assert_eq!(index.file_position(0).unwrap(), 100);
        assert_eq!(index.file_position(49).unwrap(), 149);
        assert_eq!(index.file_position(60).unwrap(), 310);
        assert_eq!(index.file_position(110).unwrap(), 710);
        // cursor moved forward; look backwards again
        assert_eq!(index.file_position(10).unwrap(), 110);
    }

    #[test]
    fn test_lookup_outside_any_chunk_fails() {
        let mut index = index_with_chunks(vec![chunk(0, 100, 50)]);
        assert!(matches!(
            index.file_position(200).unwrap_err(),
            MxfError::EditUnitNotIndexed { .. }
        ));
    }

    #[test]
    fn test_key_and_file_position_requires_full_range() {
        let mut index = index_with_chunks(vec![chunk(0, 100, 50)]);

        let (_key, position) = index.key_and_file_position(10, 40).unwrap();
        assert_eq!(position, 110);

        assert!(index.key_and_file_position(10, 41).is_err());
    }

    #[test]
    fn test_incomplete_chunk_allows_reads_past_recorded_size() {
        let mut chunks = vec![chunk(0, 100, 50)];
        chunks[0].is_complete = false;
        let mut index = index_with_chunks(chunks);

        assert!(index.key_and_file_position(40, 20).is_ok());
    }

    #[test]
    fn test_essence_offset_reverse_lookup() {
        let mut index = index_with_chunks(vec![chunk(0, 100, 50), chunk(50, 300, 50)]);
        assert_eq!(index.essence_offset(120).unwrap(), 20);
        assert_eq!(index.essence_offset(330).unwrap(), 80);
        assert!(index.essence_offset(250).is_err());
    }

    #[test]
    fn test_essence_data_size() {
        let index = index_with_chunks(vec![chunk(0, 100, 50), chunk(50, 300, 25)]);
        assert_eq!(index.essence_data_size(), 75);
    }
}
