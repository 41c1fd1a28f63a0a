// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Partition pack model.
//!
//! A partition pack is 88 fixed bytes (versions, KAG size, the
//! this/previous/footer partition offsets, header and index byte counts,
//! stream identifiers, operational pattern) followed by a batch of 16-byte
//! essence container labels. `this_partition` always equals the file offset
//! of the pack's own KLV key, excluding any run-in.
//!
//! Packs are written progressively: byte offsets other than
//! `this_partition` are filled in as content is written, and a final update
//! pass rewrites every pack in place with the now-known cross references
//! before appending the random index pack (RIP).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{MxfError, Result};
use crate::core::labels::{
    is_footer_partition_pack, is_header_partition_pack, is_random_index_pack, partition_is_closed,
    partition_is_complete, partition_pack_key, PartitionKind, PartitionStatus, KLV_FILL_KEY,
    RANDOM_INDEX_PACK_KEY,
};
use crate::core::types::{Key, KEY_LEN};
use crate::io::file::{MxfFile, MAX_RUNIN_LEN};
use crate::io::stream::SeekFrom;

/// Size of the partition pack fixed fields, including the label batch
/// header.
pub const PARTITION_PACK_FIXED_LEN: u64 = 88;

/// One partition pack.
#[derive(Debug, Clone, Serialize)]
pub struct Partition {
    pub key: Key,
    pub major_version: u16,
    pub minor_version: u16,
    /// KLV alignment grid in bytes; 1 disables alignment.
    pub kag_size: u32,
    pub this_partition: u64,
    pub previous_partition: u64,
    pub footer_partition: u64,
    pub header_byte_count: u64,
    pub index_byte_count: u64,
    pub index_sid: u32,
    /// Byte position of this partition's essence within the body SID's
    /// logical essence stream.
    pub body_offset: u64,
    pub body_sid: u32,
    pub operational_pattern: Key,
    pub essence_containers: Vec<Key>,

    #[serde(skip)]
    header_mark_pos: Option<u64>,
    #[serde(skip)]
    index_mark_pos: Option<u64>,
    #[serde(skip)]
    written_pack_len: Option<u64>,
}

impl Default for Partition {
    fn default() -> Self {
        Partition {
            key: Key::NULL,
            major_version: 0x0001,
            minor_version: 0x0002,
            kag_size: 1,
            this_partition: 0,
            previous_partition: 0,
            footer_partition: 0,
            header_byte_count: 0,
            index_byte_count: 0,
            index_sid: 0,
            body_offset: 0,
            body_sid: 0,
            operational_pattern: Key::NULL,
            essence_containers: Vec::new(),
            header_mark_pos: None,
            index_mark_pos: None,
            written_pack_len: None,
        }
    }
}

impl Partition {
    /// Create a partition with the key for the given kind and status.
    pub fn new(kind: PartitionKind, status: PartitionStatus) -> Self {
        Partition {
            key: partition_pack_key(kind, status),
            ..Default::default()
        }
    }

    /// Create a partition carrying forward another partition's versions,
    /// KAG size, operational pattern and essence container labels.
    pub fn from_partition(source: &Partition) -> Self {
        Partition {
            key: Key::NULL,
            major_version: source.major_version,
            minor_version: source.minor_version,
            kag_size: source.kag_size,
            operational_pattern: source.operational_pattern,
            essence_containers: source.essence_containers.clone(),
            ..Default::default()
        }
    }

    /// Append an essence container label, preserving order.
    pub fn append_essence_container(&mut self, label: Key) {
        self.essence_containers.push(label);
    }

    /// Byte length of the pack value (fixed fields + label array).
    pub fn pack_len(&self) -> u64 {
        PARTITION_PACK_FIXED_LEN + (KEY_LEN as u64) * self.essence_containers.len() as u64
    }

    /// True if the key declares this partition closed.
    pub fn is_closed(&self) -> bool {
        partition_is_closed(&self.key)
    }

    /// True if the key declares this partition complete.
    pub fn is_complete(&self) -> bool {
        partition_is_complete(&self.key)
    }

    /// True for a footer partition.
    pub fn is_footer(&self) -> bool {
        is_footer_partition_pack(&self.key)
    }

    /// Record the current file position as the start of header metadata.
    pub fn mark_header_start(&mut self, file: &mut MxfFile) -> Result<()> {
        self.header_mark_pos = Some(file.tell()?);
        Ok(())
    }

    /// Record the header metadata byte extent from the start mark to here.
    pub fn mark_header_end(&mut self, file: &mut MxfFile) -> Result<()> {
        let start = self.header_mark_pos.take().ok_or_else(|| {
            MxfError::io("partition", "header end marked without a start mark")
        })?;
        let file_pos = file.tell()?;
        if file_pos < start {
            return Err(MxfError::io(
                "partition",
                "header end mark precedes the start mark",
            ));
        }
        self.header_byte_count = file_pos - start;
        Ok(())
    }

    /// Record the current file position as the start of index segments.
    pub fn mark_index_start(&mut self, file: &mut MxfFile) -> Result<()> {
        self.index_mark_pos = Some(file.tell()?);
        Ok(())
    }

    /// Record the index byte extent from the start mark to here.
    pub fn mark_index_end(&mut self, file: &mut MxfFile) -> Result<()> {
        let start = self.index_mark_pos.take().ok_or_else(|| {
            MxfError::io("partition", "index end marked without a start mark")
        })?;
        let file_pos = file.tell()?;
        if file_pos < start {
            return Err(MxfError::io(
                "partition",
                "index end mark precedes the start mark",
            ));
        }
        self.index_byte_count = file_pos - start;
        Ok(())
    }

    /// Write the pack at the current file position. Sets `this_partition`
    /// from the position (excluding run-in); a footer pack also points
    /// `footer_partition` at itself.
    pub fn write(&mut self, file: &mut MxfFile) -> Result<()> {
        let file_pos = file.tell()?;
        self.this_partition = file_pos - file.runin_len() as u64;
        if self.is_footer() {
            self.footer_partition = self.this_partition;
        }

        file.write_kl(&self.key, self.pack_len())?;

        file.write_u16(self.major_version)?;
        file.write_u16(self.minor_version)?;
        file.write_u32(self.kag_size)?;
        file.write_u64(self.this_partition)?;
        file.write_u64(self.previous_partition)?;
        file.write_u64(self.footer_partition)?;
        file.write_u64(self.header_byte_count)?;
        file.write_u64(self.index_byte_count)?;
        file.write_u32(self.index_sid)?;
        file.write_u64(self.body_offset)?;
        file.write_u32(self.body_sid)?;
        file.write_key(&self.operational_pattern)?;
        file.write_batch_header(self.essence_containers.len() as u32, KEY_LEN as u32)?;
        for label in &self.essence_containers {
            file.write_key(label)?;
        }

        self.written_pack_len = Some(self.pack_len());
        Ok(())
    }

    /// Read a pack whose key and declared length have already been read.
    pub fn read(file: &mut MxfFile, key: &Key, len: u64) -> Result<Partition> {
        if len < PARTITION_PACK_FIXED_LEN {
            return Err(MxfError::truncated_partition(len, PARTITION_PACK_FIXED_LEN));
        }

        let mut partition = Partition {
            key: *key,
            ..Default::default()
        };

        partition.major_version = file.read_u16()?;
        partition.minor_version = file.read_u16()?;
        partition.kag_size = file.read_u32()?;
        partition.this_partition = file.read_u64()?;
        partition.previous_partition = file.read_u64()?;
        partition.footer_partition = file.read_u64()?;
        partition.header_byte_count = file.read_u64()?;
        partition.index_byte_count = file.read_u64()?;
        partition.index_sid = file.read_u32()?;
        partition.body_offset = file.read_u64()?;
        partition.body_sid = file.read_u32()?;
        partition.operational_pattern = file.read_key()?;

        let (num_labels, label_len) = file.read_batch_header()?;
        if num_labels != 0 && label_len != KEY_LEN as u32 {
            return Err(MxfError::io(
                "partition pack",
                format!("essence container label length {label_len} is not {KEY_LEN}"),
            ));
        }
        let expected_len = PARTITION_PACK_FIXED_LEN + num_labels as u64 * label_len as u64;
        if len < expected_len {
            return Err(MxfError::truncated_partition(len, expected_len));
        }
        for _ in 0..num_labels {
            let label = file.read_key()?;
            partition.essence_containers.push(label);
        }

        if len > expected_len {
            warn!(
                declared = len,
                expected = expected_len,
                "partition pack length is larger than expected; skipping excess"
            );
            file.skip(len - expected_len)?;
        }

        Ok(partition)
    }

    /// Pad with a Filler KLV so the next write starts on a KAG boundary.
    pub fn fill_to_kag(&self, file: &mut MxfFile) -> Result<()> {
        self.allocate_space_to_kag(file, 0)
    }

    /// Write a Filler KLV reserving `size` bytes of space, extended so the
    /// fill ends on a KAG boundary relative to the partition start. Grows
    /// by whole KAG units while the BER length field does not fit the gap.
    pub fn allocate_space_to_kag(&self, file: &mut MxfFile, size: u32) -> Result<()> {
        let kag_size = self.kag_size.max(1) as i64;

        if size == 0 && kag_size == 1 {
            return Ok(());
        }

        let file_pos = file.tell()?;
        if file_pos <= self.this_partition {
            return Err(MxfError::io(
                "KAG fill",
                "file position precedes the partition pack",
            ));
        }
        let relative_pos = (file_pos + size as u64 - self.this_partition) as i64;

        if size != 0 || relative_pos % kag_size != 0 {
            file.write_key(&KLV_FILL_KEY)?;

            let mut fill_size = size as i64 - KEY_LEN as i64;
            if kag_size > 1 {
                fill_size += kag_size - relative_pos % kag_size;
            }

            let mut llen = if fill_size >= 0 {
                file.llen_for(fill_size as u64)
            } else {
                0
            };
            while fill_size < llen as i64 {
                fill_size += kag_size;
                llen = if fill_size >= 0 {
                    file.llen_for(fill_size as u64)
                } else {
                    0
                };
            }
            fill_size -= llen as i64;

            file.write_fixed_length(llen, fill_size as u64)?;
            file.write_zeros(fill_size as u64)?;
        }

        Ok(())
    }
}

/// Write a Filler KLV occupying exactly `size` bytes.
pub fn allocate_space(file: &mut MxfFile, size: u32) -> Result<()> {
    let min_size = file.min_llen() as u32 + KEY_LEN as u32;
    if size < min_size {
        return Err(MxfError::io(
            "fill",
            format!("fill size {size} is less than the {min_size} byte minimum"),
        ));
    }

    file.write_key(&KLV_FILL_KEY)?;

    let mut fill_size = (size - KEY_LEN as u32) as u64;
    let llen = file.llen_for(fill_size);
    fill_size -= llen as u64;

    file.write_fixed_length(llen, fill_size)?;
    file.write_zeros(fill_size)
}

/// Pad with a Filler KLV up to an absolute file position.
pub fn fill_to_position(file: &mut MxfFile, position: u64) -> Result<()> {
    let file_pos = file.tell()?;
    if file_pos == position {
        return Ok(());
    }
    if file_pos + file.min_llen() as u64 + KEY_LEN as u64 > position {
        return Err(MxfError::io(
            "fill",
            format!("no room for a filler KLV between {file_pos} and {position}"),
        ));
    }

    file.write_key(&KLV_FILL_KEY)?;

    let mut fill_size = position - file_pos - KEY_LEN as u64;
    let llen = file.llen_for(fill_size);
    fill_size -= llen as u64;

    file.write_fixed_length(llen, fill_size)?;
    file.write_zeros(fill_size)
}

/// One random index pack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RipEntry {
    pub body_sid: u32,
    pub this_partition: u64,
}

/// Fill in `previous_partition` and (when a footer exists)
/// `footer_partition` cross references across all partitions.
pub fn update_partitions_in_memory(partitions: &mut [Partition]) {
    if partitions.is_empty() {
        return;
    }

    let have_footer = partitions[partitions.len() - 1].is_footer();
    let footer_offset = partitions[partitions.len() - 1].this_partition;

    let mut previous_offset: Option<u64> = None;
    for partition in partitions.iter_mut() {
        if let Some(offset) = previous_offset {
            partition.previous_partition = offset;
        }
        if have_footer {
            partition.footer_partition = footer_offset;
        }
        previous_offset = Some(partition.this_partition);
    }
}

/// Rewrite every partition pack in place. Leaves the file positioned at the
/// end. Fails with `PartitionUpdateConflict` if a rewrite would change a
/// pack's byte size.
pub fn rewrite_partitions(file: &mut MxfFile, partitions: &mut [Partition]) -> Result<()> {
    let runin_len = file.runin_len() as u64;
    for partition in partitions.iter_mut() {
        if let Some(written_len) = partition.written_pack_len {
            if written_len != partition.pack_len() {
                return Err(MxfError::update_conflict(written_len, partition.pack_len()));
            }
        }

        file.seek(SeekFrom::Start(partition.this_partition + runin_len))?;
        partition.write(file)?;
    }

    file.seek(SeekFrom::End(0))?;
    Ok(())
}

/// Update all partition packs after content is complete: fill in cross
/// references in memory, then rewrite each pack in place. Leaves the file
/// positioned at the end.
pub fn update_partitions(file: &mut MxfFile, partitions: &mut [Partition]) -> Result<()> {
    update_partitions_in_memory(partitions);
    rewrite_partitions(file, partitions)
}

/// Append a random index pack listing every partition.
pub fn write_rip(file: &mut MxfFile, partitions: &[Partition]) -> Result<()> {
    let len = (4 + 8) * partitions.len() as u64 + 4;

    file.write_key(&RANDOM_INDEX_PACK_KEY)?;
    let llen = file.write_length(len)?;

    for partition in partitions {
        file.write_u32(partition.body_sid)?;
        file.write_u64(partition.this_partition)?;
    }
    file.write_u32((KEY_LEN as u64 + llen as u64 + len) as u32)?;

    Ok(())
}

/// Read the random index pack by backward scan from the end of the file.
pub fn read_rip(file: &mut MxfFile) -> Result<Vec<RipEntry>> {
    // overall length trailer is the last 4 bytes;
    // minimum RIP is 16 + 1 + (4 + 8) + 4 bytes
    file.seek(SeekFrom::End(-4))?;
    let size = file.read_u32()?;
    if size < 33 {
        return Err(MxfError::io(
            "random index pack",
            format!("declared size {size} is below the 33 byte minimum"),
        ));
    }

    file.seek(SeekFrom::Current(-(size as i64)))?;
    let key = file.read_key()?;
    if !is_random_index_pack(&key) {
        return Err(MxfError::unexpected_key("random index pack", key));
    }
    let (_llen, len) = file.read_length()?;

    if len < 4 || (len - 4) % 12 != 0 {
        return Err(MxfError::io(
            "random index pack",
            format!("entry region length {len} is not a whole number of entries"),
        ));
    }

    let num_entries = (len - 4) / 12;
    let mut entries = Vec::with_capacity(num_entries as usize);
    for _ in 0..num_entries {
        let body_sid = file.read_u32()?;
        let this_partition = file.read_u64()?;
        entries.push(RipEntry {
            body_sid,
            this_partition,
        });
    }

    Ok(entries)
}

/// Read the header partition pack key-length at the current position,
/// failing if the next KLV is not a header partition pack.
pub fn read_header_pp_kl(file: &mut MxfFile) -> Result<(Key, u8, u64)> {
    let key = file.read_key()?;
    if !is_header_partition_pack(&key) {
        return Err(MxfError::unexpected_key("header partition pack", key));
    }
    let (llen, len) = file.read_length()?;
    Ok((key, llen, len))
}

/// Scan past any vendor run-in and read the header partition pack
/// key-length. The run-in shall not contain the first 11 bytes of the
/// partition pack key; its length is recorded on the file handle.
pub fn read_header_pp_kl_with_runin(file: &mut MxfFile) -> Result<(Key, u8, u64)> {
    let prefix = partition_pack_key(PartitionKind::Header, PartitionStatus::OpenIncomplete);
    let mut key_bytes = [0u8; KEY_LEN];
    key_bytes[..11].copy_from_slice(&prefix.as_bytes()[..11]);

    let mut key_compare_byte = 0usize;
    let mut runin_check_count = 0u32;
    while runin_check_count <= MAX_RUNIN_LEN as u32 && key_compare_byte < 11 {
        let byte = file.read_u8()?;
        if byte == key_bytes[key_compare_byte] {
            key_compare_byte += 1;
        } else {
            runin_check_count += key_compare_byte as u32 + 1;
            key_compare_byte = 0;
        }
    }
    if runin_check_count > MAX_RUNIN_LEN as u32 {
        return Err(MxfError::io(
            "run-in scan",
            format!("no header partition pack within the {MAX_RUNIN_LEN} byte maximum run-in"),
        ));
    }

    file.read_exact(&mut key_bytes[11..])?;
    let key = Key::new(key_bytes);
    if !is_header_partition_pack(&key) {
        return Err(MxfError::unexpected_key("header partition pack", key));
    }
    let (llen, len) = file.read_length()?;

    file.set_runin_len(runin_check_count as u16);

    Ok((key, llen, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::labels::is_filler;

    fn sample_partition() -> Partition {
        let mut partition =
            Partition::new(PartitionKind::Header, PartitionStatus::ClosedComplete);
        partition.kag_size = 1;
        partition.body_sid = 1;
        partition.index_sid = 2;
        partition.operational_pattern = Key::new([
            0x06, 0x0e, 0x2b, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x01, 0x01,
            0x09, 0x00,
        ]);
        partition.append_essence_container(Key::new([0x11; 16]));
        partition.append_essence_container(Key::new([0x22; 16]));
        partition
    }

    #[test]
    fn test_pack_len_counts_labels() {
        let partition = sample_partition();
        assert_eq!(partition.pack_len(), 88 + 2 * 16);
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut file = MxfFile::memory();
        let mut partition = sample_partition();
        partition.write(&mut file).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let (key, _llen, len) = file.read_kl().unwrap();
        let read_back = Partition::read(&mut file, &key, len).unwrap();

        assert_eq!(read_back.key, partition.key);
        assert_eq!(read_back.major_version, 0x0001);
        assert_eq!(read_back.minor_version, 0x0002);
        assert_eq!(read_back.kag_size, partition.kag_size);
        assert_eq!(read_back.this_partition, 0);
        assert_eq!(read_back.body_sid, 1);
        assert_eq!(read_back.index_sid, 2);
        assert_eq!(read_back.operational_pattern, partition.operational_pattern);
        assert_eq!(read_back.essence_containers, partition.essence_containers);
    }

    #[test]
    fn test_read_rejects_truncated_pack() {
        let mut file = MxfFile::memory();
        let key = partition_pack_key(PartitionKind::Header, PartitionStatus::ClosedComplete);
        let err = Partition::read(&mut file, &key, 60).unwrap_err();
        assert!(matches!(err, MxfError::TruncatedPartition { .. }));
    }

    #[test]
    fn test_footer_write_points_footer_at_itself() {
        let mut file = MxfFile::memory();
        file.write_zeros(200).unwrap();

        let mut footer = Partition::new(PartitionKind::Footer, PartitionStatus::ClosedComplete);
        footer.write(&mut file).unwrap();
        assert_eq!(footer.this_partition, 200);
        assert_eq!(footer.footer_partition, 200);
    }

    #[test]
    fn test_fill_to_kag_alignment() {
        let mut file = MxfFile::memory();
        let mut partition = sample_partition();
        partition.kag_size = 256;
        partition.write(&mut file).unwrap();
        partition.fill_to_kag(&mut file).unwrap();
        assert_eq!(file.tell().unwrap() % 256, 0);

        // already aligned: no fill written
        let pos = file.tell().unwrap();
        partition.fill_to_kag(&mut file).unwrap();
        assert_eq!(file.tell().unwrap(), pos);
    }

    #[test]
    fn test_allocate_space_writes_exact_filler() {
        let mut file = MxfFile::memory();
        allocate_space(&mut file, 64).unwrap();
        assert_eq!(file.tell().unwrap(), 64);

        file.seek(SeekFrom::Start(0)).unwrap();
        let (key, llen, len) = file.read_kl().unwrap();
        assert!(is_filler(&key));
        assert_eq!(16 + llen as u64 + len, 64);
    }

    #[test]
    fn test_fill_to_position() {
        let mut file = MxfFile::memory();
        file.write_zeros(10).unwrap();
        fill_to_position(&mut file, 100).unwrap();
        assert_eq!(file.tell().unwrap(), 100);
    }

    #[test]
    fn test_update_partitions_in_memory_cross_references() {
        let mut partitions = vec![
            Partition::new(PartitionKind::Header, PartitionStatus::ClosedComplete),
            Partition::new(PartitionKind::Body, PartitionStatus::ClosedComplete),
            Partition::new(PartitionKind::Footer, PartitionStatus::ClosedComplete),
        ];
        partitions[0].this_partition = 0;
        partitions[1].this_partition = 1000;
        partitions[2].this_partition = 5000;

        update_partitions_in_memory(&mut partitions);

        assert_eq!(partitions[0].previous_partition, 0);
        assert_eq!(partitions[1].previous_partition, 0);
        assert_eq!(partitions[2].previous_partition, 1000);
        assert!(partitions.iter().all(|p| p.footer_partition == 5000));
    }

    #[test]
    fn test_partition_serializes_to_json() {
        let partition = sample_partition();
        let json = serde_json::to_value(&partition).unwrap();
        assert_eq!(json["body_sid"], 1);
        assert_eq!(json["essence_containers"].as_array().unwrap().len(), 2);
        assert!(json.get("written_pack_len").is_none());
    }
}
