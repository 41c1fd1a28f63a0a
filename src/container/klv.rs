// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! KLV primitive codec.
//!
//! Byte-exact encode/decode of 16-byte keys and BER-style lengths against an
//! [`MxfFile`]. Short-form lengths occupy one byte (values 0..=127); long
//! form sets the top bit of the first byte, whose low 7 bits give the number
//! of following big-endian length bytes (at most 8). A fixed-width length
//! can be written to reserve space for later patching.
//!
//! Local set items (u16 tag + u16 length) and batch/array headers (u32 count
//! + u32 element length) are part of the same wire vocabulary and live here.

use crate::core::error::{MxfError, Result};
use crate::core::labels::is_filler;
use crate::core::types::{Key, KEY_LEN};
use crate::io::file::MxfFile;

impl MxfFile {
    /// Minimal BER length size for `len`, raised to the configured minimum.
    ///
    /// Returns 1 for short form, otherwise 1 + the number of length bytes.
    pub fn llen_for(&self, len: u64) -> u8 {
        let llen: u8 = if len < 0x80 {
            1
        } else if (len >> 56) != 0 {
            9
        } else if (len >> 48) != 0 {
            8
        } else if (len >> 40) != 0 {
            7
        } else if (len >> 32) != 0 {
            6
        } else if (len >> 24) != 0 {
            5
        } else if (len >> 16) != 0 {
            4
        } else if (len >> 8) != 0 {
            3
        } else {
            2
        };

        llen.max(self.min_llen())
    }

    /// Read a 16-byte key. Any 16 bytes form a valid key.
    pub fn read_key(&mut self) -> Result<Key> {
        let mut bytes = [0u8; KEY_LEN];
        self.read_exact(&mut bytes)?;
        Ok(Key::new(bytes))
    }

    /// Write a 16-byte key.
    pub fn write_key(&mut self, key: &Key) -> Result<()> {
        self.write_all(key.as_bytes())
    }

    /// Read a BER length field; returns `(llen, len)` where `llen` is the
    /// total field size in bytes.
    pub fn read_length(&mut self) -> Result<(u8, u64)> {
        let first = self.read_u8()?;

        if first < 0x80 {
            return Ok((1, first as u64));
        }

        let bytes_to_read = first & 0x7f;
        if bytes_to_read > 8 {
            return Err(MxfError::malformed_length(format!(
                "length-of-length {bytes_to_read} exceeds maximum 8"
            )));
        }

        let mut length = 0u64;
        for _ in 0..bytes_to_read {
            let byte = self.read_u8().map_err(|_| {
                MxfError::malformed_length("stream ended within BER length field")
            })?;
            length = (length << 8) | byte as u64;
        }

        Ok((1 + bytes_to_read, length))
    }

    /// Write `len` using the minimal encoding (respecting the configured
    /// minimum length size); returns the length field size written.
    pub fn write_length(&mut self, len: u64) -> Result<u8> {
        let llen = self.llen_for(len);
        self.write_fixed_length(llen, len)?;
        Ok(llen)
    }

    /// Write `len` in a length field of exactly `llen` bytes, padding the
    /// length-of-length as needed. Fails if `len` is not representable.
    pub fn write_fixed_length(&mut self, llen: u8, len: u64) -> Result<()> {
        if llen == 0 || llen > 9 {
            return Err(MxfError::malformed_length(format!(
                "length field size {llen} outside supported range 1..=9"
            )));
        }

        if llen == 1 {
            if len >= 0x80 {
                return Err(MxfError::malformed_length(format!(
                    "cannot encode length {len} in a 1-byte field"
                )));
            }
            return self.write_u8(len as u8);
        }

        let num_len_bytes = llen - 1;
        if num_len_bytes < 8 && (len >> (num_len_bytes * 8)) > 0 {
            return Err(MxfError::malformed_length(format!(
                "cannot encode length {len} in a {llen}-byte field"
            )));
        }

        let mut buffer = [0u8; 9];
        buffer[0] = 0x80 + num_len_bytes;
        for i in 0..num_len_bytes {
            buffer[(num_len_bytes - i) as usize] = ((len >> (i * 8)) & 0xff) as u8;
        }
        self.write_all(&buffer[..llen as usize])
    }

    /// Read a key-length pair.
    pub fn read_kl(&mut self) -> Result<(Key, u8, u64)> {
        let key = self.read_key()?;
        let (llen, len) = self.read_length()?;
        Ok((key, llen, len))
    }

    /// Write a key-length pair with minimal length encoding; returns the
    /// length field size written.
    pub fn write_kl(&mut self, key: &Key, len: u64) -> Result<u8> {
        self.write_key(key)?;
        self.write_length(len)
    }

    /// Write a key-length pair with a fixed-width length field.
    pub fn write_fixed_kl(&mut self, key: &Key, llen: u8, len: u64) -> Result<()> {
        self.write_key(key)?;
        self.write_fixed_length(llen, len)
    }

    /// Read key-length pairs, skipping and discarding KLV Fill items, and
    /// return the first non-filler pair.
    ///
    /// This is the primary "what's next" primitive used by partition and
    /// essence scanning.
    pub fn read_next_nonfiller_kl(&mut self) -> Result<(Key, u8, u64)> {
        let (mut key, mut llen, mut len) = self.read_kl()?;
        while is_filler(&key) {
            self.skip(len)?;
            (key, llen, len) = self.read_kl()?;
        }
        Ok((key, llen, len))
    }

    /// Read a batch header: element count and element length.
    pub fn read_batch_header(&mut self) -> Result<(u32, u32)> {
        let count = self.read_u32()?;
        let element_len = self.read_u32()?;
        Ok((count, element_len))
    }

    /// Write a batch header.
    pub fn write_batch_header(&mut self, count: u32, element_len: u32) -> Result<()> {
        self.write_u32(count)?;
        self.write_u32(element_len)
    }

    /// Read an array header; same wire layout as a batch header.
    pub fn read_array_header(&mut self) -> Result<(u32, u32)> {
        self.read_batch_header()
    }

    /// Write an array header.
    pub fn write_array_header(&mut self, count: u32, element_len: u32) -> Result<()> {
        self.write_batch_header(count, element_len)
    }

    /// Read a local set tag.
    pub fn read_local_tag(&mut self) -> Result<u16> {
        self.read_u16()
    }

    /// Read a local set tag-length pair.
    pub fn read_local_tl(&mut self) -> Result<(u16, u16)> {
        let tag = self.read_local_tag()?;
        let len = self.read_u16()?;
        Ok((tag, len))
    }

    /// Write a local set tag.
    pub fn write_local_tag(&mut self, tag: u16) -> Result<()> {
        self.write_u16(tag)
    }

    /// Write a local set tag-length pair.
    pub fn write_local_tl(&mut self, tag: u16, len: u16) -> Result<()> {
        self.write_local_tag(tag)?;
        self.write_u16(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::labels::{INDEX_TABLE_SEGMENT_KEY, KLV_FILL_KEY};
    use crate::io::stream::SeekFrom;

    #[test]
    fn test_length_round_trip_minimal_forms() {
        let values = [
            0u64,
            1,
            0x7f,
            0x80,
            0xff,
            0x100,
            0xffff,
            0x10000,
            0xff_ffff,
            0x1_0000_0000,
            u64::MAX,
        ];

        for &value in &values {
            let mut file = MxfFile::memory();
            let llen = file.write_length(value).unwrap();
            assert_eq!(file.tell().unwrap(), llen as u64);

            file.seek(SeekFrom::Start(0)).unwrap();
            let (read_llen, read_value) = file.read_length().unwrap();
            assert_eq!(read_llen, llen, "llen mismatch for {value:#x}");
            assert_eq!(read_value, value, "value mismatch for {value:#x}");
        }
    }

    #[test]
    fn test_length_encoding_is_minimal() {
        let mut file = MxfFile::memory();
        assert_eq!(file.write_length(0x7f).unwrap(), 1);

        let mut file = MxfFile::memory();
        assert_eq!(file.write_length(0x80).unwrap(), 2);

        let mut file = MxfFile::memory();
        assert_eq!(file.write_length(0x100).unwrap(), 3);
    }

    #[test]
    fn test_min_llen_raises_encoding_size() {
        let mut file = MxfFile::memory();
        file.set_min_llen(4);
        assert_eq!(file.write_length(5).unwrap(), 4);

        file.seek(SeekFrom::Start(0)).unwrap();
        let (llen, len) = file.read_length().unwrap();
        assert_eq!((llen, len), (4, 5));
    }

    #[test]
    fn test_fixed_length_pads_and_round_trips() {
        let mut file = MxfFile::memory();
        file.write_fixed_length(8, 1024).unwrap();
        assert_eq!(file.tell().unwrap(), 8);

        file.seek(SeekFrom::Start(0)).unwrap();
        let (llen, len) = file.read_length().unwrap();
        assert_eq!((llen, len), (8, 1024));
    }

    #[test]
    fn test_fixed_length_rejects_unrepresentable() {
        let mut file = MxfFile::memory();
        assert!(matches!(
            file.write_fixed_length(1, 0x80).unwrap_err(),
            MxfError::MalformedLength { .. }
        ));
        assert!(matches!(
            file.write_fixed_length(2, 0x100).unwrap_err(),
            MxfError::MalformedLength { .. }
        ));
        // 9-byte field holds any u64
        file.write_fixed_length(9, u64::MAX).unwrap();
    }

    #[test]
    fn test_read_length_rejects_oversized_length_of_length() {
        let mut file = MxfFile::memory();
        file.write_u8(0x89).unwrap(); // 9 length bytes
        file.seek(SeekFrom::Start(0)).unwrap();
        assert!(matches!(
            file.read_length().unwrap_err(),
            MxfError::MalformedLength { .. }
        ));
    }

    #[test]
    fn test_read_length_rejects_truncated_field() {
        let mut file = MxfFile::memory();
        file.write_u8(0x84).unwrap();
        file.write_u8(0x01).unwrap(); // declares 4 length bytes, provides 1
        file.seek(SeekFrom::Start(0)).unwrap();
        assert!(matches!(
            file.read_length().unwrap_err(),
            MxfError::MalformedLength { .. }
        ));
    }

    #[test]
    fn test_kl_round_trip() {
        let mut file = MxfFile::memory();
        file.write_kl(&INDEX_TABLE_SEGMENT_KEY, 300).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let (key, llen, len) = file.read_kl().unwrap();
        assert_eq!(key, INDEX_TABLE_SEGMENT_KEY);
        assert_eq!(llen, 3);
        assert_eq!(len, 300);
    }

    #[test]
    fn test_read_next_nonfiller_kl_skips_fillers() {
        let mut file = MxfFile::memory();
        file.write_kl(&KLV_FILL_KEY, 10).unwrap();
        file.write_zeros(10).unwrap();
        file.write_kl(&KLV_FILL_KEY, 3).unwrap();
        file.write_zeros(3).unwrap();
        file.write_kl(&INDEX_TABLE_SEGMENT_KEY, 7).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let (key, _llen, len) = file.read_next_nonfiller_kl().unwrap();
        assert_eq!(key, INDEX_TABLE_SEGMENT_KEY);
        assert_eq!(len, 7);
    }

    #[test]
    fn test_local_tl_and_batch_header_round_trip() {
        let mut file = MxfFile::memory();
        file.write_local_tl(0x3f0a, 0x0123).unwrap();
        file.write_batch_header(5, 16).unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(file.read_local_tl().unwrap(), (0x3f0a, 0x0123));
        assert_eq!(file.read_batch_header().unwrap(), (5, 16));
    }
}
