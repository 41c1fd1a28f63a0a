// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Essence element reader/writer.
//!
//! Streams one KLV-wrapped essence element's payload with bounded memory.
//! Writers either declare the total length up front or stream in
//! unknown-length mode: a placeholder fixed-width length field is written,
//! data is appended, and a finalize step seeks back and patches the true
//! length. Unknown-length mode therefore requires a seekable target.

use crate::core::error::{MxfError, Result};
use crate::core::types::{Key, KEY_LEN};
use crate::io::file::MxfFile;
use crate::io::stream::SeekFrom;

/// Handle for one essence element being written or read.
#[derive(Debug)]
pub struct EssenceElement {
    key: Key,
    llen: u8,
    start_file_pos: u64,
    current_file_pos: u64,
    total_len: u64,
    unknown_len: bool,
}

impl EssenceElement {
    /// The element's key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The element's length field width.
    pub fn llen(&self) -> u8 {
        self.llen
    }

    /// Total payload bytes: the declared length when reading, the
    /// accumulated count when writing.
    pub fn size(&self) -> u64 {
        self.total_len
    }

    /// Open an element for writing at the current file position.
    ///
    /// `len == 0` selects unknown-length mode: the fixed `llen`-byte length
    /// field is written as a placeholder and patched by
    /// [`EssenceElement::finalize_write`] once the total is known.
    pub fn open_write(file: &mut MxfFile, key: &Key, llen: u8, len: u64) -> Result<EssenceElement> {
        let start_file_pos = file.tell()?;
        file.write_key(key)?;
        file.write_fixed_length(llen, len)?;

        Ok(EssenceElement {
            key: *key,
            llen,
            start_file_pos,
            current_file_pos: start_file_pos + KEY_LEN as u64 + llen as u64,
            total_len: 0,
            unknown_len: len == 0,
        })
    }

    /// Append payload bytes. Data goes straight to the stream; memory use
    /// is bounded regardless of the total essence size.
    pub fn write_data(&mut self, file: &mut MxfFile, data: &[u8]) -> Result<()> {
        file.write_all(data)?;
        self.total_len += data.len() as u64;
        self.current_file_pos += data.len() as u64;
        Ok(())
    }

    /// Patch the length field with the accumulated total. Only valid in
    /// unknown-length mode; requires a seekable target.
    pub fn finalize_write(&mut self, file: &mut MxfFile) -> Result<()> {
        if !self.unknown_len {
            return Err(MxfError::io(
                "essence element",
                "finalize is only valid for an unknown-length write",
            ));
        }
        if !file.is_seekable() {
            return Err(MxfError::non_seekable("unknown-length essence finalize"));
        }

        let file_pos = file.tell()?;
        file.seek(SeekFrom::Start(self.start_file_pos + KEY_LEN as u64))?;
        file.write_fixed_length(self.llen, self.total_len)?;
        file.seek(SeekFrom::Start(file_pos))?;

        Ok(())
    }

    /// Open an element for reading; the KL has been consumed and `len` is
    /// the declared payload length.
    pub fn open_read(file: &mut MxfFile, key: &Key, llen: u8, len: u64) -> Result<EssenceElement> {
        let start_file_pos = file.tell()?;
        Ok(EssenceElement {
            key: *key,
            llen,
            start_file_pos,
            current_file_pos: start_file_pos,
            total_len: len,
            unknown_len: false,
        })
    }

    /// Read up to `buf.len()` payload bytes, bounded by the element's
    /// declared length. Returns fewer bytes than requested only at the
    /// element's end; returns 0 past the end.
    pub fn read_data(&mut self, file: &mut MxfFile, buf: &mut [u8]) -> Result<usize> {
        let consumed = self.current_file_pos - self.start_file_pos;
        if consumed >= self.total_len {
            return Ok(0);
        }

        let num_read = (buf.len() as u64).min(self.total_len - consumed) as usize;
        file.read_exact(&mut buf[..num_read])?;
        self.current_file_pos += num_read as u64;
        Ok(num_read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::labels::gc_essence_element_key;

    fn element_key() -> Key {
        gc_essence_element_key(0x16, 0x01, 0x01, 0x01)
    }

    #[test]
    fn test_known_length_write() {
        let mut file = MxfFile::memory();
        let key = element_key();
        let mut element = EssenceElement::open_write(&mut file, &key, 4, 8).unwrap();
        element.write_data(&mut file, b"01234567").unwrap();
        assert_eq!(element.size(), 8);

        file.seek(SeekFrom::Start(0)).unwrap();
        let (read_key, llen, len) = file.read_kl().unwrap();
        assert_eq!(read_key, key);
        assert_eq!((llen, len), (4, 8));
    }

    #[test]
    fn test_unknown_length_finalize_patches_length() {
        let mut file = MxfFile::memory();
        let key = element_key();
        let mut element = EssenceElement::open_write(&mut file, &key, 8, 0).unwrap();
        element.write_data(&mut file, b"abc").unwrap();
        element.write_data(&mut file, b"defgh").unwrap();
        element.finalize_write(&mut file).unwrap();

        // write position is preserved for subsequent elements
        assert_eq!(file.tell().unwrap(), 16 + 8 + 8);

        file.seek(SeekFrom::Start(0)).unwrap();
        let (_key, llen, len) = file.read_kl().unwrap();
        assert_eq!((llen, len), (8, 8));
    }

    #[test]
    fn test_finalize_invalid_for_known_length() {
        let mut file = MxfFile::memory();
        let key = element_key();
        let mut element = EssenceElement::open_write(&mut file, &key, 4, 10).unwrap();
        assert!(element.finalize_write(&mut file).is_err());
    }

    #[test]
    fn test_read_bounded_by_declared_length() {
        let mut file = MxfFile::memory();
        let key = element_key();
        let mut element = EssenceElement::open_write(&mut file, &key, 4, 10).unwrap();
        element.write_data(&mut file, b"0123456789").unwrap();
        file.write_all(b"trailing").unwrap();

        file.seek(SeekFrom::Start(0)).unwrap();
        let (read_key, llen, len) = file.read_kl().unwrap();
        let mut element = EssenceElement::open_read(&mut file, &read_key, llen, len).unwrap();

        let mut buf = [0u8; 6];
        assert_eq!(element.read_data(&mut file, &mut buf).unwrap(), 6);
        assert_eq!(&buf, b"012345");
        // short read at element end, not at the trailing bytes
        assert_eq!(element.read_data(&mut file, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"6789");
        assert_eq!(element.read_data(&mut file, &mut buf).unwrap(), 0);
    }
}
