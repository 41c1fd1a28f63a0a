// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tests for the KLV primitive codec.
//!
//! Run with: cargo test --test klv_tests

use mxfcodec::core::labels::{
    gc_essence_element_key, is_gc_essence_element, KLV_FILL_KEY, RANDOM_INDEX_PACK_KEY,
};
use mxfcodec::io::file::MxfFile;
use mxfcodec::io::stream::SeekFrom;
use mxfcodec::MxfError;

/// Every value representable in at most 8 length octets must round-trip,
/// and the encoder must pick the minimal form.
#[test]
fn test_length_round_trip_sweep() {
    let mut values = vec![0u64, 1, 0x7e, 0x7f, 0x80, 0x81];
    for shift in 8..64 {
        let value = 1u64 << shift;
        values.push(value - 1);
        values.push(value);
        values.push(value + 1);
    }
    values.push(u64::MAX);

    for value in values {
        let mut file = MxfFile::memory();
        let llen = file.write_length(value).unwrap();

        // minimal form: short form below 0x80, otherwise
        // 1 + smallest number of big-endian bytes holding the value
        let expected_llen = if value < 0x80 {
            1
        } else {
            1 + (8 - (value.leading_zeros() / 8) as u8)
        };
        assert_eq!(llen, expected_llen, "non-minimal encoding for {value:#x}");

        file.seek(SeekFrom::Start(0)).unwrap();
        let (read_llen, read_value) = file.read_length().unwrap();
        assert_eq!(read_llen, llen);
        assert_eq!(read_value, value);
    }
}

#[test]
fn test_fixed_length_width_reserved() {
    for llen in 1..=9u8 {
        let value = 0x42u64;
        let mut file = MxfFile::memory();
        file.write_fixed_length(llen, value).unwrap();
        assert_eq!(file.tell().unwrap(), llen as u64);

        file.seek(SeekFrom::Start(0)).unwrap();
        let (read_llen, read_value) = file.read_length().unwrap();
        assert_eq!(read_llen, llen);
        assert_eq!(read_value, value);
    }
}

#[test]
fn test_fixed_length_patch_in_place() {
    // reserve an 8-byte field, then patch it with the final value
    let mut file = MxfFile::memory();
    file.write_fixed_length(8, 0).unwrap();
    file.write_all(b"payload bytes").unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_fixed_length(8, 13).unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let (llen, len) = file.read_length().unwrap();
    assert_eq!((llen, len), (8, 13));
}

#[test]
fn test_write_fixed_length_width_too_small() {
    let mut file = MxfFile::memory();
    // 3-byte field holds two length octets: max 0xffff
    assert!(file.write_fixed_length(3, 0xffff).is_ok());
    assert!(matches!(
        file.write_fixed_length(3, 0x10000).unwrap_err(),
        MxfError::MalformedLength { .. }
    ));
}

#[test]
fn test_malformed_length_of_length() {
    for first_byte in [0x89u8, 0x8f, 0xff] {
        let mut file = MxfFile::memory();
        file.write_u8(first_byte).unwrap();
        file.write_zeros(16).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        assert!(matches!(
            file.read_length().unwrap_err(),
            MxfError::MalformedLength { .. }
        ));
    }
}

#[test]
fn test_key_round_trip() {
    let key = gc_essence_element_key(0x15, 0x01, 0x05, 0x01);
    let mut file = MxfFile::memory();
    file.write_key(&key).unwrap();
    assert_eq!(file.tell().unwrap(), 16);

    file.seek(SeekFrom::Start(0)).unwrap();
    let read_key = file.read_key().unwrap();
    assert_eq!(read_key, key);
    assert!(is_gc_essence_element(&read_key));
}

#[test]
fn test_kl_with_min_llen() {
    let mut file = MxfFile::memory();
    file.set_min_llen(4);
    let key = gc_essence_element_key(0x16, 0x01, 0x01, 0x01);
    let llen = file.write_kl(&key, 42).unwrap();
    assert_eq!(llen, 4);
    assert_eq!(file.tell().unwrap(), 20);

    file.seek(SeekFrom::Start(0)).unwrap();
    let (read_key, read_llen, read_len) = file.read_kl().unwrap();
    assert_eq!(read_key, key);
    assert_eq!((read_llen, read_len), (4, 42));
}

#[test]
fn test_nonfiller_scan_over_mixed_klvs() {
    let mut file = MxfFile::memory();

    // filler, essence, filler, filler, RIP
    file.write_kl(&KLV_FILL_KEY, 100).unwrap();
    file.write_zeros(100).unwrap();
    let essence_key = gc_essence_element_key(0x16, 0x01, 0x01, 0x01);
    file.write_kl(&essence_key, 4).unwrap();
    file.write_all(b"data").unwrap();
    file.write_kl(&KLV_FILL_KEY, 0).unwrap();
    file.write_kl(&KLV_FILL_KEY, 1).unwrap();
    file.write_zeros(1).unwrap();
    file.write_kl(&RANDOM_INDEX_PACK_KEY, 4).unwrap();
    file.write_u32(0).unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let (key, _llen, len) = file.read_next_nonfiller_kl().unwrap();
    assert_eq!(key, essence_key);
    file.skip(len).unwrap();

    let (key, _llen, _len) = file.read_next_nonfiller_kl().unwrap();
    assert_eq!(key, RANDOM_INDEX_PACK_KEY);
}

#[test]
fn test_filler_matched_modulo_registry_version() {
    let mut file = MxfFile::memory();
    let mut compliant_fill = KLV_FILL_KEY;
    compliant_fill.0[7] = 0x02;
    file.write_kl(&compliant_fill, 8).unwrap();
    file.write_zeros(8).unwrap();
    let key = gc_essence_element_key(0x16, 0x01, 0x01, 0x01);
    file.write_kl(&key, 0).unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let (read_key, _llen, _len) = file.read_next_nonfiller_kl().unwrap();
    assert_eq!(read_key, key);
}
