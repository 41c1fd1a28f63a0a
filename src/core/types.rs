// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Fundamental MXF value types.
//!
//! Keys, universal labels and UMIDs are fixed-size byte identifiers compared
//! byte-wise. Rationals and timestamps follow the SMPTE wire layouts used in
//! partition packs and index table segments.

use std::fmt;

use chrono::{Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Byte length of a key / universal label on the wire.
pub const KEY_LEN: usize = 16;

/// Byte length of a UMID on the wire.
pub const UMID_LEN: usize = 32;

/// A 16-byte SMPTE key, universal label or UUID.
///
/// Any 16 bytes form a valid key; no namespace validation is applied.
/// Octet 7 is the SMPTE registry-version octet and is ignored by
/// [`Key::equals_mod_regver`] label matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key(pub [u8; KEY_LEN]);

impl Key {
    /// The all-zero key.
    pub const NULL: Key = Key([0; KEY_LEN]);

    /// Create a key from raw bytes.
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Key(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Get one octet by index.
    pub fn octet(&self, index: usize) -> u8 {
        self.0[index]
    }

    /// Compare the first `len` octets of two keys.
    pub fn equals_prefix(&self, other: &Key, len: usize) -> bool {
        self.0[..len] == other.0[..len]
    }

    /// Compare two keys ignoring octet 7, the registry-version octet.
    ///
    /// Labels registered under different SMPTE registry versions are
    /// otherwise identical and must match.
    pub fn equals_mod_regver(&self, other: &Key) -> bool {
        self.0[..7] == other.0[..7] && self.0[8..] == other.0[8..]
    }

    /// True if all octets are zero.
    pub fn is_null(&self) -> bool {
        self.0 == [0; KEY_LEN]
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; KEY_LEN]> for Key {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Key(bytes)
    }
}

/// A 32-byte SMPTE UMID (unique material identifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Umid(pub [u8; UMID_LEN]);

impl Umid {
    /// The all-zero UMID.
    pub const NULL: Umid = Umid([0; UMID_LEN]);

    /// Create a UMID from raw bytes.
    pub const fn new(bytes: [u8; UMID_LEN]) -> Self {
        Umid(bytes)
    }
}

impl fmt::Display for Umid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A signed rational number, as stored in edit rates and pos tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: i32,
    pub denominator: i32,
}

impl Rational {
    /// Create a rational from numerator and denominator.
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Rational {
            numerator,
            denominator,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// An MXF timestamp: calendar date plus time with 1/250s precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub year: i16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    /// Quarter milliseconds (0..=249).
    pub qmsec: u8,
}

impl Timestamp {
    /// The current UTC time.
    pub fn now() -> Self {
        Self::from(Utc::now())
    }
}

impl<Tz: chrono::TimeZone> From<chrono::DateTime<Tz>> for Timestamp {
    fn from(dt: chrono::DateTime<Tz>) -> Self {
        let utc = dt.with_timezone(&Utc);
        Timestamp {
            year: utc.year() as i16,
            month: utc.month() as u8,
            day: utc.day() as u8,
            hour: utc.hour() as u8,
            min: utc.minute() as u8,
            sec: utc.second() as u8,
            qmsec: (utc.timestamp_subsec_millis() / 4).min(249) as u8,
        }
    }
}

/// Tri-state optional boolean used by index segment optional items.
///
/// Distinguishes "item not present" from an explicit false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptBool {
    #[default]
    NotPresent,
    False,
    True,
}

impl OptBool {
    /// True if the item is present (either value).
    pub fn is_present(&self) -> bool {
        !matches!(self, OptBool::NotPresent)
    }

    /// Wire value; only meaningful when present.
    pub fn wire_value(&self) -> u8 {
        u8::from(matches!(self, OptBool::True))
    }
}

impl From<u8> for OptBool {
    fn from(value: u8) -> Self {
        if value != 0 {
            OptBool::True
        } else {
            OptBool::False
        }
    }
}

/// Identification strings for the library build.
///
/// Passed explicitly to any component that needs version or platform
/// identification. Test harnesses construct the deterministic
/// [`BuildInfo::regression`] variant instead of swapping global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub toolkit_version: String,
    pub platform_string: String,
    pub scm_version: String,
}

impl BuildInfo {
    /// Build identification for the running library.
    pub fn current() -> Self {
        BuildInfo {
            toolkit_version: env!("CARGO_PKG_VERSION").to_string(),
            platform_string: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            scm_version: option_env!("MXFCODEC_SCM_VERSION")
                .unwrap_or("unknown")
                .to_string(),
        }
    }

    /// Deterministic identification for regression test output.
    pub fn regression() -> Self {
        BuildInfo {
            toolkit_version: "0.0.0".to_string(),
            platform_string: "regression test".to_string(),
            scm_version: "regression test".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equals_mod_regver() {
        let a = Key::new([
            0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00,
            0x00, 0x00,
        ]);
        let mut b = a;
        b.0[7] = 0x02;
        assert_ne!(a, b);
        assert!(a.equals_mod_regver(&b));

        let mut c = a;
        c.0[8] = 0x04;
        assert!(!a.equals_mod_regver(&c));
    }

    #[test]
    fn test_key_prefix_compare() {
        let a = Key::new([1; 16]);
        let mut b = a;
        b.0[13] = 9;
        assert!(a.equals_prefix(&b, 13));
        assert!(!a.equals_prefix(&b, 14));
    }

    #[test]
    fn test_key_display_is_hex() {
        let key = Key::new([
            0x06, 0x0e, 0x2b, 0x34, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff,
        ]);
        assert_eq!(key.to_string(), "060e2b340000000000000000000000ff");
    }

    #[test]
    fn test_opt_bool_wire() {
        assert!(!OptBool::NotPresent.is_present());
        assert!(OptBool::False.is_present());
        assert_eq!(OptBool::True.wire_value(), 1);
        assert_eq!(OptBool::False.wire_value(), 0);
        assert_eq!(OptBool::from(7u8), OptBool::True);
        assert_eq!(OptBool::from(0u8), OptBool::False);
    }

    #[test]
    fn test_timestamp_from_chrono() {
        let dt = chrono::DateTime::parse_from_rfc3339("2025-03-04T05:06:07.100Z").unwrap();
        let ts = Timestamp::from(dt);
        assert_eq!(ts.year, 2025);
        assert_eq!(ts.month, 3);
        assert_eq!(ts.day, 4);
        assert_eq!(ts.hour, 5);
        assert_eq!(ts.min, 6);
        assert_eq!(ts.sec, 7);
        assert_eq!(ts.qmsec, 25);
    }

    #[test]
    fn test_build_info_regression_is_deterministic() {
        assert_eq!(BuildInfo::regression(), BuildInfo::regression());
        assert_eq!(BuildInfo::regression().platform_string, "regression test");
    }
}
