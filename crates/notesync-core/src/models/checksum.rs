//! Content checksum

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;

/// Fixed-width BLAKE3 digest of a document's content.
///
/// Serialized as a 64 character lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; blake3::OUT_LEN]);

impl Checksum {
    /// Hash the given content
    #[must_use]
    pub fn of(content: &str) -> Self {
        Self(*blake3::hash(content.as_bytes()).as_bytes())
    }

    /// Check whether `content` hashes to this checksum
    #[must_use]
    pub fn matches(&self, content: &str) -> bool {
        *self == Self::of(content)
    }

    /// Hex representation used on disk and on the wire
    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Checksum({})", &hex[..12])
    }
}

impl FromStr for Checksum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        blake3::Hash::from_hex(s.trim())
            .map(|hash| Self(*hash.as_bytes()))
            .map_err(|error| Error::InvalidInput(format!("invalid checksum '{s}': {error}")))
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_checksum() {
        assert_eq!(Checksum::of("hello"), Checksum::of("hello"));
        assert_ne!(Checksum::of("hello"), Checksum::of("hello "));
    }

    #[test]
    fn hex_parses_back() {
        let checksum = Checksum::of("<p>note</p>");
        let hex = checksum.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<Checksum>().unwrap(), checksum);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!("not-a-checksum".parse::<Checksum>().is_err());
        assert!("abcd".parse::<Checksum>().is_err());
    }

    #[test]
    fn matches_detects_tampering() {
        let checksum = Checksum::of("original");
        assert!(checksum.matches("original"));
        assert!(!checksum.matches("tampered"));
    }

    #[test]
    fn serializes_as_hex_string() {
        let checksum = Checksum::of("");
        let json = serde_json::to_string(&checksum).unwrap();
        assert_eq!(json, format!("\"{}\"", checksum.to_hex()));
        let back: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(back, checksum);
    }
}
