//! Player Identity
//!
//! Address-like 20-byte key. Rendered and parsed as `0x`-prefixed hex so
//! JSON clients see the same shape as a wallet address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Length of an identity in bytes.
pub const IDENTITY_LEN: usize = 20;

/// Unique player identifier.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PlayerId(pub [u8; IDENTITY_LEN]);

/// Error parsing an identity from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityParseError {
    /// Not valid hex.
    #[error("identity is not valid hex")]
    InvalidHex,
    /// Wrong byte length.
    #[error("identity must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive an identity from an external subject string (e.g. a JWT `sub`).
    pub fn derive(subject: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"shadow-strike-player:");
        hasher.update(subject.as_bytes());
        let hash = hasher.finalize();

        let mut id = [0u8; IDENTITY_LEN];
        id.copy_from_slice(&hash[..IDENTITY_LEN]);
        Self(id)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Full `0x` hex rendering.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// First four bytes, for log lines.
    pub fn short(&self) -> String {
        crate::core::hash::short_hex(&self.0)
    }
}

impl FromStr for PlayerId {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| IdentityParseError::InvalidHex)?;
        if bytes.len() != IDENTITY_LEN {
            return Err(IdentityParseError::InvalidLength(bytes.len()));
        }
        let mut id = [0u8; IDENTITY_LEN];
        id.copy_from_slice(&bytes);
        Ok(Self(id))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.short())
    }
}

impl Serialize for PlayerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let id = PlayerId::new([0xab; IDENTITY_LEN]);
        let parsed: PlayerId = id.to_hex().parse().unwrap();
        assert_eq!(parsed, id);

        // Prefix is optional on input
        let bare: PlayerId = hex::encode(id.0).parse().unwrap();
        assert_eq!(bare, id);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("0xzz".parse::<PlayerId>(), Err(IdentityParseError::InvalidHex));
        assert_eq!("0xabcd".parse::<PlayerId>(), Err(IdentityParseError::InvalidLength(2)));
    }

    #[test]
    fn test_derive_is_stable_per_subject() {
        assert_eq!(PlayerId::derive("user123"), PlayerId::derive("user123"));
        assert_ne!(PlayerId::derive("user123"), PlayerId::derive("user456"));
    }

    #[test]
    fn test_json_shape() {
        let id = PlayerId::new([1; IDENTITY_LEN]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "01".repeat(IDENTITY_LEN)));
        let back: PlayerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
