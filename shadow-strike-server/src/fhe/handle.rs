//! Ciphertext Handles
//!
//! A handle is a 32-byte opaque reference to a value sealed inside the
//! backend. Byte 30 carries the encrypted type and byte 31 the handle
//! format version, so a handle can be type-checked without a backend call.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::hash::Digest32;
use crate::fhe::FheError;

/// Handle format version stamped into byte 31.
pub const HANDLE_VERSION: u8 = 1;

const TYPE_BYTE: usize = 30;
const VERSION_BYTE: usize = 31;

/// Encrypted value types understood by the evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FheType {
    /// Encrypted boolean (comparison results).
    Bool = 0,
    /// Encrypted 32-bit unsigned integer, wrapping arithmetic.
    Uint32 = 4,
}

impl FheType {
    /// Decode from the handle type byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Bool),
            4 => Some(Self::Uint32),
            _ => None,
        }
    }
}

/// Opaque ciphertext handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ciphertext([u8; 32]);

impl Ciphertext {
    /// Build a handle from a derivation digest, stamping type and version.
    pub fn from_digest(digest: Digest32, ty: FheType) -> Self {
        let mut bytes = digest;
        bytes[TYPE_BYTE] = ty as u8;
        bytes[VERSION_BYTE] = HANDLE_VERSION;
        Self(bytes)
    }

    /// Wrap raw bytes received from outside. Not validated until used.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypted type carried by this handle.
    pub fn fhe_type(&self) -> Result<FheType, FheError> {
        if self.0[VERSION_BYTE] != HANDLE_VERSION {
            return Err(FheError::MalformedHandle(*self));
        }
        FheType::from_u8(self.0[TYPE_BYTE]).ok_or(FheError::MalformedHandle(*self))
    }

    /// Full `0x` hex rendering.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse a `0x` hex handle.
    pub fn from_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({}…)", crate::core::hash::short_hex(&self.0))
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Ciphertext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ciphertext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid ciphertext handle"))
    }
}
