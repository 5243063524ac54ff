//! Domain-Separated Hashing
//!
//! SHA-256 helpers shared by the coprocessor (handle derivation), the
//! ledger (running digest) and the arena (transaction handles).
//! Order of updates is part of every digest's definition.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type Digest32 = [u8; 32];

/// Domain for ciphertext handle derivation.
pub const HANDLE_DOMAIN: &[u8] = b"SHADOW_STRIKE_HANDLE_V1";

/// Domain for the ledger hash chain.
pub const LEDGER_DOMAIN: &[u8] = b"SHADOW_STRIKE_LEDGER_V1";

/// Domain for transaction confirmation handles.
pub const TX_DOMAIN: &[u8] = b"SHADOW_STRIKE_TX_V1";

/// Incremental hasher with a domain separator.
pub struct DomainHasher {
    hasher: Sha256,
}

impl DomainHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Digest32 {
        self.hasher.finalize().into()
    }
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Digest32 {
    let mut hasher = DomainHasher::new(domain);
    hasher.update_bytes(data);
    hasher.finalize()
}

/// Short hex prefix for log lines.
pub fn short_hex(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(4)])
}

// =============================================================================
// TESTS
// =============================================================================
