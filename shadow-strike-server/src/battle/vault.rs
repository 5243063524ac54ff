//! Attribute Vault
//!
//! Sole owner of every player's encrypted attribute handles. Write-once per
//! identity; reads hand out copies of the handles, never plaintext.

use std::collections::BTreeMap;

use crate::battle::error::ArenaError;
use crate::battle::player::EncryptedStats;
use crate::core::identity::PlayerId;

/// Write-once store of encrypted attributes.
#[derive(Debug, Default)]
pub struct AttributeVault {
    stats: BTreeMap<PlayerId, EncryptedStats>,
}

impl AttributeVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store attributes for `who`. A second store for the same identity fails.
    pub fn store(&mut self, who: PlayerId, stats: EncryptedStats) -> Result<(), ArenaError> {
        if self.stats.contains_key(&who) {
            return Err(ArenaError::AlreadyStored(who));
        }
        self.stats.insert(who, stats);
        Ok(())
    }

    /// Read the attributes stored for `who`.
    pub fn read(&self, who: &PlayerId) -> Result<EncryptedStats, ArenaError> {
        self.stats.get(who).copied().ok_or(ArenaError::PlayerNotFound(*who))
    }

    /// Whether attributes exist for `who`.
    pub fn contains(&self, who: &PlayerId) -> bool {
        self.stats.contains_key(who)
    }

    /// Number of stored triples.
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Whether the vault is empty.
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhe::{Ciphertext, FheType};

    fn stats(tag: u8) -> EncryptedStats {
        let ct = |n: u8| Ciphertext::from_digest([tag.wrapping_add(n); 32], FheType::Uint32);
        EncryptedStats { attack: ct(0), defense: ct(1), hp: ct(2) }
    }

    #[test]
    fn test_store_then_read() {
        let mut vault = AttributeVault::new();
        let who = PlayerId::new([1; 20]);
        vault.store(who, stats(10)).unwrap();
        assert_eq!(vault.read(&who).unwrap(), stats(10));
        assert_eq!(vault.len(), 1);
    }

    #[test]
    fn test_second_store_fails_and_keeps_first() {
        let mut vault = AttributeVault::new();
        let who = PlayerId::new([1; 20]);
        vault.store(who, stats(10)).unwrap();

        assert_eq!(vault.store(who, stats(50)), Err(ArenaError::AlreadyStored(who)));
        assert_eq!(vault.read(&who).unwrap(), stats(10));
    }

    #[test]
    fn test_read_unknown() {
        let vault = AttributeVault::new();
        let who = PlayerId::new([9; 20]);
        assert_eq!(vault.read(&who), Err(ArenaError::PlayerNotFound(who)));
        assert!(vault.is_empty());
    }
}
