//! Player Registry
//!
//! Tracks who is registered, in what order, and under which name.
//! Registration draws the three attributes as encrypted randomness, grants
//! the owner decryption rights, and hands the handles to the vault. No
//! plaintext attribute ever exists on this side of the backend.

use std::collections::BTreeMap;

use tracing::debug;

use crate::battle::error::ArenaError;
use crate::battle::player::{validate_name, EncryptedStats, Player};
use crate::battle::rules::{StatRange, ATTACK_RANGE, DEFENSE_RANGE, HP_RANGE};
use crate::battle::vault::AttributeVault;
use crate::core::identity::PlayerId;
use crate::fhe::{Ciphertext, FheEvaluator};

/// Public registration data for one player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Display name.
    pub name: String,
    /// Zero-based registration order.
    pub index: usize,
    /// Unix seconds.
    pub registered_at: u64,
}

/// Registered players, enumerable in registration order.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    entries: BTreeMap<PlayerId, RegistryEntry>,
    order: Vec<PlayerId>,
}

impl PlayerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `who` under `name`.
    ///
    /// Validation happens before anything is drawn or stored; on any error
    /// neither the registry nor the vault is modified.
    pub fn register<E: FheEvaluator + ?Sized>(
        &mut self,
        vault: &mut AttributeVault,
        backend: &E,
        who: PlayerId,
        name: &str,
        registered_at: u64,
    ) -> Result<&RegistryEntry, ArenaError> {
        validate_name(name)?;
        if self.entries.contains_key(&who) {
            return Err(ArenaError::AlreadyRegistered(who));
        }

        let stats = generate_stats(backend, who)?;
        vault.store(who, stats)?;

        let index = self.order.len();
        self.order.push(who);
        let entry = self.entries.entry(who).or_insert(RegistryEntry {
            name: name.to_owned(),
            index,
            registered_at,
        });

        debug!(player = %who.short(), index, "Player registered");
        Ok(entry)
    }

    /// Whether `who` is registered.
    pub fn contains(&self, who: &PlayerId) -> bool {
        self.entries.contains_key(who)
    }

    /// Registration data for `who`.
    pub fn entry(&self, who: &PlayerId) -> Option<&RegistryEntry> {
        self.entries.get(who)
    }

    /// Identities in registration order.
    pub fn ids(&self) -> &[PlayerId] {
        &self.order
    }

    /// Full record for `who`, combining registry data with vault handles.
    pub fn player(&self, vault: &AttributeVault, who: &PlayerId) -> Result<Player, ArenaError> {
        let entry = self.entries.get(who).ok_or(ArenaError::PlayerNotFound(*who))?;
        let stats = vault.read(who)?;
        Ok(Player {
            id: *who,
            name: entry.name.clone(),
            stats,
            registered: true,
            index: entry.index,
            registered_at: entry.registered_at,
        })
    }

    /// Every player in registration order.
    pub fn players(&self, vault: &AttributeVault) -> Result<Vec<Player>, ArenaError> {
        self.order.iter().map(|who| self.player(vault, who)).collect()
    }

    /// Number of registered players.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nobody has registered yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Draw an encrypted attribute triple and grant it to `owner`.
pub fn generate_stats<E: FheEvaluator + ?Sized>(
    backend: &E,
    owner: PlayerId,
) -> Result<EncryptedStats, ArenaError> {
    let stats = EncryptedStats {
        attack: draw(backend, ATTACK_RANGE, owner)?,
        defense: draw(backend, DEFENSE_RANGE, owner)?,
        hp: draw(backend, HP_RANGE, owner)?,
    };
    Ok(stats)
}

fn draw<E: FheEvaluator + ?Sized>(
    backend: &E,
    range: StatRange,
    owner: PlayerId,
) -> Result<Ciphertext, ArenaError> {
    let ct = backend
        .rand_bounded(range.min, range.max)
        .map_err(ArenaError::crypto)?;
    backend.allow(&ct, owner).map_err(ArenaError::crypto)?;
    Ok(ct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::error::NameError;
    use crate::fhe::{DecryptionOracle, LocalCoprocessor};

    fn id(n: u8) -> PlayerId {
        PlayerId::new([n; 20])
    }

    #[test]
    fn test_register_assigns_order() {
        let backend = LocalCoprocessor::default();
        let mut registry = PlayerRegistry::new();
        let mut vault = AttributeVault::new();

        registry.register(&mut vault, &backend, id(1), "Alice", 100).unwrap();
        registry.register(&mut vault, &backend, id(2), "Bob", 101).unwrap();

        assert_eq!(registry.ids(), &[id(1), id(2)]);
        assert_eq!(registry.entry(&id(2)).unwrap().index, 1);
        assert_eq!(vault.len(), 2);
    }

    #[test]
    fn test_duplicate_registration_changes_nothing() {
        let backend = LocalCoprocessor::default();
        let mut registry = PlayerRegistry::new();
        let mut vault = AttributeVault::new();

        registry.register(&mut vault, &backend, id(1), "Alice", 100).unwrap();
        let before = vault.read(&id(1)).unwrap();

        let err = registry.register(&mut vault, &backend, id(1), "Mallory", 200).unwrap_err();
        assert_eq!(err, ArenaError::AlreadyRegistered(id(1)));
        assert_eq!(registry.entry(&id(1)).unwrap().name, "Alice");
        assert_eq!(vault.read(&id(1)).unwrap(), before);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_name_rejected_before_drawing() {
        let backend = LocalCoprocessor::default();
        let mut registry = PlayerRegistry::new();
        let mut vault = AttributeVault::new();

        let err = registry.register(&mut vault, &backend, id(1), "", 100).unwrap_err();
        assert_eq!(err, ArenaError::InvalidName(NameError::Empty));
        assert!(registry.is_empty());
        assert!(vault.is_empty());
        assert_eq!(backend.sealed_count(), 0);
    }

    #[test]
    fn test_player_view() {
        let backend = LocalCoprocessor::default();
        let mut registry = PlayerRegistry::new();
        let mut vault = AttributeVault::new();
        registry.register(&mut vault, &backend, id(1), "Alice", 100).unwrap();

        let player = registry.player(&vault, &id(1)).unwrap();
        assert!(player.registered);
        assert_eq!(player.name, "Alice");
        assert_eq!(player.stats, vault.read(&id(1)).unwrap());

        assert_eq!(
            registry.player(&vault, &id(7)),
            Err(ArenaError::PlayerNotFound(id(7)))
        );
    }

    #[tokio::test]
    async fn test_stats_in_range_and_owner_only() {
        let backend = LocalCoprocessor::default();
        let stats = generate_stats(&backend, id(1)).unwrap();

        let attack = backend.decrypt(stats.attack, id(1)).await.unwrap();
        let defense = backend.decrypt(stats.defense, id(1)).await.unwrap();
        let hp = backend.decrypt(stats.hp, id(1)).await.unwrap();
        assert!((ATTACK_RANGE.min..=ATTACK_RANGE.max).contains(&attack));
        assert!((DEFENSE_RANGE.min..=DEFENSE_RANGE.max).contains(&defense));
        assert!((HP_RANGE.min..=HP_RANGE.max).contains(&hp));

        for ct in stats.handles() {
            assert!(!backend.is_allowed(&ct, &id(2)));
        }
    }
}
