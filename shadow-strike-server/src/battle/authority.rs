//! Decryption Authority
//!
//! Gatekeeper for the authorize-and-decrypt round trip. A requester may only
//! open the outcome recorded in their own history entry, or their own stats.
//!
//! "Not a participant" and "no such battle" take the same lookup path and
//! produce the same error, so the response does not reveal which battles
//! exist or who fought them.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::battle::error::ArenaError;
use crate::battle::ledger::{BattleId, BattleLedger};
use crate::battle::player::EncryptedStats;
use crate::battle::rules::{BattleOutcome, PlainStats};
use crate::core::identity::PlayerId;
use crate::fhe::{Ciphertext, DecryptionOracle, FheError};

/// Authorization and timeout policy for decryption requests.
#[derive(Clone, Debug)]
pub struct DecryptionAuthority {
    timeout: Duration,
}

impl DecryptionAuthority {
    /// Create an authority that bounds every round trip by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Configured round-trip timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Find the outcome handle `requester` may open for `battle_id`.
    pub fn locate(
        ledger: &BattleLedger,
        requester: &PlayerId,
        battle_id: BattleId,
    ) -> Result<Ciphertext, ArenaError> {
        ledger
            .entry(requester, battle_id)
            .map(|entry| entry.outcome)
            .ok_or(ArenaError::EntryUnavailable { battle_id })
    }

    /// Decrypt a located outcome handle.
    ///
    /// The caller must not hold arena state locks while awaiting this.
    pub async fn open_outcome<O: DecryptionOracle>(
        &self,
        oracle: &O,
        requester: PlayerId,
        battle_id: BattleId,
        outcome: Ciphertext,
    ) -> Result<BattleOutcome, ArenaError> {
        let code = self.bounded(oracle.decrypt(outcome, requester)).await?;
        BattleOutcome::from_code(code).ok_or_else(|| {
            warn!(battle_id, code, "Decrypted outcome outside the code set");
            ArenaError::CryptoFault(FheError::MalformedHandle(outcome))
        })
    }

    /// Decrypt the owner's attribute triple.
    pub async fn open_stats<O: DecryptionOracle>(
        &self,
        oracle: &O,
        owner: PlayerId,
        stats: EncryptedStats,
    ) -> Result<PlainStats, ArenaError> {
        let (attack, defense, hp) = tokio::try_join!(
            self.bounded(oracle.decrypt(stats.attack, owner)),
            self.bounded(oracle.decrypt(stats.defense, owner)),
            self.bounded(oracle.decrypt(stats.hp, owner)),
        )?;
        Ok(PlainStats { attack, defense, hp })
    }

    async fn bounded<F>(&self, round_trip: F) -> Result<u32, ArenaError>
    where
        F: Future<Output = Result<u32, FheError>>,
    {
        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ArenaError::from_oracle(err)),
            Err(_) => Err(ArenaError::DecryptTimeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::engine::ResolvedOutcomes;
    use crate::fhe::{CoprocessorConfig, FheEvaluator, LocalCoprocessor};

    fn id(n: u8) -> PlayerId {
        PlayerId::new([n; 20])
    }

    fn ledger_with_battle(backend: &LocalCoprocessor, outcome: BattleOutcome) -> BattleLedger {
        let challenger = backend.encrypt(outcome.code()).unwrap();
        let opponent = backend.encrypt(outcome.complement().code()).unwrap();
        backend.allow(&challenger, id(1)).unwrap();
        backend.allow(&opponent, id(2)).unwrap();

        let mut ledger = BattleLedger::new();
        ledger
            .append(id(1), id(2), ResolvedOutcomes { challenger, opponent }, 0)
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_participants_open_their_own_outcome() {
        let backend = LocalCoprocessor::default();
        let ledger = ledger_with_battle(&backend, BattleOutcome::Win);
        let authority = DecryptionAuthority::new(Duration::from_secs(1));

        let ct = DecryptionAuthority::locate(&ledger, &id(1), 1).unwrap();
        let outcome = authority.open_outcome(&backend, id(1), 1, ct).await.unwrap();
        assert_eq!(outcome, BattleOutcome::Win);

        let ct = DecryptionAuthority::locate(&ledger, &id(2), 1).unwrap();
        let outcome = authority.open_outcome(&backend, id(2), 1, ct).await.unwrap();
        assert_eq!(outcome, BattleOutcome::Loss);
    }

    #[test]
    fn test_outsider_and_missing_battle_look_identical() {
        let backend = LocalCoprocessor::default();
        let ledger = ledger_with_battle(&backend, BattleOutcome::Draw);

        let outsider = DecryptionAuthority::locate(&ledger, &id(3), 1).unwrap_err();
        let missing = DecryptionAuthority::locate(&ledger, &id(3), 99).unwrap_err();
        assert_eq!(outsider, ArenaError::EntryUnavailable { battle_id: 1 });
        assert_eq!(missing, ArenaError::EntryUnavailable { battle_id: 99 });
        assert_eq!(outsider.kind(), missing.kind());
    }

    #[tokio::test]
    async fn test_out_of_range_plaintext_is_crypto_fault() {
        let backend = LocalCoprocessor::default();
        let bogus = backend.encrypt(7).unwrap();
        backend.allow(&bogus, id(1)).unwrap();
        let authority = DecryptionAuthority::new(Duration::from_secs(1));

        let err = authority.open_outcome(&backend, id(1), 1, bogus).await.unwrap_err();
        assert!(matches!(err, ArenaError::CryptoFault(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let backend = LocalCoprocessor::new(CoprocessorConfig {
            decrypt_latency: Duration::from_millis(200),
            ..CoprocessorConfig::default()
        });
        let ledger = ledger_with_battle(&backend, BattleOutcome::Win);
        let authority = DecryptionAuthority::new(Duration::from_millis(10));

        let ct = DecryptionAuthority::locate(&ledger, &id(1), 1).unwrap();
        let err = authority.open_outcome(&backend, id(1), 1, ct).await.unwrap_err();
        assert_eq!(err, ArenaError::DecryptTimeout(Duration::from_millis(10)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_open_stats_owner_only() {
        let backend = LocalCoprocessor::default();
        let stats = EncryptedStats {
            attack: backend.encrypt(30).unwrap(),
            defense: backend.encrypt(20).unwrap(),
            hp: backend.encrypt(150).unwrap(),
        };
        for ct in stats.handles() {
            backend.allow(&ct, id(1)).unwrap();
        }
        let authority = DecryptionAuthority::new(Duration::from_secs(1));

        let plain = authority.open_stats(&backend, id(1), stats).await.unwrap();
        assert_eq!(plain, PlainStats { attack: 30, defense: 20, hp: 150 });

        let err = authority.open_stats(&backend, id(2), stats).await.unwrap_err();
        assert_eq!(err, ArenaError::CryptoFault(FheError::Denied));
    }
}
