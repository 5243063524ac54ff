//! Battle Engine
//!
//! Resolves a battle entirely over ciphertexts:
//!
//! ```text
//! power(p)  = 3·attack + 2·defense + 1·hp
//! code_c    = pC == pO ? 2 : (pC > pO ? 1 : 0)
//! code_o    = code_c == 2 ? code_c : 1 - code_c
//! ```
//!
//! The opponent's code is derived from the challenger's without a second
//! comparison, so the pair is always complementary. Each code is granted to
//! its own participant only.

use tracing::debug;

use crate::battle::error::ArenaError;
use crate::battle::player::EncryptedStats;
use crate::battle::registry::PlayerRegistry;
use crate::battle::rules::{BattleOutcome, ATTACK_WEIGHT, DEFENSE_WEIGHT, HP_WEIGHT};
use crate::battle::vault::AttributeVault;
use crate::core::identity::PlayerId;
use crate::fhe::{Ciphertext, FheError, FheEvaluator};

/// Encrypted outcome pair for one battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedOutcomes {
    /// Outcome as seen by the challenger, decryptable by them only.
    pub challenger: Ciphertext,
    /// Outcome as seen by the opponent, decryptable by them only.
    pub opponent: Ciphertext,
}

/// Encrypted power of a stat triple.
pub fn power<E: FheEvaluator + ?Sized>(
    backend: &E,
    stats: &EncryptedStats,
) -> Result<Ciphertext, FheError> {
    let attack = backend.mul_scalar(&stats.attack, ATTACK_WEIGHT)?;
    let defense = backend.mul_scalar(&stats.defense, DEFENSE_WEIGHT)?;
    let hp = backend.mul_scalar(&stats.hp, HP_WEIGHT)?;
    let partial = backend.add(&attack, &defense)?;
    backend.add(&partial, &hp)
}

/// Challenger outcome code from two encrypted powers.
pub fn compare<E: FheEvaluator + ?Sized>(
    backend: &E,
    challenger_power: &Ciphertext,
    opponent_power: &Ciphertext,
) -> Result<Ciphertext, FheError> {
    let win = backend.trivial(BattleOutcome::WIN_CODE)?;
    let loss = backend.trivial(BattleOutcome::LOSS_CODE)?;
    let draw = backend.trivial(BattleOutcome::DRAW_CODE)?;

    let equal = backend.eq(challenger_power, opponent_power)?;
    let greater = backend.gt(challenger_power, opponent_power)?;
    let decisive = backend.select(&greater, &win, &loss)?;
    backend.select(&equal, &draw, &decisive)
}

/// Opponent outcome code: draw stays draw, win and loss swap.
pub fn complement<E: FheEvaluator + ?Sized>(
    backend: &E,
    code: &Ciphertext,
) -> Result<Ciphertext, FheError> {
    let draw = backend.trivial(BattleOutcome::DRAW_CODE)?;
    let one = backend.trivial(1)?;

    let is_draw = backend.eq(code, &draw)?;
    let flipped = backend.sub(&one, code)?;
    backend.select(&is_draw, code, &flipped)
}

/// Resolve a battle between two registered players.
///
/// Nothing is recorded here; the caller appends the result to the ledger.
pub fn resolve<E: FheEvaluator + ?Sized>(
    registry: &PlayerRegistry,
    vault: &AttributeVault,
    backend: &E,
    challenger: PlayerId,
    opponent: PlayerId,
) -> Result<ResolvedOutcomes, ArenaError> {
    if challenger == opponent {
        return Err(ArenaError::SelfBattle);
    }
    for who in [challenger, opponent] {
        if !registry.contains(&who) {
            return Err(ArenaError::NotRegistered(who));
        }
    }

    let challenger_stats = vault.read(&challenger)?;
    let opponent_stats = vault.read(&opponent)?;

    let outcomes = evaluate(backend, &challenger_stats, &opponent_stats)
        .map_err(ArenaError::crypto)?;

    backend
        .allow(&outcomes.challenger, challenger)
        .map_err(ArenaError::crypto)?;
    backend
        .allow(&outcomes.opponent, opponent)
        .map_err(ArenaError::crypto)?;

    debug!(
        challenger = %challenger.short(),
        opponent = %opponent.short(),
        "Battle evaluated"
    );
    Ok(outcomes)
}

fn evaluate<E: FheEvaluator + ?Sized>(
    backend: &E,
    challenger: &EncryptedStats,
    opponent: &EncryptedStats,
) -> Result<ResolvedOutcomes, FheError> {
    let challenger_power = power(backend, challenger)?;
    let opponent_power = power(backend, opponent)?;
    let code = compare(backend, &challenger_power, &opponent_power)?;
    let mirrored = complement(backend, &code)?;
    Ok(ResolvedOutcomes { challenger: code, opponent: mirrored })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::rules::PlainStats;
    use crate::fhe::{DecryptionOracle, LocalCoprocessor};
    use proptest::prelude::*;

    fn reader() -> PlayerId {
        PlayerId::new([0xee; 20])
    }

    fn seal(backend: &LocalCoprocessor, stats: PlainStats) -> EncryptedStats {
        EncryptedStats {
            attack: backend.encrypt(stats.attack).unwrap(),
            defense: backend.encrypt(stats.defense).unwrap(),
            hp: backend.encrypt(stats.hp).unwrap(),
        }
    }

    async fn open(backend: &LocalCoprocessor, ct: &Ciphertext) -> u32 {
        backend.allow(ct, reader()).unwrap();
        backend.decrypt(*ct, reader()).await.unwrap()
    }

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[tokio::test]
    async fn test_power_matches_formula() {
        let backend = LocalCoprocessor::default();
        let plain = PlainStats { attack: 42, defense: 17, hp: 150 };
        let ct = power(&backend, &seal(&backend, plain)).unwrap();
        assert_eq!(open(&backend, &ct).await, 42 * 3 + 17 * 2 + 150);
    }

    #[tokio::test]
    async fn test_defense_adds_power() {
        let backend = LocalCoprocessor::default();
        let low = PlainStats { attack: 20, defense: 5, hp: 120 };
        let high = PlainStats { defense: 6, ..low };

        let lo = power(&backend, &seal(&backend, low)).unwrap();
        let hi = power(&backend, &seal(&backend, high)).unwrap();
        let code = compare(&backend, &hi, &lo).unwrap();
        assert_eq!(open(&backend, &code).await, BattleOutcome::WIN_CODE);
    }

    #[tokio::test]
    async fn test_complement_table() {
        let backend = LocalCoprocessor::default();
        for outcome in [BattleOutcome::Loss, BattleOutcome::Win, BattleOutcome::Draw] {
            let code = backend.trivial(outcome.code()).unwrap();
            let mirrored = complement(&backend, &code).unwrap();
            assert_eq!(open(&backend, &mirrored).await, outcome.complement().code());
        }
    }

    #[tokio::test]
    async fn test_equal_powers_draw_both_sides() {
        let backend = LocalCoprocessor::default();
        // 3·20 + 2·10 + 100 = 180 = 3·10 + 2·25 + 100
        let a = PlainStats { attack: 20, defense: 10, hp: 100 };
        let b = PlainStats { attack: 10, defense: 25, hp: 100 };
        assert_eq!(a.power(), b.power());

        let out = evaluate(&backend, &seal(&backend, a), &seal(&backend, b)).unwrap();
        assert_eq!(open(&backend, &out.challenger).await, BattleOutcome::DRAW_CODE);
        assert_eq!(open(&backend, &out.opponent).await, BattleOutcome::DRAW_CODE);
    }

    #[test]
    fn test_resolve_rejects_self_battle() {
        let backend = LocalCoprocessor::default();
        let registry = PlayerRegistry::new();
        let vault = AttributeVault::new();
        let who = PlayerId::new([1; 20]);

        let err = resolve(&registry, &vault, &backend, who, who).unwrap_err();
        assert_eq!(err, ArenaError::SelfBattle);
    }

    #[test]
    fn test_resolve_requires_registration() {
        let backend = LocalCoprocessor::default();
        let mut registry = PlayerRegistry::new();
        let mut vault = AttributeVault::new();
        let alice = PlayerId::new([1; 20]);
        let bob = PlayerId::new([2; 20]);
        registry.register(&mut vault, &backend, alice, "Alice", 0).unwrap();

        assert_eq!(
            resolve(&registry, &vault, &backend, alice, bob),
            Err(ArenaError::NotRegistered(bob))
        );
        assert_eq!(
            resolve(&registry, &vault, &backend, bob, alice),
            Err(ArenaError::NotRegistered(bob))
        );
    }

    #[tokio::test]
    async fn test_resolve_grants_each_side_only() {
        let backend = LocalCoprocessor::default();
        let mut registry = PlayerRegistry::new();
        let mut vault = AttributeVault::new();
        let alice = PlayerId::new([1; 20]);
        let bob = PlayerId::new([2; 20]);
        registry.register(&mut vault, &backend, alice, "Alice", 0).unwrap();
        registry.register(&mut vault, &backend, bob, "Bob", 0).unwrap();

        let out = resolve(&registry, &vault, &backend, alice, bob).unwrap();
        assert!(backend.is_allowed(&out.challenger, &alice));
        assert!(!backend.is_allowed(&out.challenger, &bob));
        assert!(backend.is_allowed(&out.opponent, &bob));
        assert!(!backend.is_allowed(&out.opponent, &alice));

        assert_eq!(backend.decrypt(out.challenger, bob).await, Err(FheError::Denied));
    }

    fn stat_triple() -> impl Strategy<Value = PlainStats> {
        (10u32..=60, 5u32..=40, 100u32..=200).prop_map(|(attack, defense, hp)| PlainStats {
            attack,
            defense,
            hp,
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_outcomes_match_cleartext_and_are_symmetric(a in stat_triple(), b in stat_triple()) {
            let backend = LocalCoprocessor::default();
            let out = evaluate(&backend, &seal(&backend, a), &seal(&backend, b)).unwrap();

            let (c, o) = block_on(async {
                (open(&backend, &out.challenger).await, open(&backend, &out.opponent).await)
            });

            let expected = a.outcome_against(&b);
            prop_assert_eq!(BattleOutcome::from_code(c), Some(expected));
            prop_assert_eq!(BattleOutcome::from_code(o), Some(expected.complement()));
        }
    }
}
