//! Battle Rules
//!
//! Fixed policy constants. They are baked into every homomorphic
//! evaluation, so changing any of them changes the outcome of every
//! future battle and must be treated as a protocol version bump.

use serde::{Deserialize, Serialize};

/// Maximum display-name length in Unicode scalar values.
pub const MAX_NAME_CHARS: usize = 32;

/// Identifier of the first battle appended to a fresh ledger.
pub const FIRST_BATTLE_ID: u64 = 1;

/// Inclusive range for a generated attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatRange {
    /// Lowest value.
    pub min: u32,
    /// Highest value.
    pub max: u32,
}

/// Attack is drawn from this range at registration.
pub const ATTACK_RANGE: StatRange = StatRange { min: 10, max: 60 };
/// Defense is drawn from this range at registration.
pub const DEFENSE_RANGE: StatRange = StatRange { min: 5, max: 40 };
/// HP is drawn from this range at registration.
pub const HP_RANGE: StatRange = StatRange { min: 100, max: 200 };

/// power = 3·attack + 2·defense + 1·hp
pub const ATTACK_WEIGHT: u32 = 3;
/// See [`ATTACK_WEIGHT`].
pub const DEFENSE_WEIGHT: u32 = 2;
/// See [`ATTACK_WEIGHT`].
pub const HP_WEIGHT: u32 = 1;

/// Largest power any registered player can have.
pub const MAX_POWER: u32 = ATTACK_WEIGHT * ATTACK_RANGE.max
    + DEFENSE_WEIGHT * DEFENSE_RANGE.max
    + HP_WEIGHT * HP_RANGE.max;

// Encrypted arithmetic wraps at 2^32; power must stay far below it.
const _: () = assert!(MAX_POWER < u32::MAX / 2);

/// Plaintext outcome codes as seen by one participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BattleOutcome {
    /// Participant lost (code 0).
    Loss = 0,
    /// Participant won (code 1).
    Win = 1,
    /// Equal power (code 2).
    Draw = 2,
}

impl BattleOutcome {
    /// Encrypted code for a loss.
    pub const LOSS_CODE: u32 = 0;
    /// Encrypted code for a win.
    pub const WIN_CODE: u32 = 1;
    /// Encrypted code for a draw.
    pub const DRAW_CODE: u32 = 2;

    /// Decode a decrypted plaintext code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            Self::LOSS_CODE => Some(Self::Loss),
            Self::WIN_CODE => Some(Self::Win),
            Self::DRAW_CODE => Some(Self::Draw),
            _ => None,
        }
    }

    /// Numeric code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// The other participant's outcome.
    pub fn complement(self) -> Self {
        match self {
            Self::Loss => Self::Win,
            Self::Win => Self::Loss,
            Self::Draw => Self::Draw,
        }
    }
}

/// Decrypted attribute triple, only ever returned to its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainStats {
    /// Attack.
    pub attack: u32,
    /// Defense.
    pub defense: u32,
    /// Hit points.
    pub hp: u32,
}

impl PlainStats {
    /// Cleartext power, matching the homomorphic formula.
    pub fn power(&self) -> u32 {
        ATTACK_WEIGHT
            .wrapping_mul(self.attack)
            .wrapping_add(DEFENSE_WEIGHT.wrapping_mul(self.defense))
            .wrapping_add(HP_WEIGHT.wrapping_mul(self.hp))
    }

    /// Outcome from this side against `other`.
    pub fn outcome_against(&self, other: &PlainStats) -> BattleOutcome {
        match self.power().cmp(&other.power()) {
            std::cmp::Ordering::Greater => BattleOutcome::Win,
            std::cmp::Ordering::Less => BattleOutcome::Loss,
            std::cmp::Ordering::Equal => BattleOutcome::Draw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_codes() {
        for outcome in [BattleOutcome::Loss, BattleOutcome::Win, BattleOutcome::Draw] {
            assert_eq!(BattleOutcome::from_code(outcome.code()), Some(outcome));
        }
        assert_eq!(BattleOutcome::from_code(3), None);
    }

    #[test]
    fn test_complement_pairs() {
        assert_eq!(BattleOutcome::Loss.complement(), BattleOutcome::Win);
        assert_eq!(BattleOutcome::Win.complement(), BattleOutcome::Loss);
        assert_eq!(BattleOutcome::Draw.complement(), BattleOutcome::Draw);
    }

    #[test]
    fn test_power_formula() {
        let stats = PlainStats { attack: 10, defense: 5, hp: 100 };
        assert_eq!(stats.power(), 30 + 10 + 100);
        assert_eq!(MAX_POWER, 180 + 80 + 200);
    }

    #[test]
    fn test_outcome_against() {
        let strong = PlainStats { attack: 60, defense: 40, hp: 200 };
        let weak = PlainStats { attack: 10, defense: 5, hp: 100 };
        assert_eq!(strong.outcome_against(&weak), BattleOutcome::Win);
        assert_eq!(weak.outcome_against(&strong), BattleOutcome::Loss);
        assert_eq!(weak.outcome_against(&weak), BattleOutcome::Draw);
    }

    #[test]
    fn test_json_outcome_names() {
        assert_eq!(serde_json::to_string(&BattleOutcome::Draw).unwrap(), "\"draw\"");
    }
}
