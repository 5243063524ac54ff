//! Battle Ledger
//!
//! Append-only record of resolved battles. Each battle produces exactly one
//! history entry per participant, each holding that participant's own
//! encrypted outcome. Entries are never edited or removed.
//!
//! A running SHA-256 digest is chained over every appended battle so two
//! ledgers can be compared for identical history in constant time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::engine::ResolvedOutcomes;
use crate::battle::error::ArenaError;
use crate::battle::rules::FIRST_BATTLE_ID;
use crate::core::hash::{Digest32, DomainHasher, LEDGER_DOMAIN};
use crate::core::identity::PlayerId;
use crate::fhe::Ciphertext;

/// Battle identifier, unique and strictly increasing.
pub type BattleId = u64;

/// Which side of the battle an entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Initiated the battle.
    Challenger,
    /// Was challenged.
    Opponent,
}

/// One participant's view of one battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Battle this entry belongs to.
    pub battle_id: BattleId,
    /// Side of the owner.
    pub role: Role,
    /// The other participant.
    pub counterparty: PlayerId,
    /// Owner's encrypted outcome.
    pub outcome: Ciphertext,
    /// Unix seconds.
    pub created_at: u64,
}

/// Full battle record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRecord {
    /// Identifier.
    pub id: BattleId,
    /// Initiator.
    pub challenger: PlayerId,
    /// Challenged player.
    pub opponent: PlayerId,
    /// Challenger's encrypted outcome.
    pub challenger_outcome: Ciphertext,
    /// Opponent's encrypted outcome.
    pub opponent_outcome: Ciphertext,
    /// Unix seconds.
    pub created_at: u64,
}

/// Append-only battle log with per-player histories.
#[derive(Debug)]
pub struct BattleLedger {
    next_id: BattleId,
    battles: BTreeMap<BattleId, BattleRecord>,
    histories: BTreeMap<PlayerId, Vec<HistoryEntry>>,
    digest: Digest32,
}

impl Default for BattleLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl BattleLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            next_id: FIRST_BATTLE_ID,
            battles: BTreeMap::new(),
            histories: BTreeMap::new(),
            digest: [0u8; 32],
        }
    }

    /// Record a resolved battle and return its identifier.
    pub fn append(
        &mut self,
        challenger: PlayerId,
        opponent: PlayerId,
        outcomes: ResolvedOutcomes,
        created_at: u64,
    ) -> Result<BattleId, ArenaError> {
        if challenger == opponent {
            return Err(ArenaError::SelfBattle);
        }

        let id = self.next_id;
        self.next_id += 1;

        let record = BattleRecord {
            id,
            challenger,
            opponent,
            challenger_outcome: outcomes.challenger,
            opponent_outcome: outcomes.opponent,
            created_at,
        };
        self.digest = chain(&self.digest, &record);

        self.histories.entry(challenger).or_default().push(HistoryEntry {
            battle_id: id,
            role: Role::Challenger,
            counterparty: opponent,
            outcome: outcomes.challenger,
            created_at,
        });
        self.histories.entry(opponent).or_default().push(HistoryEntry {
            battle_id: id,
            role: Role::Opponent,
            counterparty: challenger,
            outcome: outcomes.opponent,
            created_at,
        });
        self.battles.insert(id, record);

        Ok(id)
    }

    /// History of `who` in battle order. Empty for unknown identities.
    pub fn history(&self, who: &PlayerId) -> &[HistoryEntry] {
        self.histories.get(who).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The entry `who` holds for `battle_id`, if any.
    pub fn entry(&self, who: &PlayerId, battle_id: BattleId) -> Option<&HistoryEntry> {
        let history = self.history(who);
        history
            .binary_search_by_key(&battle_id, |entry| entry.battle_id)
            .ok()
            .map(|idx| &history[idx])
    }

    /// Full record of a battle.
    pub fn battle(&self, battle_id: BattleId) -> Option<&BattleRecord> {
        self.battles.get(&battle_id)
    }

    /// Number of battles recorded.
    pub fn len(&self) -> usize {
        self.battles.len()
    }

    /// Whether no battle has been recorded.
    pub fn is_empty(&self) -> bool {
        self.battles.is_empty()
    }

    /// Running digest over all recorded battles.
    pub fn digest(&self) -> Digest32 {
        self.digest
    }
}

fn chain(prev: &Digest32, record: &BattleRecord) -> Digest32 {
    let mut hasher = DomainHasher::new(LEDGER_DOMAIN);
    hasher.update_bytes(prev);
    hasher.update_u64(record.id);
    hasher.update_bytes(record.challenger.as_bytes());
    hasher.update_bytes(record.opponent.as_bytes());
    hasher.update_bytes(record.challenger_outcome.as_bytes());
    hasher.update_bytes(record.opponent_outcome.as_bytes());
    hasher.update_u64(record.created_at);
    hasher.finalize()
}
