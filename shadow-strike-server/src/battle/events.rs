//! Arena Events
//!
//! Confirmations emitted after every committed mutation. Events carry only
//! public data and opaque handles, so they are safe to broadcast to every
//! connected client.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::battle::ledger::BattleId;
use crate::core::hash::{short_hex, Digest32, DomainHasher, TX_DOMAIN};
use crate::core::identity::PlayerId;
use crate::fhe::Ciphertext;

/// Kind of committed mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TxKind {
    /// Player registration.
    Register = 1,
    /// Battle resolution.
    Battle = 2,
}

/// Confirmation handle for a committed mutation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxHandle(pub Digest32);

impl TxHandle {
    /// Derive the handle for the `sequence`-th mutation.
    pub fn derive(sequence: u64, kind: TxKind, origin: &PlayerId) -> Self {
        let mut hasher = DomainHasher::new(TX_DOMAIN);
        hasher.update_u64(sequence);
        hasher.update_u8(kind as u8);
        hasher.update_bytes(origin.as_bytes());
        Self(hasher.finalize())
    }

    /// `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHandle({})", short_hex(&self.0))
    }
}

impl Serialize for TxHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(raw).map_err(serde::de::Error::custom)?;
        let digest: Digest32 = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("transaction handle must be 32 bytes"))?;
        Ok(Self(digest))
    }
}

/// Confirmation of a registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRegistered {
    /// Confirmation handle.
    pub tx: TxHandle,
    /// New player.
    pub player: PlayerId,
    /// Display name.
    pub name: String,
    /// Registration order.
    pub index: usize,
}

/// Confirmation of a resolved battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleResolved {
    /// Confirmation handle.
    pub tx: TxHandle,
    /// Assigned battle identifier.
    pub battle_id: BattleId,
    /// Initiator.
    pub challenger: PlayerId,
    /// Challenged player.
    pub opponent: PlayerId,
    /// Challenger's encrypted outcome.
    pub challenger_outcome: Ciphertext,
    /// Unix seconds.
    pub created_at: u64,
}

/// Event broadcast to arena subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArenaEvent {
    /// A player registered.
    PlayerRegistered(PlayerRegistered),
    /// A battle was resolved and recorded.
    BattleResolved(BattleResolved),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_handles_unique_per_sequence() {
        let who = PlayerId::new([1; 20]);
        let a = TxHandle::derive(1, TxKind::Register, &who);
        let b = TxHandle::derive(2, TxKind::Register, &who);
        let c = TxHandle::derive(1, TxKind::Battle, &who);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, TxHandle::derive(1, TxKind::Register, &who));
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = ArenaEvent::PlayerRegistered(PlayerRegistered {
            tx: TxHandle([0xab; 32]),
            player: PlayerId::new([1; 20]),
            name: "Alice".into(),
            index: 0,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "player_registered");
        assert_eq!(json["name"], "Alice");

        let back: ArenaEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
