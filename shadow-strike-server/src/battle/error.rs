//! Battle Core Errors
//!
//! One error type for every arena operation, classified by how the caller
//! should react to it.

use std::time::Duration;

use thiserror::Error;

use crate::battle::ledger::BattleId;
use crate::core::identity::PlayerId;
use crate::fhe::FheError;

/// Reasons a display name is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// Empty or whitespace only.
    #[error("name is empty")]
    Empty,
    /// More characters than allowed.
    #[error("name has {len} characters, limit is {max}")]
    TooLong {
        /// Characters supplied.
        len: usize,
        /// Limit.
        max: usize,
    },
    /// Contains a control character.
    #[error("name contains control characters")]
    ControlCharacter,
}

/// How an error should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, rejected before any mutation.
    Validation,
    /// Caller is not entitled; uniform response shape.
    Authorization,
    /// Broken invariant; the operation was aborted without partial writes.
    Integrity,
    /// External round trip failed; safe to retry.
    Transient,
}

/// Errors returned by arena operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// Display name rejected.
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// Identity already holds a registration.
    #[error("player {0} already registered")]
    AlreadyRegistered(PlayerId),

    /// A battle participant is not registered.
    #[error("player {0} is not registered")]
    NotRegistered(PlayerId),

    /// Challenger named themselves as opponent.
    #[error("cannot battle yourself")]
    SelfBattle,

    /// Lookup of an unknown player.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// Attributes were written twice for one identity.
    #[error("attributes for {0} already stored")]
    AlreadyStored(PlayerId),

    /// Requester has no ledger entry for this battle.
    ///
    /// Covers both "not a participant" and "no such battle"; callers
    /// cannot tell them apart.
    #[error("no decryptable entry for battle {battle_id}")]
    EntryUnavailable {
        /// Battle asked for.
        battle_id: BattleId,
    },

    /// The encrypted-computation backend rejected an operation.
    #[error("crypto fault: {0}")]
    CryptoFault(FheError),

    /// Decryption round trip exceeded the configured timeout.
    #[error("decryption timed out after {0:?}")]
    DecryptTimeout(Duration),

    /// Decryption oracle unavailable.
    #[error("decryption oracle failed: {0}")]
    Oracle(FheError),
}

impl ArenaError {
    /// Classify for caller handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName(_)
            | Self::AlreadyRegistered(_)
            | Self::NotRegistered(_)
            | Self::SelfBattle
            | Self::PlayerNotFound(_) => ErrorKind::Validation,
            Self::EntryUnavailable { .. } => ErrorKind::Authorization,
            Self::CryptoFault(_) | Self::AlreadyStored(_) => ErrorKind::Integrity,
            Self::DecryptTimeout(_) | Self::Oracle(_) => ErrorKind::Transient,
        }
    }

    /// Whether the caller may retry the identical request.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Map a backend error raised while evaluating or granting.
    pub(crate) fn crypto(err: FheError) -> Self {
        Self::CryptoFault(err)
    }

    /// Map a backend error raised by the decryption round trip.
    pub(crate) fn from_oracle(err: FheError) -> Self {
        if err.is_transient() {
            Self::Oracle(err)
        } else {
            Self::CryptoFault(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy() {
        let who = PlayerId::default();
        assert_eq!(ArenaError::SelfBattle.kind(), ErrorKind::Validation);
        assert_eq!(ArenaError::NotRegistered(who).kind(), ErrorKind::Validation);
        assert_eq!(
            ArenaError::EntryUnavailable { battle_id: 1 }.kind(),
            ErrorKind::Authorization
        );
        assert_eq!(ArenaError::AlreadyStored(who).kind(), ErrorKind::Integrity);
        assert_eq!(ArenaError::CryptoFault(FheError::Denied).kind(), ErrorKind::Integrity);
        assert!(ArenaError::DecryptTimeout(Duration::from_secs(1)).is_retryable());
        assert!(!ArenaError::SelfBattle.is_retryable());
    }

    #[test]
    fn test_oracle_mapping() {
        assert!(matches!(
            ArenaError::from_oracle(FheError::Unavailable("down".into())),
            ArenaError::Oracle(_)
        ));
        assert!(matches!(
            ArenaError::from_oracle(FheError::Denied),
            ArenaError::CryptoFault(FheError::Denied)
        ));
    }
}
