//! Protocol Messages
//!
//! JSON wire format for client-server communication over WebSocket.
//! Every message is an object tagged by `"type"`.
//!
//! Identities and handles travel as `0x`-prefixed hex strings.

use serde::{Deserialize, Serialize};

use crate::battle::{
    ArenaError, ArenaEvent, BattleId, BattleOutcome, BattleResolved, ErrorKind, HistoryEntry,
    PlainStats, Player, TxHandle,
};
use crate::core::identity::PlayerId;
use crate::network::auth::AuthError;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate the connection with a provider JWT.
    Auth {
        /// Bearer token.
        token: String,
    },

    /// Register the authenticated identity.
    Register {
        /// Display name.
        name: String,
    },

    /// Challenge another registered player.
    Battle {
        /// Player to fight.
        opponent: PlayerId,
    },

    /// Look up one player.
    GetPlayer {
        /// Identity to look up.
        player: PlayerId,
    },

    /// List every registered player.
    GetAllPlayers,

    /// Battle history of a player.
    GetBattleHistory {
        /// Whose history.
        player: PlayerId,
    },

    /// Decrypt the caller's own outcome of a battle.
    Decrypt {
        /// Battle to open.
        battle_id: BattleId,
    },

    /// Decrypt the caller's own attributes.
    RevealStats,

    /// Latency probe.
    Ping {
        /// Client clock, echoed back.
        timestamp: u64,
    },
}

impl ClientMessage {
    /// Whether the message needs an authenticated connection.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Self::Register { .. } | Self::Battle { .. } | Self::Decrypt { .. } | Self::RevealStats
        )
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Registration committed.
    Registered {
        /// Confirmation handle.
        tx: TxHandle,
        /// The new player record.
        player: Player,
    },

    /// Battle committed; reply to the challenger.
    BattleResolved(BattleResolved),

    /// One player record.
    Player {
        /// Record.
        player: Player,
    },

    /// All players in registration order.
    Players {
        /// Records.
        players: Vec<Player>,
    },

    /// A player's battle history.
    History {
        /// Whose history.
        player: PlayerId,
        /// Entries in battle order.
        entries: Vec<HistoryEntry>,
    },

    /// Decrypted outcome for the caller.
    Decrypted {
        /// Battle opened.
        battle_id: BattleId,
        /// Caller's outcome.
        outcome: BattleOutcome,
    },

    /// Decrypted attributes for the caller.
    Stats {
        /// Plaintext triple.
        stats: PlainStats,
        /// Derived power.
        power: u32,
    },

    /// Arena broadcast.
    Event {
        /// Committed mutation.
        event: ArenaEvent,
    },

    /// Pong response.
    Pong {
        /// Echoed client clock.
        timestamp: u64,
        /// Server clock (Unix millis).
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Reason shown to clients.
        reason: String,
    },
}

impl ServerMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Authentication result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Bound identity if successful.
    pub player: Option<PlayerId>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Whether resending the same request may succeed.
    #[serde(default)]
    pub retryable: bool,
}

impl ServerError {
    /// Non-retryable error with a message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), retryable: false }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Operation needs an authenticated connection.
    NotAuthenticated,
    /// JWT has expired.
    TokenExpired,
    /// JWT failed verification.
    InvalidToken,
    /// Message could not be parsed.
    InvalidMessage,
    /// Display name rejected.
    InvalidName,
    /// Identity already registered.
    AlreadyRegistered,
    /// Participant not registered.
    NotRegistered,
    /// Challenger named themselves.
    SelfBattle,
    /// Unknown player.
    PlayerNotFound,
    /// No decryptable entry for the caller.
    EntryUnavailable,
    /// Decryption round trip timed out.
    Timeout,
    /// Backend temporarily unavailable.
    Unavailable,
    /// Server-side failure; details are logged, not returned.
    Internal,
    /// Connection limit reached.
    ServerFull,
}

impl From<&ArenaError> for ServerError {
    fn from(err: &ArenaError) -> Self {
        let code = match err {
            ArenaError::InvalidName(_) => ErrorCode::InvalidName,
            ArenaError::AlreadyRegistered(_) => ErrorCode::AlreadyRegistered,
            ArenaError::NotRegistered(_) => ErrorCode::NotRegistered,
            ArenaError::SelfBattle => ErrorCode::SelfBattle,
            ArenaError::PlayerNotFound(_) => ErrorCode::PlayerNotFound,
            ArenaError::EntryUnavailable { .. } => ErrorCode::EntryUnavailable,
            ArenaError::DecryptTimeout(_) => ErrorCode::Timeout,
            ArenaError::Oracle(_) => ErrorCode::Unavailable,
            ArenaError::CryptoFault(_) | ArenaError::AlreadyStored(_) => ErrorCode::Internal,
        };
        let message = match err.kind() {
            ErrorKind::Integrity => "internal error".to_string(),
            _ => err.to_string(),
        };
        Self { code, message, retryable: err.is_retryable() }
    }
}

impl From<&AuthError> for ServerError {
    fn from(err: &AuthError) -> Self {
        let code = match err {
            AuthError::Expired => ErrorCode::TokenExpired,
            AuthError::NotConfigured => ErrorCode::AuthFailed,
            _ => ErrorCode::InvalidToken,
        };
        Self::new(code, err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhe::FheError;
    use std::time::Duration;

    #[test]
    fn test_client_message_wire_shape() {
        let who = PlayerId::new([0xab; 20]);
        let msg = ClientMessage::Battle { opponent: who };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"battle\""));
        assert!(json.contains(&who.to_hex()));
        assert_eq!(ClientMessage::from_json(&json).unwrap(), msg);

        let parsed = ClientMessage::from_json(r#"{"type":"get_all_players"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::GetAllPlayers);

        let parsed = ClientMessage::from_json(r#"{"type":"decrypt","battle_id":3}"#).unwrap();
        assert_eq!(parsed, ClientMessage::Decrypt { battle_id: 3 });
    }

    #[test]
    fn test_unknown_message_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"reveal_all"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_requires_auth() {
        assert!(ClientMessage::RevealStats.requires_auth());
        assert!(ClientMessage::Register { name: "x".into() }.requires_auth());
        assert!(!ClientMessage::GetAllPlayers.requires_auth());
        assert!(!ClientMessage::Ping { timestamp: 0 }.requires_auth());
    }

    #[test]
    fn test_decrypted_message() {
        let msg = ServerMessage::Decrypted { battle_id: 1, outcome: BattleOutcome::Win };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"decrypted\""));
        assert!(json.contains("\"outcome\":\"win\""));
        assert_eq!(ServerMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_event_nests_its_own_tag() {
        use crate::battle::PlayerRegistered;
        let msg = ServerMessage::Event {
            event: ArenaEvent::PlayerRegistered(PlayerRegistered {
                tx: TxHandle([1; 32]),
                player: PlayerId::new([2; 20]),
                name: "Bob".into(),
                index: 1,
            }),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"]["type"], "player_registered");
    }

    #[test]
    fn test_arena_error_mapping() {
        let err = ServerError::from(&ArenaError::EntryUnavailable { battle_id: 4 });
        assert_eq!(err.code, ErrorCode::EntryUnavailable);
        assert!(!err.retryable);

        let err = ServerError::from(&ArenaError::DecryptTimeout(Duration::from_secs(1)));
        assert_eq!(err.code, ErrorCode::Timeout);
        assert!(err.retryable);
    }

    #[test]
    fn test_integrity_details_not_exposed() {
        let err = ServerError::from(&ArenaError::CryptoFault(FheError::Denied));
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "internal error");
    }

    #[test]
    fn test_auth_error_mapping() {
        assert_eq!(ServerError::from(&AuthError::Expired).code, ErrorCode::TokenExpired);
        assert_eq!(ServerError::from(&AuthError::InvalidSignature).code, ErrorCode::InvalidToken);
        let json = ServerMessage::Error(ServerError::from(&AuthError::NotConfigured))
            .to_json()
            .unwrap();
        assert!(json.contains("auth_failed"));
    }
}
