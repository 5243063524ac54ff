//! Battle Core
//!
//! Registration, encrypted resolution, the append-only ledger and the
//! decryption gate. Everything here works on opaque handles; plaintext only
//! appears when an owner decrypts their own values.

pub mod arena;
pub mod authority;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod player;
pub mod registry;
pub mod rules;
pub mod vault;

pub use arena::{Arena, ArenaConfig, Registration};
pub use authority::DecryptionAuthority;
pub use engine::ResolvedOutcomes;
pub use error::{ArenaError, ErrorKind, NameError};
pub use events::{ArenaEvent, BattleResolved, PlayerRegistered, TxHandle, TxKind};
pub use ledger::{BattleId, BattleLedger, BattleRecord, HistoryEntry, Role};
pub use player::{validate_name, EncryptedStats, Player};
pub use registry::{PlayerRegistry, RegistryEntry};
pub use rules::{BattleOutcome, PlainStats, StatRange};
pub use vault::AttributeVault;
