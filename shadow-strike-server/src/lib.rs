//! # Shadow Strike Arena Server
//!
//! Player-versus-player battles resolved over encrypted attributes. Nobody,
//! including the server, ever sees a player's stats or a battle result in
//! the clear; each participant can decrypt only their own values.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  SHADOW STRIKE SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── identity.rs - 20-byte player identities                 │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── hash.rs     - Domain-separated SHA-256                  │
//! │                                                              │
//! │  fhe/            - Encrypted-computation boundary            │
//! │  ├── handle.rs   - Opaque ciphertext handles                 │
//! │  └── coprocessor.rs - In-process evaluator + oracle          │
//! │                                                              │
//! │  battle/         - Arena rules (handles only)                │
//! │  ├── registry.rs - Registration, encrypted stat draw         │
//! │  ├── vault.rs    - Write-once attribute store                │
//! │  ├── engine.rs   - Homomorphic power comparison              │
//! │  ├── ledger.rs   - Append-only battle history                │
//! │  ├── authority.rs- Owner-only decryption gate                │
//! │  └── arena.rs    - Serialized facade + events                │
//! │                                                              │
//! │  network/        - WebSocket front end                       │
//! │  ├── auth.rs     - JWT verification                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── server.rs   - Connection handling                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Confidentiality Guarantee
//!
//! - Attributes are drawn as encrypted randomness; no plaintext exists.
//! - Each battle outcome is granted to exactly one participant.
//! - Decryption of a missing battle and of someone else's battle fail with
//!   the same error.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod battle;
pub mod config;
pub mod core;
pub mod fhe;
pub mod network;

// Re-export commonly used types
pub use battle::{
    Arena, ArenaConfig, ArenaError, ArenaEvent, BattleId, BattleOutcome, HistoryEntry,
    PlainStats, Player,
};
pub use config::Settings;
pub use core::identity::PlayerId;
pub use core::rng::DeterministicRng;
pub use fhe::{Ciphertext, CoprocessorConfig, LocalCoprocessor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
