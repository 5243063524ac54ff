//! Core deterministic primitives.
//!
//! Identity, hashing and the seeded generator that everything above the
//! backend boundary builds on. Nothing here touches ciphertexts.

pub mod hash;
pub mod identity;
pub mod rng;

// Re-export core types
pub use hash::{hash_with_domain, Digest32, DomainHasher};
pub use identity::{IdentityParseError, PlayerId};
pub use rng::DeterministicRng;
