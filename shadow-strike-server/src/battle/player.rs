//! Player Records
//!
//! Public view of a registered player. The attribute fields are opaque
//! handles; holding one reveals nothing, decrypting it needs an ACL grant
//! that only the owner has.

use serde::{Deserialize, Serialize};

use crate::battle::error::NameError;
use crate::battle::rules::MAX_NAME_CHARS;
use crate::core::identity::PlayerId;
use crate::fhe::Ciphertext;

/// Encrypted attribute triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedStats {
    /// Encrypted attack.
    pub attack: Ciphertext,
    /// Encrypted defense.
    pub defense: Ciphertext,
    /// Encrypted hit points.
    pub hp: Ciphertext,
}

impl EncryptedStats {
    /// Handles in a fixed order (attack, defense, hp).
    pub fn handles(&self) -> [Ciphertext; 3] {
        [self.attack, self.defense, self.hp]
    }
}

/// A registered player as returned by queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Identity.
    pub id: PlayerId,
    /// Display name, fixed at registration.
    pub name: String,
    /// Encrypted attributes.
    pub stats: EncryptedStats,
    /// Always true for returned records.
    pub registered: bool,
    /// Zero-based registration order.
    pub index: usize,
    /// Unix seconds.
    pub registered_at: u64,
}

/// Check a display name against the naming policy.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.trim().is_empty() {
        return Err(NameError::Empty);
    }
    let len = name.chars().count();
    if len > MAX_NAME_CHARS {
        return Err(NameError::TooLong { len, max: MAX_NAME_CHARS });
    }
    if name.chars().any(char::is_control) {
        return Err(NameError::ControlCharacter);
    }
    Ok(())
}
