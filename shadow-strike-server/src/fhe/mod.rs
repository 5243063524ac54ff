//! Homomorphic Evaluation Boundary
//!
//! The battle core never sees plaintext. It talks to an external
//! encrypted-computation backend through two capabilities:
//!
//! - [`FheEvaluator`]: synchronous evaluation over handles
//!   (encrypt, add, compare, select) plus ACL grants.
//! - [`DecryptionOracle`]: the asynchronous authorize-and-decrypt round trip.
//!
//! [`LocalCoprocessor`] is the in-process implementation used by the server
//! binary and by the tests.

use std::future::Future;

use crate::core::identity::PlayerId;

pub mod coprocessor;
pub mod handle;

pub use coprocessor::{CoprocessorConfig, LocalCoprocessor};
pub use handle::{Ciphertext, FheType, HANDLE_VERSION};

/// Errors raised by the encrypted-computation backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FheError {
    /// Handle was not produced by this backend's key.
    #[error("unknown ciphertext handle {0:?}")]
    UnknownHandle(Ciphertext),

    /// Handle bytes do not decode to a supported type/version.
    #[error("malformed ciphertext handle {0:?}")]
    MalformedHandle(Ciphertext),

    /// Operand type does not match the operation.
    #[error("type mismatch: expected {expected:?}, got {got:?}")]
    TypeMismatch {
        /// Type the operation requires.
        expected: FheType,
        /// Type the handle carries.
        got: FheType,
    },

    /// Requester is not on the handle's ACL.
    #[error("decryption denied")]
    Denied,

    /// Backend unreachable or failed mid-request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl FheError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Homomorphic evaluation capability.
///
/// All integer operations are over `Uint32` with wrapping semantics.
/// Comparisons return `Bool` handles.
pub trait FheEvaluator: Send + Sync {
    /// Encrypt a plaintext under the shared evaluation key (fresh handle).
    fn encrypt(&self, value: u32) -> Result<Ciphertext, FheError>;

    /// Encode a public constant as a ciphertext (deterministic handle).
    fn trivial(&self, value: u32) -> Result<Ciphertext, FheError>;

    /// Encrypted uniform random value in `[min, max]`. Nobody sees the plaintext.
    fn rand_bounded(&self, min: u32, max: u32) -> Result<Ciphertext, FheError>;

    /// `a + b`
    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError>;

    /// `a - b`
    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError>;

    /// `a * k` for a plaintext scalar `k`.
    fn mul_scalar(&self, a: &Ciphertext, k: u32) -> Result<Ciphertext, FheError>;

    /// `a == b`
    fn eq(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError>;

    /// `a > b`
    fn gt(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError>;

    /// `cond ? if_true : if_false`
    fn select(
        &self,
        cond: &Ciphertext,
        if_true: &Ciphertext,
        if_false: &Ciphertext,
    ) -> Result<Ciphertext, FheError>;

    /// Grant `who` the right to decrypt `ct`.
    fn allow(&self, ct: &Ciphertext, who: PlayerId) -> Result<(), FheError>;
}

/// Authorize-and-decrypt capability.
pub trait DecryptionOracle: Send + Sync {
    /// Decrypt `ct` for `requester`, or fail with [`FheError::Denied`].
    fn decrypt(
        &self,
        ct: Ciphertext,
        requester: PlayerId,
    ) -> impl Future<Output = Result<u32, FheError>> + Send;
}
