//! Local Coprocessor
//!
//! In-process backend for [`FheEvaluator`] and [`DecryptionOracle`].
//! Values are sealed in a table keyed by opaque handles and are only
//! released through [`DecryptionOracle::decrypt`] after an ACL check.
//!
//! Handle derivation is bound to the backend key (derived from the seed):
//! - `encrypt`/`rand_bounded` mix a per-backend nonce, so every call yields a
//!   fresh handle.
//! - Every other operation hashes its opcode and operand handles, so the
//!   same computation over the same inputs always yields the same handle.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, trace};

use crate::core::hash::{hash_with_domain, Digest32, DomainHasher, HANDLE_DOMAIN};
use crate::core::identity::PlayerId;
use crate::core::rng::DeterministicRng;
use crate::fhe::{Ciphertext, DecryptionOracle, FheError, FheEvaluator, FheType};

/// Operation codes mixed into handle derivation.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
enum OpCode {
    Encrypt = 1,
    Trivial = 2,
    Rand = 3,
    Add = 10,
    Sub = 11,
    MulScalar = 12,
    Eq = 20,
    Gt = 21,
    Select = 30,
}

/// Coprocessor configuration.
///
/// The seed fixes every encrypted random draw, so anyone who knows it can
/// replay player attributes. `Default` draws it from OS entropy.
#[derive(Clone, Debug)]
pub struct CoprocessorConfig {
    /// Seed for the encrypted random source.
    pub seed: [u8; 32],
    /// Simulated decryption round-trip latency.
    pub decrypt_latency: Duration,
}

impl CoprocessorConfig {
    /// Configuration pinned to a known seed (replays, fixtures).
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            seed,
            decrypt_latency: Duration::ZERO,
        }
    }

    /// Fresh 32-byte seed from the operating system.
    pub fn random_seed() -> [u8; 32] {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        seed
    }
}

impl Default for CoprocessorConfig {
    fn default() -> Self {
        Self::with_seed(Self::random_seed())
    }
}

#[derive(Clone, Copy, Debug)]
struct Sealed {
    ty: FheType,
    value: u32,
}

struct Inner {
    key_tag: Digest32,
    values: BTreeMap<Ciphertext, Sealed>,
    acl: BTreeMap<Ciphertext, BTreeSet<PlayerId>>,
    rng: DeterministicRng,
    nonce: u64,
}

/// In-process encrypted-computation backend.
pub struct LocalCoprocessor {
    config: CoprocessorConfig,
    inner: RwLock<Inner>,
}

impl Default for LocalCoprocessor {
    fn default() -> Self {
        Self::new(CoprocessorConfig::default())
    }
}

impl LocalCoprocessor {
    /// Create a backend with the given configuration.
    pub fn new(config: CoprocessorConfig) -> Self {
        let rng = DeterministicRng::from_seed_bytes(&config.seed);
        let key_tag = hash_with_domain(b"SHADOW_STRIKE_KEY_V1", &config.seed);
        Self {
            config,
            inner: RwLock::new(Inner {
                key_tag,
                values: BTreeMap::new(),
                acl: BTreeMap::new(),
                rng,
                nonce: 0,
            }),
        }
    }

    /// Number of sealed values held.
    pub fn sealed_count(&self) -> usize {
        self.read().map(|inner| inner.values.len()).unwrap_or(0)
    }

    /// Whether `who` is on the ACL of `ct`.
    pub fn is_allowed(&self, ct: &Ciphertext, who: &PlayerId) -> bool {
        self.read()
            .map(|inner| inner.acl.get(ct).is_some_and(|set| set.contains(who)))
            .unwrap_or(false)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, FheError> {
        self.inner
            .read()
            .map_err(|_| FheError::Unavailable("coprocessor state poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, FheError> {
        self.inner
            .write()
            .map_err(|_| FheError::Unavailable("coprocessor state poisoned".into()))
    }

    /// Seal a value that carries a per-call nonce (fresh handle).
    fn seal_fresh(&self, op: OpCode, ty: FheType, value: u32) -> Result<Ciphertext, FheError> {
        let mut inner = self.write()?;
        inner.nonce += 1;

        let mut hasher = DomainHasher::new(HANDLE_DOMAIN);
        hasher.update_bytes(&inner.key_tag);
        hasher.update_u8(op as u8);
        hasher.update_u64(inner.nonce);
        let ct = Ciphertext::from_digest(hasher.finalize(), ty);

        inner.values.insert(ct, Sealed { ty, value });
        Ok(ct)
    }

    /// Seal an operation result under a handle derived from its inputs.
    fn seal_derived(
        inner: &mut Inner,
        op: OpCode,
        operands: &[&Ciphertext],
        scalar: Option<u32>,
        result: Sealed,
    ) -> Ciphertext {
        let mut hasher = DomainHasher::new(HANDLE_DOMAIN);
        hasher.update_bytes(&inner.key_tag);
        hasher.update_u8(op as u8);
        for operand in operands {
            hasher.update_bytes(operand.as_bytes());
        }
        if let Some(k) = scalar {
            hasher.update_u32(k);
        }
        let ct = Ciphertext::from_digest(hasher.finalize(), result.ty);
        inner.values.entry(ct).or_insert(result);
        ct
    }

    fn load(inner: &Inner, ct: &Ciphertext, expected: FheType) -> Result<u32, FheError> {
        let declared = ct.fhe_type()?;
        if declared != expected {
            return Err(FheError::TypeMismatch { expected, got: declared });
        }
        let sealed = inner.values.get(ct).ok_or(FheError::UnknownHandle(*ct))?;
        Ok(sealed.value)
    }

    fn binary(
        &self,
        op: OpCode,
        a: &Ciphertext,
        b: &Ciphertext,
        out: FheType,
        f: impl FnOnce(u32, u32) -> u32,
    ) -> Result<Ciphertext, FheError> {
        let mut inner = self.write()?;
        let x = Self::load(&inner, a, FheType::Uint32)?;
        let y = Self::load(&inner, b, FheType::Uint32)?;
        let result = Sealed { ty: out, value: f(x, y) };
        let ct = Self::seal_derived(&mut inner, op, &[a, b], None, result);
        trace!(?op, ?ct, "evaluated");
        Ok(ct)
    }
}

impl FheEvaluator for LocalCoprocessor {
    fn encrypt(&self, value: u32) -> Result<Ciphertext, FheError> {
        self.seal_fresh(OpCode::Encrypt, FheType::Uint32, value)
    }

    fn trivial(&self, value: u32) -> Result<Ciphertext, FheError> {
        let mut inner = self.write()?;
        let sealed = Sealed { ty: FheType::Uint32, value };
        Ok(Self::seal_derived(&mut inner, OpCode::Trivial, &[], Some(value), sealed))
    }

    fn rand_bounded(&self, min: u32, max: u32) -> Result<Ciphertext, FheError> {
        let value = {
            let mut inner = self.write()?;
            inner.rng.next_in_range(min, max)
        };
        self.seal_fresh(OpCode::Rand, FheType::Uint32, value)
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError> {
        self.binary(OpCode::Add, a, b, FheType::Uint32, u32::wrapping_add)
    }

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError> {
        self.binary(OpCode::Sub, a, b, FheType::Uint32, u32::wrapping_sub)
    }

    fn mul_scalar(&self, a: &Ciphertext, k: u32) -> Result<Ciphertext, FheError> {
        let mut inner = self.write()?;
        let x = Self::load(&inner, a, FheType::Uint32)?;
        let result = Sealed { ty: FheType::Uint32, value: x.wrapping_mul(k) };
        Ok(Self::seal_derived(&mut inner, OpCode::MulScalar, &[a], Some(k), result))
    }

    fn eq(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError> {
        self.binary(OpCode::Eq, a, b, FheType::Bool, |x, y| (x == y) as u32)
    }

    fn gt(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError> {
        self.binary(OpCode::Gt, a, b, FheType::Bool, |x, y| (x > y) as u32)
    }

    fn select(
        &self,
        cond: &Ciphertext,
        if_true: &Ciphertext,
        if_false: &Ciphertext,
    ) -> Result<Ciphertext, FheError> {
        let mut inner = self.write()?;
        let c = Self::load(&inner, cond, FheType::Bool)?;
        let t = Self::load(&inner, if_true, FheType::Uint32)?;
        let f = Self::load(&inner, if_false, FheType::Uint32)?;
        let result = Sealed { ty: FheType::Uint32, value: if c != 0 { t } else { f } };
        Ok(Self::seal_derived(&mut inner, OpCode::Select, &[cond, if_true, if_false], None, result))
    }

    fn allow(&self, ct: &Ciphertext, who: PlayerId) -> Result<(), FheError> {
        let mut inner = self.write()?;
        if !inner.values.contains_key(ct) {
            return Err(FheError::UnknownHandle(*ct));
        }
        inner.acl.entry(*ct).or_default().insert(who);
        debug!(?ct, player = %who.short(), "acl grant");
        Ok(())
    }
}

impl DecryptionOracle for LocalCoprocessor {
    fn decrypt(
        &self,
        ct: Ciphertext,
        requester: PlayerId,
    ) -> impl Future<Output = Result<u32, FheError>> + Send {
        let latency = self.config.decrypt_latency;
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let inner = self.read()?;
            let sealed = inner.values.get(&ct).ok_or(FheError::UnknownHandle(ct))?;
            let allowed = inner.acl.get(&ct).is_some_and(|set| set.contains(&requester));
            if !allowed {
                return Err(FheError::Denied);
            }
            Ok(sealed.value)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
