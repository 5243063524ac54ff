//! Session Authentication
//!
//! Verifies bearer JWTs issued by an external identity provider and maps
//! the subject claim to a [`PlayerId`]. The server never issues tokens.
//!
//! Key material and validation rules are prepared once in
//! [`Authenticator::new`]; verifying a token afterwards is allocation-light
//! and never touches the environment.

use std::collections::HashSet;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::identity::PlayerId;

/// Authentication configuration.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Expected issuer claim ("iss"). If None, any issuer accepted.
    pub issuer: Option<String>,
    /// Expected audience claim ("aud"). If None, any audience accepted.
    pub audience: Option<String>,
    /// RS256 public key in PEM format.
    pub public_key_pem: Option<String>,
    /// HS256 shared secret.
    pub secret: Option<String>,
    /// Skip expiry validation (local testing only).
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Read `SHADOW_STRIKE_AUTH_*` variables.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(format!("SHADOW_STRIKE_AUTH_{name}")).ok();
        Self {
            issuer: var("ISSUER"),
            audience: var("AUDIENCE"),
            public_key_pem: var("PUBLIC_KEY_PEM"),
            secret: var("SECRET"),
            skip_expiry: var("SKIP_EXPIRY").is_some_and(|v| v == "true" || v == "1"),
        }
    }

    /// Whether any key material is configured.
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }
}

/// Claims read from provider tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject, the provider's user id.
    pub sub: String,
    /// Expiry (Unix seconds).
    #[serde(default)]
    pub exp: u64,
    /// Issued at (Unix seconds).
    #[serde(default)]
    pub iat: u64,
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience.
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
}

impl TokenClaims {
    /// Arena identity bound to this subject.
    pub fn player_id(&self) -> PlayerId {
        PlayerId::derive(&self.sub)
    }
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No key material configured.
    #[error("authentication not configured")]
    NotConfigured,
    /// Malformed token.
    #[error("invalid token format")]
    InvalidFormat,
    /// Signature does not verify.
    #[error("invalid signature")]
    InvalidSignature,
    /// Token past its expiry.
    #[error("token expired")]
    Expired,
    /// Issuer mismatch.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Audience mismatch.
    #[error("invalid audience")]
    InvalidAudience,
    /// Required claim missing or empty.
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// Key or token decoding failure.
    #[error("decode error: {0}")]
    DecodeError(String),
}

/// Token verifier with prepared key and validation rules.
#[derive(Clone)]
pub struct Authenticator {
    key: DecodingKey,
    validation: Validation,
    skip_expiry: bool,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("algorithms", &self.validation.algorithms)
            .field("skip_expiry", &self.skip_expiry)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Prepare a verifier. Fails if no key is configured or the PEM is invalid.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let (key, algorithm) = if let Some(pem) = &config.public_key_pem {
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| AuthError::DecodeError(format!("invalid public key: {e}")))?;
            (key, Algorithm::RS256)
        } else if let Some(secret) = &config.secret {
            (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
        } else {
            return Err(AuthError::NotConfigured);
        };

        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims = HashSet::new();
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if config.skip_expiry {
            validation.validate_exp = false;
        }

        Ok(Self { key, validation, skip_expiry: config.skip_expiry })
    }

    /// Verify a token and return its claims.
    pub fn verify_claims(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims = decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(map_jwt_error)?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::MissingClaim("sub".into()));
        }

        // jsonwebtoken skips exp when the claim is absent from required set.
        if !self.skip_expiry && claims.exp > 0 {
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            if now > claims.exp {
                return Err(AuthError::Expired);
            }
        }

        Ok(claims)
    }

    /// Verify a token and return the bound identity.
    pub fn verify(&self, token: &str) -> Result<PlayerId, AuthError> {
        self.verify_claims(token).map(|claims| claims.player_id())
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::InvalidFormat,
        _ => AuthError::DecodeError(err.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
