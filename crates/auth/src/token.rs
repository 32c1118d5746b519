//! Signed, time-limited bearer tokens (HS256 JWT).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use thiserror::Error;

use strongbox_core::Account;

use crate::{Denylist, DenylistUnavailable, TokenClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    BadSignature,

    #[error("unexpected signing algorithm")]
    UnexpectedAlgorithm,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("token has been revoked")]
    Revoked,

    #[error("token encoding failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Revocation(#[from] DenylistUnavailable),
}

pub type TokenResult<T> = Result<T, TokenError>;

/// A freshly signed token together with its claims.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    #[serde(skip)]
    pub claims: TokenClaims,
}

/// Issue and verify bearer tokens.
///
/// `now` is always supplied by the caller so that expiry is deterministic in
/// tests.
pub trait TokenService: Send + Sync {
    fn issue(&self, account: &Account, now: DateTime<Utc>) -> TokenResult<IssuedToken>;

    fn verify(&self, token: &str, now: DateTime<Utc>) -> TokenResult<TokenClaims>;

    /// Reject this token on every later `verify`, until it expires.
    fn revoke(&self, claims: &TokenClaims, now: DateTime<Utc>) -> TokenResult<()>;
}

impl<S> TokenService for Arc<S>
where
    S: TokenService + ?Sized,
{
    fn issue(&self, account: &Account, now: DateTime<Utc>) -> TokenResult<IssuedToken> {
        (**self).issue(account, now)
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> TokenResult<TokenClaims> {
        (**self).verify(token, now)
    }

    fn revoke(&self, claims: &TokenClaims, now: DateTime<Utc>) -> TokenResult<()> {
        (**self).revoke(claims, now)
    }
}

/// HMAC-SHA256 token service with an injected signing secret.
pub struct Hs256TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    denylist: Denylist,
}

impl Hs256TokenService {
    /// Default token lifetime.
    pub const DEFAULT_TTL_HOURS: i64 = 24;

    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        let secret = secret.as_ref();

        let mut validation = Validation::new(Algorithm::HS256);
        // Time-window checks run in `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
            denylist: Denylist::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl core::fmt::Debug for Hs256TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenService")
            .field("ttl", &self.ttl)
            .field("revoked", &self.denylist.len())
            .finish_non_exhaustive()
    }
}

impl TokenService for Hs256TokenService {
    fn issue(&self, account: &Account, now: DateTime<Utc>) -> TokenResult<IssuedToken> {
        let claims = TokenClaims::for_account(account, now, self.ttl);
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok(IssuedToken { token, claims })
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> TokenResult<TokenClaims> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::UnexpectedAlgorithm
                }
                _ => TokenError::Malformed,
            })?;

        let claims = data.claims;
        validate_claims(&claims, now)?;

        if self.denylist.is_revoked(&claims.jti) {
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }

    fn revoke(&self, claims: &TokenClaims, now: DateTime<Utc>) -> TokenResult<()> {
        Ok(self.denylist.revoke(claims.jti, claims.exp, now)?)
    }
}
