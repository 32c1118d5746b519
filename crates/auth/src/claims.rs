use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use strongbox_core::{Account, AccountId, AccountNumber};

/// The only token type this service issues or accepts.
pub const BEARER: &str = "Bearer";

/// JWT claims model.
///
/// `sub` carries the account id (as a decimal string, per JWT convention).
/// The account number is informational only; authorization always resolves
/// the subject by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: account id.
    pub sub: String,

    pub account_number: AccountNumber,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiration (unix seconds).
    pub exp: i64,

    /// Token id, used for revocation.
    pub jti: Uuid,

    pub token_type: String,
}

impl TokenClaims {
    pub fn for_account(account: &Account, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: account.id.to_string(),
            account_number: account.account_number,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::now_v7(),
            token_type: BEARER.to_string(),
        }
    }

    /// Parse the subject claim into an account id.
    pub fn subject(&self) -> Result<AccountId, TokenValidationError> {
        self.sub
            .parse()
            .map_err(|_| TokenValidationError::InvalidSubject)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("unsupported token type")]
    UnsupportedType,

    #[error("subject is not an account id")]
    InvalidSubject,
}

/// Deterministically validate token claims against `now`.
///
/// Note: this validates the *claims* only. Signature verification happens in
/// the token service before this is called.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.token_type != BEARER {
        return Err(TokenValidationError::UnsupportedType);
    }
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now > claims.exp {
        return Err(TokenValidationError::Expired);
    }
    claims.subject()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(iat: i64, exp: i64) -> TokenClaims {
        TokenClaims {
            sub: "7".into(),
            account_number: AccountNumber::new(1),
            iat,
            exp,
            jti: Uuid::now_v7(),
            token_type: BEARER.into(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn accepts_within_window_including_expiry_second() {
        let c = claims(1_000, 2_000);
        assert_eq!(validate_claims(&c, at(1_000)), Ok(()));
        assert_eq!(validate_claims(&c, at(2_000)), Ok(()));
    }

    #[test]
    fn rejects_after_expiry() {
        let c = claims(1_000, 2_000);
        assert_eq!(validate_claims(&c, at(2_001)), Err(TokenValidationError::Expired));
    }

    #[test]
    fn rejects_future_and_inverted_windows() {
        assert_eq!(
            validate_claims(&claims(1_000, 2_000), at(999)),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&claims(2_000, 2_000), at(2_000)),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn rejects_foreign_token_type_and_bad_subject() {
        let mut c = claims(1_000, 2_000);
        c.token_type = "Refresh".into();
        assert_eq!(validate_claims(&c, at(1_500)), Err(TokenValidationError::UnsupportedType));

        let mut c = claims(1_000, 2_000);
        c.sub = "not-a-number".into();
        assert_eq!(validate_claims(&c, at(1_500)), Err(TokenValidationError::InvalidSubject));
    }
}
