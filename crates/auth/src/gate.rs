//! Authorization gate: bearer token → verified claims → account → policy.
//!
//! Every step is a hard gate; the first failure short-circuits and no later
//! step runs. The gate holds no per-request state and never retries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use strongbox_core::{Account, AccountId};

use crate::{AccessDenied, AccessPolicy, TokenClaims, TokenError, TokenService, check_access};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("subject lookup failed: {0}")]
pub struct SubjectLookupError(pub String);

/// Resolves a token subject to a concrete account.
#[async_trait]
pub trait SubjectResolver: Send + Sync {
    async fn resolve(&self, id: AccountId) -> Result<Option<Account>, SubjectLookupError>;
}

#[async_trait]
impl<S> SubjectResolver for Arc<S>
where
    S: SubjectResolver + ?Sized,
{
    async fn resolve(&self, id: AccountId) -> Result<Option<Account>, SubjectLookupError> {
        (**self).resolve(id).await
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("no bearer token provided")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("token subject does not match any account")]
    UnknownSubject,

    #[error("insufficient privilege: {0}")]
    InsufficientPrivilege(#[from] AccessDenied),

    /// The account store could not be consulted. Not an authorization verdict.
    #[error(transparent)]
    Lookup(#[from] SubjectLookupError),
}

/// The authenticated caller attached to a request once the gate passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub account: Account,
    pub claims: TokenClaims,
}

impl Caller {
    pub fn id(&self) -> AccountId {
        self.account.id
    }

    pub fn is_admin(&self) -> bool {
        self.account.is_admin
    }

    /// Re-apply a policy against a target discovered after the gate ran
    /// (e.g. an id carried in the request body).
    pub fn ensure(&self, policy: AccessPolicy, target: Option<AccountId>) -> Result<(), GateError> {
        check_access(&self.account, policy, target).map_err(GateError::from)
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    tokens: Arc<dyn TokenService>,
    subjects: Arc<dyn SubjectResolver>,
}

impl AuthorizationGate {
    pub fn new(tokens: Arc<dyn TokenService>, subjects: Arc<dyn SubjectResolver>) -> Self {
        Self { tokens, subjects }
    }

    pub fn tokens(&self) -> &Arc<dyn TokenService> {
        &self.tokens
    }

    /// Run the full gate for one request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any;
    /// `target` is the account the endpoint acts on (for `self_only`).
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        policy: AccessPolicy,
        target: Option<AccountId>,
        now: DateTime<Utc>,
    ) -> Result<Caller, GateError> {
        let token = extract_bearer(authorization)?;

        let claims = self.tokens.verify(token, now)?;
        let subject = claims
            .subject()
            .map_err(|e| GateError::InvalidToken(e.into()))?;

        let account = self
            .subjects
            .resolve(subject)
            .await?
            .ok_or(GateError::UnknownSubject)?;

        check_access(&account, policy, target)?;

        Ok(Caller { account, claims })
    }
}

fn extract_bearer(header: Option<&str>) -> Result<&str, GateError> {
    let header = header.ok_or(GateError::MissingToken)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(GateError::MissingToken)?
        .trim();
    if token.is_empty() {
        return Err(GateError::MissingToken);
    }
    Ok(token)
}
