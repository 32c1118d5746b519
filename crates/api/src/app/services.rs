//! Service wiring shared by every handler.

use std::sync::Arc;

use chrono::Utc;

use strongbox_auth::{
    AuthorizationGate, Hs256TokenService, PasswordError, SubjectResolver, TokenService,
    hash_password, verify_password,
};
use strongbox_core::{Account, AccountNumber, NewAccount};
use strongbox_infra::{AccountStore, StoreError, TransferEngine};

/// Account numbers are random; a clash with an existing account is retried.
const ACCOUNT_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum CreateAccountError {
    #[error(transparent)]
    Domain(#[from] strongbox_core::DomainError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AppServices<S> {
    pub store: Arc<S>,
    pub engine: TransferEngine<Arc<S>>,
    pub tokens: Arc<dyn TokenService>,
    pub gate: Arc<AuthorizationGate>,
}

impl<S> AppServices<S>
where
    S: AccountStore + SubjectResolver,
{
    pub fn new(store: Arc<S>, tokens: Arc<dyn TokenService>) -> Self {
        let subjects: Arc<dyn SubjectResolver> = store.clone();
        let gate = Arc::new(AuthorizationGate::new(tokens.clone(), subjects));
        Self {
            engine: TransferEngine::new(store.clone()),
            store,
            tokens,
            gate,
        }
    }

    pub fn with_secret(store: Arc<S>, secret: &str, ttl: chrono::Duration) -> Self {
        let tokens: Arc<dyn TokenService> = Arc::new(Hs256TokenService::new(secret, ttl));
        Self::new(store, tokens)
    }

    /// Hash `password` and store a new zero-balance account.
    pub async fn open_account(
        &self,
        first_name: String,
        last_name: String,
        password: String,
        is_admin: bool,
    ) -> Result<Account, CreateAccountError> {
        let mut template = NewAccount::new(first_name, last_name, "", is_admin, Utc::now())?;
        template.encrypted_password = hash_blocking(password).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let candidate = template
                .clone()
                .with_account_number(AccountNumber::random());
            match self.store.create(candidate).await {
                Err(StoreError::Conflict(msg)) if attempt < ACCOUNT_NUMBER_ATTEMPTS => {
                    tracing::debug!(attempt, error = %msg, "account number taken, retrying");
                }
                other => return other.map_err(CreateAccountError::from),
            }
        }
    }

    /// Look up the account behind `number` and check `password` against it.
    ///
    /// Unknown numbers and wrong passwords are indistinguishable to the caller.
    pub async fn authenticate(
        &self,
        number: AccountNumber,
        password: String,
    ) -> Result<Option<Account>, LoginError> {
        let Some(account) = self.store.get_by_number(number).await? else {
            return Ok(None);
        };

        let phc = account.encrypted_password.clone();
        let matches = blocking(move || verify_password(&password, &phc))
            .await
            .map_err(LoginError::Task)?;

        Ok(matches.then_some(account))
    }
}

async fn hash_blocking(password: String) -> Result<String, CreateAccountError> {
    blocking(move || hash_password(&password))
        .await
        .map_err(CreateAccountError::Task)?
        .map_err(CreateAccountError::from)
}

/// Run CPU-heavy password work off the async workers. A panicked or
/// cancelled task is an error, never a result.
async fn blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "password task failed");
        e.to_string()
    })
}
