use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use strongbox_core::{Account, AccountId, AccountNumber, NewAccount, ProfileUpdate};

/// Account store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, constraints) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another writer changed the data this unit of work depended on, or a
    /// uniqueness constraint was hit.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("account {0} not found")]
    NotFound(AccountId),

    /// A data constraint (e.g. non-negative balance) rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Connection, I/O or any other backend failure.
    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable account storage keyed by id and by account number.
///
/// ## Unit of work
///
/// `begin()` opens a unit of work (`Self::Tx`). Every store call that takes
/// part in one logical balance change receives that unit of work explicitly.
/// Nothing done through it is visible to other readers until `commit()`
/// succeeds; dropping it (or calling `rollback()`) discards everything.
///
/// Implementations must:
/// - never expose a negative balance
/// - make `commit()` all-or-nothing
/// - detect conflicting concurrent balance changes (locking or versioning)
///   rather than silently losing an update
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    type Tx: Send;

    async fn create(&self, account: NewAccount) -> StoreResult<Account>;

    async fn list(&self) -> StoreResult<Vec<Account>>;

    async fn get_by_id(&self, id: AccountId) -> StoreResult<Option<Account>>;

    async fn get_by_number(&self, number: AccountNumber) -> StoreResult<Option<Account>>;

    /// Returns `None` when the account does not exist.
    async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> StoreResult<Option<Account>>;

    /// Returns `false` when the account did not exist.
    async fn delete(&self, id: AccountId) -> StoreResult<bool>;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// Read a balance inside `tx`, claiming the row for the rest of the unit
    /// of work. Returns `None` when the account does not exist.
    async fn balance_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> StoreResult<Option<i64>>;

    /// Read the whole account as `tx` currently sees it, staged balance
    /// changes included. Returns `None` when the account does not exist.
    async fn account_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> StoreResult<Option<Account>>;

    async fn adjust_balance(&self, tx: &mut Self::Tx, id: AccountId, delta: i64) -> StoreResult<()>;

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()>;

    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()>;
}

#[async_trait]
impl<S> AccountStore for Arc<S>
where
    S: AccountStore,
{
    type Tx = S::Tx;

    async fn create(&self, account: NewAccount) -> StoreResult<Account> {
        (**self).create(account).await
    }

    async fn list(&self) -> StoreResult<Vec<Account>> {
        (**self).list().await
    }

    async fn get_by_id(&self, id: AccountId) -> StoreResult<Option<Account>> {
        (**self).get_by_id(id).await
    }

    async fn get_by_number(&self, number: AccountNumber) -> StoreResult<Option<Account>> {
        (**self).get_by_number(number).await
    }

    async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> StoreResult<Option<Account>> {
        (**self).update_profile(id, update).await
    }

    async fn delete(&self, id: AccountId) -> StoreResult<bool> {
        (**self).delete(id).await
    }

    async fn begin(&self) -> StoreResult<Self::Tx> {
        (**self).begin().await
    }

    async fn balance_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> StoreResult<Option<i64>> {
        (**self).balance_for_update(tx, id).await
    }

    async fn account_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> StoreResult<Option<Account>> {
        (**self).account_for_update(tx, id).await
    }

    async fn adjust_balance(&self, tx: &mut Self::Tx, id: AccountId, delta: i64) -> StoreResult<()> {
        (**self).adjust_balance(tx, id, delta).await
    }

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()> {
        (**self).commit(tx).await
    }

    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()> {
        (**self).rollback(tx).await
    }
}
