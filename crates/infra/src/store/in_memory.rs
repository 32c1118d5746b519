use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use strongbox_auth::{SubjectLookupError, SubjectResolver};
use strongbox_core::{
    Account, AccountId, AccountNumber, ExpectedVersion, NewAccount, ProfileUpdate, apply_delta,
};

use super::r#trait::{AccountStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Accounts {
    by_id: BTreeMap<AccountId, Account>,
    next_id: i64,
}

/// In-memory account store.
///
/// Intended for tests/dev. Units of work are optimistic: reads record the
/// account version, writes are staged, and `commit` re-checks every recorded
/// version under the write lock before applying all staged deltas at once.
/// A concurrent commit in between turns into `StoreError::Conflict`.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    inner: RwLock<Accounts>,
}

/// Staged unit of work for [`InMemoryAccountStore`].
#[derive(Debug, Default)]
pub struct InMemoryTx {
    read_versions: BTreeMap<AccountId, u64>,
    deltas: BTreeMap<AccountId, i64>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Accounts>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Accounts>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    /// Record the version `tx` observed and return the committed balance.
    fn observe(&self, tx: &mut InMemoryTx, id: AccountId) -> StoreResult<Option<i64>> {
        let accounts = self.read()?;
        let Some(account) = accounts.by_id.get(&id) else {
            return Ok(None);
        };
        tx.read_versions.entry(id).or_insert(account.version);
        Ok(Some(account.balance))
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    type Tx = InMemoryTx;

    async fn create(&self, new: NewAccount) -> StoreResult<Account> {
        let mut accounts = self.write()?;

        if accounts
            .by_id
            .values()
            .any(|a| a.account_number == new.account_number)
        {
            return Err(StoreError::Conflict(format!(
                "account number {} already exists",
                new.account_number
            )));
        }
        if new.balance < 0 {
            return Err(StoreError::Constraint("balance must be >= 0".to_string()));
        }

        accounts.next_id += 1;
        let account = Account {
            id: AccountId::new(accounts.next_id),
            first_name: new.first_name,
            last_name: new.last_name,
            account_number: new.account_number,
            balance: new.balance,
            is_admin: new.is_admin,
            encrypted_password: new.encrypted_password,
            created_at: new.created_at,
            version: 0,
        };
        accounts.by_id.insert(account.id, account.clone());
        Ok(account)
    }

    async fn list(&self) -> StoreResult<Vec<Account>> {
        Ok(self.read()?.by_id.values().cloned().collect())
    }

    async fn get_by_id(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.read()?.by_id.get(&id).cloned())
    }

    async fn get_by_number(&self, number: AccountNumber) -> StoreResult<Option<Account>> {
        Ok(self
            .read()?
            .by_id
            .values()
            .find(|a| a.account_number == number)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> StoreResult<Option<Account>> {
        let mut accounts = self.write()?;
        let Some(account) = accounts.by_id.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(account);
        account.version += 1;
        Ok(Some(account.clone()))
    }

    async fn delete(&self, id: AccountId) -> StoreResult<bool> {
        Ok(self.write()?.by_id.remove(&id).is_some())
    }

    async fn begin(&self) -> StoreResult<Self::Tx> {
        Ok(InMemoryTx::default())
    }

    async fn balance_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> StoreResult<Option<i64>> {
        let committed = self.observe(tx, id)?;
        Ok(committed.map(|b| b + tx.deltas.get(&id).copied().unwrap_or(0)))
    }

    async fn account_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> StoreResult<Option<Account>> {
        let Some(mut account) = self.read()?.by_id.get(&id).cloned() else {
            return Ok(None);
        };
        tx.read_versions.entry(id).or_insert(account.version);
        if let Some(delta) = tx.deltas.get(&id) {
            account.balance = account
                .balance_after(*delta)
                .map_err(|e| StoreError::Constraint(e.to_string()))?;
            // Commit bumps the version of every account it writes.
            account.version += 1;
        }
        Ok(Some(account))
    }

    async fn adjust_balance(&self, tx: &mut Self::Tx, id: AccountId, delta: i64) -> StoreResult<()> {
        let committed = self.observe(tx, id)?.ok_or(StoreError::NotFound(id))?;
        let staged = tx.deltas.get(&id).copied().unwrap_or(0);

        let total = staged
            .checked_add(delta)
            .ok_or_else(|| StoreError::Constraint("balance overflow".to_string()))?;
        apply_delta(committed, total).map_err(|e| StoreError::Constraint(e.to_string()))?;

        tx.deltas.insert(id, total);
        Ok(())
    }

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()> {
        let mut accounts = self.write()?;

        // Validate everything first so the apply phase cannot fail half-way.
        for (id, seen) in &tx.read_versions {
            let account = accounts
                .by_id
                .get(id)
                .ok_or_else(|| StoreError::Conflict(format!("account {id} was removed")))?;
            ExpectedVersion(*seen)
                .check(account.version)
                .map_err(|e| StoreError::Conflict(format!("account {id}: {e}")))?;
        }

        let mut next_balances = Vec::with_capacity(tx.deltas.len());
        for (id, delta) in &tx.deltas {
            let account = accounts.by_id.get(id).ok_or(StoreError::NotFound(*id))?;
            let next = account
                .balance_after(*delta)
                .map_err(|e| StoreError::Constraint(e.to_string()))?;
            next_balances.push((*id, next));
        }

        for (id, balance) in next_balances {
            if let Some(account) = accounts.by_id.get_mut(&id) {
                account.balance = balance;
                account.version += 1;
            }
        }

        Ok(())
    }

    async fn rollback(&self, _tx: Self::Tx) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SubjectResolver for InMemoryAccountStore {
    async fn resolve(&self, id: AccountId) -> Result<Option<Account>, SubjectLookupError> {
        self.get_by_id(id)
            .await
            .map_err(|e| SubjectLookupError(e.to_string()))
    }
}
