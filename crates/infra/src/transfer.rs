//! Balance transfer engine.
//!
//! A transfer runs inside exactly one unit of work against the account store:
//!
//! 1. validate the request (positive amount, distinct accounts)
//! 2. begin a unit of work
//! 3. read both balances inside it, locking in ascending id order
//! 4. reject if the source cannot cover the amount
//! 5. debit the source and credit the destination
//! 6. read the resulting source account inside the same unit of work
//! 7. commit; any commit failure means nothing happened
//!
//! Every early return drops the unit of work, which rolls it back.

use thiserror::Error;
use tracing::instrument;

use strongbox_core::{Account, AccountId, DomainError, TransferRequest};

use crate::store::{AccountStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("invalid transfer request: {0}")]
    InvalidRequest(String),

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },

    /// The unit of work could not be completed. No balance changed; the whole
    /// transfer may be retried.
    #[error("transfer failed: {0}")]
    TransferFailed(#[source] StoreError),
}

impl From<DomainError> for TransferError {
    fn from(value: DomainError) -> Self {
        TransferError::InvalidRequest(value.to_string())
    }
}

/// Stateless transfer executor over an [`AccountStore`].
#[derive(Debug, Clone)]
pub struct TransferEngine<S> {
    store: S,
}

impl<S: AccountStore> TransferEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(
        skip(self),
        fields(
            from = %request.from_account_id,
            to = %request.to_account_id,
            amount = request.amount
        ),
        err
    )]
    pub async fn transfer(&self, request: TransferRequest) -> Result<Account, TransferError> {
        request.validate()?;
        let TransferRequest {
            from_account_id: from,
            to_account_id: to,
            amount,
        } = request;

        let mut tx = self.store.begin().await.map_err(TransferError::TransferFailed)?;

        let (from_balance, _) = self.lock_pair(&mut tx, from, to).await?;

        if from_balance < amount {
            self.abort(tx).await;
            return Err(TransferError::InsufficientFunds {
                balance: from_balance,
                requested: amount,
            });
        }

        self.store
            .adjust_balance(&mut tx, from, -amount)
            .await
            .map_err(|e| staging_error(from, e))?;
        self.store
            .adjust_balance(&mut tx, to, amount)
            .await
            .map_err(|e| staging_error(to, e))?;

        let updated = self
            .store
            .account_for_update(&mut tx, from)
            .await
            .map_err(TransferError::TransferFailed)?
            .ok_or(TransferError::AccountNotFound(from))?;

        // Nothing after a successful commit may fail the transfer.
        self.store.commit(tx).await.map_err(|e| {
            tracing::warn!(error = %e, "transfer commit failed; no balance changed");
            TransferError::TransferFailed(e)
        })?;

        tracing::info!(balance = updated.balance, "transfer committed");
        Ok(updated)
    }

    /// Read `from` and `to` balances inside `tx`, claiming the lower id first
    /// so two opposing transfers cannot deadlock.
    async fn lock_pair(
        &self,
        tx: &mut S::Tx,
        from: AccountId,
        to: AccountId,
    ) -> Result<(i64, i64), TransferError> {
        let (first, second) = if from < to { (from, to) } else { (to, from) };

        let first_balance = self.balance_in(tx, first).await?;
        let second_balance = self.balance_in(tx, second).await?;

        if first == from {
            Ok((first_balance, second_balance))
        } else {
            Ok((second_balance, first_balance))
        }
    }

    async fn balance_in(&self, tx: &mut S::Tx, id: AccountId) -> Result<i64, TransferError> {
        self.store
            .balance_for_update(tx, id)
            .await
            .map_err(TransferError::TransferFailed)?
            .ok_or(TransferError::AccountNotFound(id))
    }

    async fn abort(&self, tx: S::Tx) {
        if let Err(e) = self.store.rollback(tx).await {
            // The transaction is discarded either way.
            tracing::warn!(error = %e, "rollback failed");
        }
    }
}

fn staging_error(id: AccountId, err: StoreError) -> TransferError {
    match err {
        StoreError::NotFound(_) => TransferError::AccountNotFound(id),
        other => TransferError::TransferFailed(other),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use strongbox_core::{AccountNumber, NewAccount, ProfileUpdate};

    use super::*;
    use crate::store::{InMemoryAccountStore, StoreResult};

    async fn open(store: &InMemoryAccountStore, number: i64, balance: i64) -> AccountId {
        let new = NewAccount::new("Test", "User", "hash", false, Utc::now())
            .unwrap()
            .with_account_number(AccountNumber::new(number))
            .with_balance(balance)
            .unwrap();
        store.create(new).await.unwrap().id
    }

    async fn balance(store: &InMemoryAccountStore, id: AccountId) -> i64 {
        store.get_by_id(id).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn transfer_then_overdraft_scenario() {
        let store = Arc::new(InMemoryAccountStore::new());
        let a = open(&store, 1, 1000).await;
        let b = open(&store, 2, 1000).await;
        let engine = TransferEngine::new(store.clone());

        let updated = engine.transfer(TransferRequest::new(a, b, 300)).await.unwrap();
        assert_eq!(updated.id, a);
        assert_eq!(updated.balance, 700);
        assert_eq!(balance(&store, b).await, 1300);

        let err = engine.transfer(TransferRequest::new(a, b, 1000)).await.unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientFunds {
                balance: 700,
                requested: 1000
            }
        );
        assert_eq!(balance(&store, a).await, 700);
        assert_eq!(balance(&store, b).await, 1300);
    }

    #[tokio::test]
    async fn invalid_requests_never_touch_the_store() {
        let store = Arc::new(InMemoryAccountStore::new());
        let a = open(&store, 1, 1000).await;
        let b = open(&store, 2, 0).await;
        let engine = TransferEngine::new(store.clone());

        for req in [
            TransferRequest::new(a, b, 0),
            TransferRequest::new(a, b, -10),
            TransferRequest::new(a, a, 10),
        ] {
            assert!(matches!(
                engine.transfer(req).await,
                Err(TransferError::InvalidRequest(_))
            ));
        }
        assert_eq!(balance(&store, a).await, 1000);
    }

    #[tokio::test]
    async fn unknown_accounts_are_reported() {
        let store = Arc::new(InMemoryAccountStore::new());
        let a = open(&store, 1, 1000).await;
        let engine = TransferEngine::new(store.clone());

        let missing = AccountId::new(404);
        assert_eq!(
            engine.transfer(TransferRequest::new(a, missing, 1)).await,
            Err(TransferError::AccountNotFound(missing))
        );
        assert_eq!(
            engine.transfer(TransferRequest::new(missing, a, 1)).await,
            Err(TransferError::AccountNotFound(missing))
        );
        assert_eq!(balance(&store, a).await, 1000);
    }

    #[tokio::test]
    async fn transfer_to_lower_id_reads_the_right_balance() {
        let store = Arc::new(InMemoryAccountStore::new());
        let low = open(&store, 1, 0).await;
        let high = open(&store, 2, 50).await;
        let engine = TransferEngine::new(store.clone());

        let updated = engine.transfer(TransferRequest::new(high, low, 50)).await.unwrap();
        assert_eq!(updated.balance, 0);
        assert_eq!(balance(&store, low).await, 50);
    }

    /// Store wrapper whose commits fail on demand (discarding the unit of
    /// work), and whose plain reads fail once a commit has gone through.
    struct FlakyCommit {
        inner: InMemoryAccountStore,
        fail: AtomicBool,
        reads_fail_after_commit: bool,
        committed: AtomicBool,
    }

    impl FlakyCommit {
        fn new(fail: bool, reads_fail_after_commit: bool) -> Self {
            Self {
                inner: InMemoryAccountStore::new(),
                fail: AtomicBool::new(fail),
                reads_fail_after_commit,
                committed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl AccountStore for FlakyCommit {
        type Tx = <InMemoryAccountStore as AccountStore>::Tx;

        async fn create(&self, account: NewAccount) -> StoreResult<Account> {
            self.inner.create(account).await
        }
        async fn list(&self) -> StoreResult<Vec<Account>> {
            self.inner.list().await
        }
        async fn get_by_id(&self, id: AccountId) -> StoreResult<Option<Account>> {
            if self.reads_fail_after_commit && self.committed.load(Ordering::SeqCst) {
                return Err(StoreError::Database("connection reset".into()));
            }
            self.inner.get_by_id(id).await
        }
        async fn get_by_number(&self, n: AccountNumber) -> StoreResult<Option<Account>> {
            self.inner.get_by_number(n).await
        }
        async fn update_profile(&self, id: AccountId, u: ProfileUpdate) -> StoreResult<Option<Account>> {
            self.inner.update_profile(id, u).await
        }
        async fn delete(&self, id: AccountId) -> StoreResult<bool> {
            self.inner.delete(id).await
        }
        async fn begin(&self) -> StoreResult<Self::Tx> {
            self.inner.begin().await
        }
        async fn balance_for_update(&self, tx: &mut Self::Tx, id: AccountId) -> StoreResult<Option<i64>> {
            self.inner.balance_for_update(tx, id).await
        }
        async fn account_for_update(&self, tx: &mut Self::Tx, id: AccountId) -> StoreResult<Option<Account>> {
            self.inner.account_for_update(tx, id).await
        }
        async fn adjust_balance(&self, tx: &mut Self::Tx, id: AccountId, d: i64) -> StoreResult<()> {
            self.inner.adjust_balance(tx, id, d).await
        }
        async fn commit(&self, tx: Self::Tx) -> StoreResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                drop(tx);
                return Err(StoreError::Database("connection reset during commit".into()));
            }
            self.inner.commit(tx).await?;
            self.committed.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn rollback(&self, tx: Self::Tx) -> StoreResult<()> {
            self.inner.rollback(tx).await
        }
    }

    #[tokio::test]
    async fn failed_commit_leaves_both_balances_untouched() {
        let store = Arc::new(FlakyCommit::new(true, false));
        let a = open(&store.inner, 1, 1000).await;
        let b = open(&store.inner, 2, 1000).await;
        let engine = TransferEngine::new(store.clone());

        let err = engine.transfer(TransferRequest::new(a, b, 300)).await.unwrap_err();
        assert!(matches!(err, TransferError::TransferFailed(StoreError::Database(_))));
        assert_eq!(balance(&store.inner, a).await, 1000);
        assert_eq!(balance(&store.inner, b).await, 1000);

        // Retrying the whole operation is safe once the store recovers.
        store.fail.store(false, Ordering::SeqCst);
        let updated = engine.transfer(TransferRequest::new(a, b, 300)).await.unwrap();
        assert_eq!(updated.balance, 700);
        assert_eq!(balance(&store.inner, b).await, 1300);
    }

    #[tokio::test]
    async fn read_outage_after_commit_still_reports_success() {
        let store = Arc::new(FlakyCommit::new(false, true));
        let a = open(&store.inner, 1, 1000).await;
        let b = open(&store.inner, 2, 1000).await;
        let engine = TransferEngine::new(store.clone());

        let updated = engine.transfer(TransferRequest::new(a, b, 300)).await.unwrap();
        assert_eq!(updated.id, a);
        assert_eq!(updated.balance, 700);
        assert!(matches!(store.get_by_id(a).await, Err(StoreError::Database(_))));
        assert_eq!(balance(&store.inner, a).await, 700);
        assert_eq!(balance(&store.inner, b).await, 1300);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_transfers_never_overdraw() {
        for _ in 0..50 {
            let store = Arc::new(InMemoryAccountStore::new());
            let a = open(&store, 1, 500).await;
            let b = open(&store, 2, 0).await;
            let engine = Arc::new(TransferEngine::new(store.clone()));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let engine = engine.clone();
                    tokio::spawn(async move { engine.transfer(TransferRequest::new(a, b, 500)).await })
                })
                .collect();

            let mut ok = 0;
            for h in handles {
                match h.await.unwrap() {
                    Ok(_) => ok += 1,
                    Err(TransferError::InsufficientFunds { .. }) | Err(TransferError::TransferFailed(_)) => {}
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            }

            assert_eq!(ok, 1);
            assert_eq!(balance(&store, a).await, 0);
            assert_eq!(balance(&store, b).await, 500);
        }
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            })]

            /// Property: any sequence of transfers among three accounts conserves
            /// the total and never leaves a negative balance.
            #[test]
            fn transfers_conserve_funds(
                opening in prop::collection::vec(0i64..10_000, 3),
                moves in prop::collection::vec((0usize..3, 0usize..3, -50i64..5_000), 1..40)
            ) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                rt.block_on(async {
                    let store = Arc::new(InMemoryAccountStore::new());
                    let mut ids = Vec::new();
                    for (i, b) in opening.iter().enumerate() {
                        ids.push(open(&store, i as i64, *b).await);
                    }
                    let engine = TransferEngine::new(store.clone());
                    let total: i64 = opening.iter().sum();

                    for (from, to, amount) in moves {
                        let before = balance(&store, ids[from]).await;
                        let result = engine
                            .transfer(TransferRequest::new(ids[from], ids[to], amount))
                            .await;
                        if result.is_err() && from != to {
                            // A rejected transfer leaves the source untouched.
                            assert_eq!(balance(&store, ids[from]).await, before);
                        }

                        let mut sum = 0;
                        for id in &ids {
                            let b = balance(&store, *id).await;
                            assert!(b >= 0);
                            sum += b;
                        }
                        assert_eq!(sum, total);
                    }
                });
            }
        }
    }
}
