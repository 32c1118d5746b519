//! Postgres-backed account store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Conflict` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (other) | Any other | `Database` |
//! | PoolClosed, Io, other | N/A | `Database` |
//!
//! ## Concurrency
//!
//! A unit of work is a `sqlx::Transaction`. `balance_for_update` takes a
//! row lock (`SELECT ... FOR UPDATE`), so concurrent transfers touching the
//! same account serialize on that row. The `balance >= 0` CHECK constraint is
//! the last line of defence against overdraft. An uncommitted transaction is
//! rolled back when dropped.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use strongbox_auth::{SubjectLookupError, SubjectResolver};
use strongbox_core::{Account, AccountId, AccountNumber, NewAccount, ProfileUpdate};

use super::r#trait::{AccountStore, StoreError, StoreResult};

const ACCOUNT_COLUMNS: &str = "id, first_name, last_name, account_number, encrypted_password, \
                               balance, is_admin, version, created_at";

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: Arc<PgPool>,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `accounts` table if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id                 BIGSERIAL PRIMARY KEY,
                first_name         VARCHAR(50)  NOT NULL,
                last_name          VARCHAR(50)  NOT NULL,
                account_number     BIGINT       NOT NULL UNIQUE,
                encrypted_password VARCHAR(255) NOT NULL,
                balance            BIGINT       NOT NULL CHECK (balance >= 0),
                is_admin           BOOLEAN      NOT NULL DEFAULT FALSE,
                version            BIGINT       NOT NULL DEFAULT 0,
                created_at         TIMESTAMPTZ  NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        tracing::info!("accounts table initialized");
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    type Tx = Transaction<'static, Postgres>;

    #[instrument(skip(self, new), fields(account_number = %new.account_number), err)]
    async fn create(&self, new: NewAccount) -> StoreResult<Account> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO accounts (
                first_name, last_name, account_number, encrypted_password,
                balance, is_admin, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(new.account_number.get())
        .bind(&new.encrypted_password)
        .bind(new.balance)
        .bind(new.is_admin)
        .bind(new.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_account", e))?;

        account_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> StoreResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter().map(account_from_row).collect()
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn get_by_id(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_account_by_id", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(skip(self), fields(account_number = %number), err)]
    async fn get_by_number(&self, number: AccountNumber) -> StoreResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_number = $1"
        ))
        .bind(number.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_account_by_number", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(skip(self, update), fields(account_id = %id), err)]
    async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> StoreResult<Option<Account>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts
            SET first_name = COALESCE($2, first_name),
                last_name  = COALESCE($3, last_name),
                version    = version + 1
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(update.first_name)
        .bind(update.last_name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_profile", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn delete(&self, id: AccountId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_account", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn begin(&self) -> StoreResult<Self::Tx> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    #[instrument(skip(self, tx), fields(account_id = %id), err)]
    async fn balance_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> StoreResult<Option<i64>> {
        let row = sqlx::query("SELECT balance FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("balance_for_update", e))?;

        row.map(|r| {
            r.try_get::<i64, _>("balance")
                .map_err(|e| StoreError::Database(format!("failed to read balance: {e}")))
        })
        .transpose()
    }

    #[instrument(skip(self, tx), fields(account_id = %id), err)]
    async fn account_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> StoreResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("account_for_update", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(skip(self, tx), fields(account_id = %id), err)]
    async fn adjust_balance(&self, tx: &mut Self::Tx, id: AccountId, delta: i64) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + $2,
                version = version + 1
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(delta)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("adjust_balance", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()> {
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()> {
        tx.rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl SubjectResolver for PostgresAccountStore {
    async fn resolve(&self, id: AccountId) -> Result<Option<Account>, SubjectLookupError> {
        self.get_by_id(id)
            .await
            .map_err(|e| SubjectLookupError(e.to_string()))
    }
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<Account> {
    let decode = |e: sqlx::Error| StoreError::Database(format!("failed to decode account row: {e}"));

    let version: i64 = row.try_get("version").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

    Ok(Account {
        id: AccountId::new(row.try_get("id").map_err(decode)?),
        first_name: row.try_get("first_name").map_err(decode)?,
        last_name: row.try_get("last_name").map_err(decode)?,
        account_number: AccountNumber::new(row.try_get("account_number").map_err(decode)?),
        balance: row.try_get("balance").map_err(decode)?,
        is_admin: row.try_get("is_admin").map_err(decode)?,
        encrypted_password: row.try_get("encrypted_password").map_err(decode)?,
        created_at,
        version: version.max(0) as u64,
    })
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Database(format!("sqlx error in {}: {}", operation, other)),
    }
}
