//! Account store boundary.
//!
//! The transfer engine and the HTTP layer only talk to accounts through the
//! [`AccountStore`] trait. Balance mutation always happens inside an explicit
//! unit of work (`AccountStore::Tx`) that is rolled back when dropped.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryAccountStore, InMemoryTx};
pub use postgres::PostgresAccountStore;
pub use r#trait::{AccountStore, StoreError, StoreResult};
