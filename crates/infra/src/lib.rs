//! Infrastructure layer: account storage backends and the transfer engine.

pub mod store;
pub mod transfer;

pub use store::{AccountStore, InMemoryAccountStore, PostgresAccountStore, StoreError, StoreResult};
pub use transfer::{TransferEngine, TransferError};
