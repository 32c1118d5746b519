//! `strongbox-core` — account domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod account;
pub mod error;
pub mod id;
pub mod transfer;
pub mod version;

pub use account::{Account, NewAccount, ProfileUpdate, apply_delta};
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, AccountNumber};
pub use transfer::TransferRequest;
pub use version::ExpectedVersion;
