//! Transfer request value.

use serde::{Deserialize, Serialize};

use crate::{AccountId, DomainError, DomainResult};

/// A request to move `amount` from one account to another.
///
/// Ephemeral: its only durable effect is the balance change it causes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
}

impl TransferRequest {
    pub fn new(from: AccountId, to: AccountId, amount: i64) -> Self {
        Self {
            from_account_id: from,
            to_account_id: to,
            amount,
        }
    }

    /// Reject degenerate transfers before any store work happens.
    pub fn validate(&self) -> DomainResult<()> {
        if self.amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        if self.from_account_id == self.to_account_id {
            return Err(DomainError::validation(
                "source and destination accounts must differ",
            ));
        }
        Ok(())
    }
}
