//! Account version expectations for optimistic concurrency.

use crate::error::{DomainError, DomainResult};

/// The account version a writer based its change on. The change only
/// applies if the account is still at this version.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(pub u64);

impl ExpectedVersion {
    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.0 != actual {
            return Err(DomainError::StaleVersion {
                expected: self.0,
                actual,
            });
        }
        Ok(())
    }
}
