//! Account entity.
//!
//! An account is owned by the account store; everything else only reads it
//! or asks the store for a balance delta. The balance is kept in the smallest
//! currency unit and must never go negative.

use chrono::{DateTime, Utc};

use crate::{AccountId, AccountNumber, DomainError, DomainResult};

const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub account_number: AccountNumber,
    pub balance: i64,
    pub is_admin: bool,
    /// Opaque credential (PHC string). Never leaves the service.
    pub encrypted_password: String,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Account {
    /// Balance after applying `delta`, rejecting overflow and overdraft.
    pub fn balance_after(&self, delta: i64) -> DomainResult<i64> {
        apply_delta(self.balance, delta)
    }
}

/// Apply a balance delta, enforcing `balance >= 0`.
pub fn apply_delta(balance: i64, delta: i64) -> DomainResult<i64> {
    let next = balance
        .checked_add(delta)
        .ok_or_else(|| DomainError::invariant("balance overflow"))?;
    if next < 0 {
        return Err(DomainError::invariant(format!(
            "balance would become negative ({balance} + {delta})"
        )));
    }
    Ok(next)
}

/// Data required to create an account. The store assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub account_number: AccountNumber,
    pub encrypted_password: String,
    pub is_admin: bool,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl NewAccount {
    /// Build a new zero-balance account with a random account number.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        encrypted_password: impl Into<String>,
        is_admin: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let first_name = validate_name("first_name", first_name.into())?;
        let last_name = validate_name("last_name", last_name.into())?;

        Ok(Self {
            first_name,
            last_name,
            account_number: AccountNumber::random(),
            encrypted_password: encrypted_password.into(),
            is_admin,
            balance: 0,
            created_at: now,
        })
    }

    pub fn with_balance(mut self, balance: i64) -> DomainResult<Self> {
        if balance < 0 {
            return Err(DomainError::validation("opening balance must be >= 0"));
        }
        self.balance = balance;
        Ok(self)
    }

    pub fn with_account_number(mut self, number: AccountNumber) -> Self {
        self.account_number = number;
        self
    }
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(self) -> DomainResult<Self> {
        Ok(Self {
            first_name: self
                .first_name
                .map(|v| validate_name("first_name", v))
                .transpose()?,
            last_name: self
                .last_name
                .map(|v| validate_name("last_name", v))
                .transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none()
    }

    pub fn apply_to(&self, account: &mut Account) {
        if let Some(first) = &self.first_name {
            account.first_name = first.clone();
        }
        if let Some(last) = &self.last_name {
            account.last_name = last.clone();
        }
    }
}

fn validate_name(field: &str, value: String) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: i64) -> Account {
        Account {
            id: AccountId::new(1),
            first_name: "John".into(),
            last_name: "Doe".into(),
            account_number: AccountNumber::new(123_456),
            balance,
            is_admin: false,
            encrypted_password: String::new(),
            created_at: Utc::now(),
            version: 0,
        }
    }

    #[test]
    fn debit_within_balance_is_allowed() {
        assert_eq!(account(1000).balance_after(-300).unwrap(), 700);
        assert_eq!(account(1000).balance_after(-1000).unwrap(), 0);
    }

    #[test]
    fn overdraft_is_rejected() {
        let err = account(700).balance_after(-1000).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn overflow_is_rejected() {
        assert!(account(i64::MAX).balance_after(1).is_err());
    }

    #[test]
    fn new_account_trims_and_validates_names() {
        let acc = NewAccount::new("  John ", "Doe", "hash", false, Utc::now()).unwrap();
        assert_eq!(acc.first_name, "John");
        assert_eq!(acc.balance, 0);

        assert!(NewAccount::new("", "Doe", "hash", false, Utc::now()).is_err());
        assert!(NewAccount::new("x".repeat(51), "Doe", "hash", false, Utc::now()).is_err());
    }

    #[test]
    fn negative_opening_balance_is_rejected() {
        let acc = NewAccount::new("John", "Doe", "hash", false, Utc::now()).unwrap();
        assert!(acc.with_balance(-1).is_err());
    }

    #[test]
    fn profile_update_only_touches_given_fields() {
        let mut acc = account(0);
        let update = ProfileUpdate {
            first_name: Some(" Jane ".into()),
            last_name: None,
        }
        .validate()
        .unwrap();
        update.apply_to(&mut acc);
        assert_eq!(acc.first_name, "Jane");
        assert_eq!(acc.last_name, "Doe");
    }

    mod props {
        use super::super::apply_delta;
        use proptest::prelude::*;

        proptest! {
            /// Property: whatever delta is requested, an accepted result is never negative.
            #[test]
            fn accepted_deltas_never_overdraw(balance in 0i64..1_000_000, delta in -2_000_000i64..2_000_000) {
                match apply_delta(balance, delta) {
                    Ok(next) => {
                        prop_assert!(next >= 0);
                        prop_assert_eq!(next, balance + delta);
                    }
                    Err(_) => prop_assert!(balance + delta < 0),
                }
            }
        }
    }
}
