use serde::Serialize;
use thiserror::Error;

use strongbox_core::{Account, AccountId};

/// Per-endpoint access policy.
///
/// `self_only` is satisfied either by the owner of the target account or by an
/// admin (self-or-admin). `admin_only` admits admins only.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessPolicy {
    pub admin_only: bool,
    pub self_only: bool,
}

impl AccessPolicy {
    /// Any caller with a valid token for an existing account.
    pub const AUTHENTICATED: Self = Self {
        admin_only: false,
        self_only: false,
    };

    pub const ADMIN_ONLY: Self = Self {
        admin_only: true,
        self_only: false,
    };

    pub const SELF_OR_ADMIN: Self = Self {
        admin_only: false,
        self_only: true,
    };
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("admin privilege required")]
    AdminRequired,

    #[error("account {caller} may not act on account {target}")]
    NotOwner { caller: AccountId, target: AccountId },

    #[error("self-only policy used without a target account")]
    MissingTarget,
}

/// Apply `policy` to a resolved caller.
///
/// - No IO
/// - No panics
pub fn check_access(
    caller: &Account,
    policy: AccessPolicy,
    target: Option<AccountId>,
) -> Result<(), AccessDenied> {
    if policy.admin_only && !caller.is_admin {
        return Err(AccessDenied::AdminRequired);
    }

    if policy.self_only {
        let target = target.ok_or(AccessDenied::MissingTarget)?;
        if !caller.is_admin && caller.id != target {
            return Err(AccessDenied::NotOwner {
                caller: caller.id,
                target,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use strongbox_core::AccountNumber;

    fn account(id: i64, is_admin: bool) -> Account {
        Account {
            id: AccountId::new(id),
            first_name: "A".into(),
            last_name: "B".into(),
            account_number: AccountNumber::new(id * 10),
            balance: 0,
            is_admin,
            encrypted_password: String::new(),
            created_at: Utc::now(),
            version: 0,
        }
    }

    #[test]
    fn non_admin_cannot_reach_admin_only() {
        assert_eq!(
            check_access(&account(1, false), AccessPolicy::ADMIN_ONLY, None),
            Err(AccessDenied::AdminRequired)
        );
        assert_eq!(check_access(&account(1, true), AccessPolicy::ADMIN_ONLY, None), Ok(()));
    }

    #[test]
    fn non_admin_cannot_reach_another_accounts_resource() {
        let a = account(1, false);
        assert_eq!(
            check_access(&a, AccessPolicy::SELF_OR_ADMIN, Some(AccountId::new(2))),
            Err(AccessDenied::NotOwner {
                caller: AccountId::new(1),
                target: AccountId::new(2),
            })
        );
        assert_eq!(check_access(&a, AccessPolicy::SELF_OR_ADMIN, Some(AccountId::new(1))), Ok(()));
    }

    #[test]
    fn admin_satisfies_self_only_for_any_target() {
        let admin = account(9, true);
        assert_eq!(
            check_access(&admin, AccessPolicy::SELF_OR_ADMIN, Some(AccountId::new(2))),
            Ok(())
        );
    }

    #[test]
    fn self_only_without_target_is_denied() {
        assert_eq!(
            check_access(&account(9, true), AccessPolicy::SELF_OR_ADMIN, None),
            Err(AccessDenied::MissingTarget)
        );
    }

    #[test]
    fn both_flags_require_admin_first() {
        let policy = AccessPolicy {
            admin_only: true,
            self_only: true,
        };
        assert_eq!(
            check_access(&account(1, false), policy, Some(AccountId::new(1))),
            Err(AccessDenied::AdminRequired)
        );
    }
}
