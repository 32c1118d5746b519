use strongbox_auth::{AccessPolicy, Caller, GateError, TokenClaims};
use strongbox_core::{Account, AccountId};

/// Authenticated caller for a request.
///
/// Inserted by the authorization middleware; present on every protected
/// route. Holds the account as it was resolved at authorization time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    caller: Caller,
}

impl CallerContext {
    pub fn new(caller: Caller) -> Self {
        Self { caller }
    }

    pub fn account(&self) -> &Account {
        &self.caller.account
    }

    pub fn account_id(&self) -> AccountId {
        self.caller.id()
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.caller.claims
    }

    /// Re-check a policy against a target only known after reading the body.
    pub fn ensure(&self, policy: AccessPolicy, target: Option<AccountId>) -> Result<(), GateError> {
        self.caller.ensure(policy, target)
    }
}
