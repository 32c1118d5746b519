use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use strongbox_core::{Account, AccountId, AccountNumber, ProfileUpdate};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub account_number: AccountNumber,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<UpdateAccountRequest> for ProfileUpdate {
    fn from(body: UpdateAccountRequest) -> Self {
        ProfileUpdate {
            first_name: body.first_name,
            last_name: body.last_name,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub account_number: AccountNumber,
    pub token: String,
}

/// Public view of an account. The password hash and the concurrency
/// version never leave the server.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub account_number: AccountNumber,
    pub balance: i64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            first_name: a.first_name,
            last_name: a.last_name,
            account_number: a.account_number,
            balance: a.balance,
            is_admin: a.is_admin,
            created_at: a.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_response_hides_secrets() {
        let account = Account {
            id: AccountId::new(3),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            account_number: AccountNumber::new(123_456),
            balance: 10,
            is_admin: false,
            encrypted_password: "$argon2id$secret".into(),
            created_at: Utc::now(),
            version: 7,
        };
        let json = serde_json::to_value(AccountResponse::from(account)).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["account_number"], 123_456);
        assert!(json.get("encrypted_password").is_none());
        assert!(json.get("version").is_none());
    }

    #[test]
    fn create_request_defaults_to_regular_account() {
        let body: CreateAccountRequest = serde_json::from_value(serde_json::json!({
            "first_name": "A",
            "last_name": "B",
            "password": "pw"
        }))
        .unwrap();
        assert!(!body.is_admin);
    }
}
