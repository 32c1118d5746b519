use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use strongbox_auth::{PasswordError, SubjectResolver};
use strongbox_core::{AccountId, ProfileUpdate};
use strongbox_infra::AccountStore;

use crate::app::services::{AppServices, CreateAccountError};
use crate::app::{dto, errors};

pub async fn list_accounts<S>(Extension(services): Extension<Arc<AppServices<S>>>) -> Response
where
    S: AccountStore + SubjectResolver,
{
    match services.store.list().await {
        Ok(accounts) => {
            let items = accounts
                .into_iter()
                .map(dto::AccountResponse::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_account<S>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    body: Result<Json<dto::CreateAccountRequest>, JsonRejection>,
) -> Response
where
    S: AccountStore + SubjectResolver,
{
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let created = services
        .open_account(body.first_name, body.last_name, body.password, body.is_admin)
        .await;

    match created {
        Ok(account) => {
            tracing::info!(
                account_id = %account.id,
                account_number = %account.account_number,
                is_admin = account.is_admin,
                "account created"
            );
            (StatusCode::CREATED, Json(dto::AccountResponse::from(account))).into_response()
        }
        Err(CreateAccountError::Domain(e)) => errors::domain_error_to_response(e),
        Err(CreateAccountError::Password(e @ PasswordError::Empty)) => {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", e.to_string())
        }
        Err(CreateAccountError::Store(e)) => errors::store_error_to_response(e),
        Err(e) => {
            tracing::error!(error = %e, "account creation failed");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error",
            )
        }
    }
}

pub async fn get_account<S>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<AccountId>,
) -> Response
where
    S: AccountStore + SubjectResolver,
{
    match services.store.get_by_id(id).await {
        Ok(Some(account)) => (StatusCode::OK, Json(dto::AccountResponse::from(account))).into_response(),
        Ok(None) => errors::account_not_found(id),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_account<S>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<AccountId>,
    body: Result<Json<dto::UpdateAccountRequest>, JsonRejection>,
) -> Response
where
    S: AccountStore + SubjectResolver,
{
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let update = match ProfileUpdate::from(body).validate() {
        Ok(u) if u.is_empty() => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "nothing to update",
            );
        }
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.update_profile(id, update).await {
        Ok(Some(account)) => (StatusCode::OK, Json(dto::AccountResponse::from(account))).into_response(),
        Ok(None) => errors::account_not_found(id),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_account<S>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<AccountId>,
) -> Response
where
    S: AccountStore + SubjectResolver,
{
    match services.store.delete(id).await {
        Ok(true) => {
            tracing::info!(account_id = %id, "account deleted");
            (StatusCode::OK, Json(serde_json::json!({ "deleted": id }))).into_response()
        }
        Ok(false) => errors::account_not_found(id),
        Err(e) => errors::store_error_to_response(e),
    }
}
