use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use strongbox_auth::SubjectResolver;
use strongbox_infra::AccountStore;

use crate::app::services::{AppServices, LoginError};
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub async fn login<S>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> Response
where
    S: AccountStore + SubjectResolver,
{
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let number = body.account_number;

    let account = match services.authenticate(number, body.password).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            tracing::info!(account_number = %number, "login rejected");
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "invalid account number or password",
            );
        }
        Err(LoginError::Store(e)) => return errors::store_error_to_response(e),
        Err(e @ LoginError::Task(_)) => {
            tracing::error!(account_number = %number, error = %e, "login could not be checked");
            return errors::internal_error();
        }
    };

    match services.tokens.issue(&account, Utc::now()) {
        Ok(issued) => {
            tracing::info!(account_id = %account.id, "login succeeded");
            (
                StatusCode::OK,
                Json(dto::LoginResponse {
                    account_number: account.account_number,
                    token: issued.token,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "token issuance failed");
            errors::internal_error()
        }
    }
}

/// Revoke the presented token; it is rejected by every later request.
pub async fn logout<S>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(caller): Extension<CallerContext>,
) -> Response
where
    S: AccountStore + SubjectResolver,
{
    if let Err(e) = services.tokens.revoke(caller.claims(), Utc::now()) {
        tracing::error!(account_id = %caller.account_id(), error = %e, "token revocation failed");
        return errors::internal_error();
    }
    tracing::info!(account_id = %caller.account_id(), "logged out");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "logged_out": true })),
    )
        .into_response()
}
