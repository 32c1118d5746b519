use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use strongbox_auth::GateError;
use strongbox_core::DomainError;
use strongbox_infra::{StoreError, TransferError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn internal_error() -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}

/// Every authorization failure is a 401; only the `error` code tells them apart.
pub fn gate_error_to_response(err: GateError) -> axum::response::Response {
    let code = match &err {
        GateError::MissingToken => "missing_token",
        GateError::InvalidToken(_) => "invalid_token",
        GateError::UnknownSubject => "unknown_subject",
        GateError::InsufficientPrivilege(_) => "insufficient_privilege",
        GateError::Lookup(e) => {
            tracing::error!(error = %e, "subject lookup failed");
            return internal_error();
        }
    };
    tracing::debug!(error = %err, code, "request rejected by authorization gate");
    json_error(StatusCode::UNAUTHORIZED, code, "permission denied")
}

pub fn transfer_error_to_response(err: TransferError) -> axum::response::Response {
    match err {
        TransferError::InvalidRequest(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_request", msg),
        TransferError::AccountNotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "account_not_found", format!("account {id} not found"))
        }
        e @ TransferError::InsufficientFunds { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds", e.to_string())
        }
        TransferError::TransferFailed(e) => {
            tracing::warn!(error = %e, "transfer failed");
            json_error(
                StatusCode::CONFLICT,
                "transfer_failed",
                "transfer could not be completed; no funds were moved",
            )
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "account_not_found", format!("account {id} not found"))
        }
        StoreError::Conflict(msg) => {
            tracing::warn!(error = %msg, "store conflict");
            json_error(StatusCode::CONFLICT, "conflict", "conflicting update, retry the request")
        }
        StoreError::Constraint(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "constraint_violation", msg)
        }
        StoreError::Database(msg) => {
            tracing::error!(error = %msg, "store failure");
            internal_error()
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
}

pub fn account_not_found(id: strongbox_core::AccountId) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "account_not_found", format!("account {id} not found"))
}
