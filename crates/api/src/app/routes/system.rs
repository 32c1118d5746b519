use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use crate::app::dto::AccountResponse;
use crate::context::CallerContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// The caller's own account, as resolved by the gate.
pub async fn whoami(Extension(caller): Extension<CallerContext>) -> impl IntoResponse {
    Json(AccountResponse::from(caller.account().clone()))
}
