use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use strongbox_auth::{AccessPolicy, SubjectResolver};
use strongbox_core::TransferRequest;
use strongbox_infra::AccountStore;

use crate::app::{dto, errors, services::AppServices};
use crate::context::CallerContext;

/// Move funds out of an account the caller owns (or any account, for admins).
pub async fn transfer<S>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(caller): Extension<CallerContext>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Response
where
    S: AccountStore + SubjectResolver,
{
    let Json(request) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    // The source account is only known once the body is parsed.
    if let Err(e) = caller.ensure(AccessPolicy::SELF_OR_ADMIN, Some(request.from_account_id)) {
        return errors::gate_error_to_response(e);
    }

    match services.engine.transfer(request).await {
        Ok(source) => (StatusCode::OK, Json(dto::AccountResponse::from(source))).into_response(),
        Err(e) => errors::transfer_error_to_response(e),
    }
}
