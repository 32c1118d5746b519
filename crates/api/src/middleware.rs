use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use strongbox_auth::{AccessPolicy, AuthorizationGate};
use strongbox_core::{AccountId, DomainError};

use crate::app::errors;
use crate::context::CallerContext;

/// Middleware state: the shared gate plus the policy of the routes it guards.
#[derive(Clone)]
pub struct AuthState {
    pub gate: Arc<AuthorizationGate>,
    pub policy: AccessPolicy,
}

impl AuthState {
    pub fn new(gate: Arc<AuthorizationGate>) -> Self {
        Self {
            gate,
            policy: AccessPolicy::AUTHENTICATED,
        }
    }

    /// Same gate, different policy.
    pub fn require(&self, policy: AccessPolicy) -> Self {
        Self {
            gate: self.gate.clone(),
            policy,
        }
    }
}

/// Run the authorization gate before the handler.
///
/// The `:id` path parameter, when present, is the target account for
/// `self_only` policies. A malformed `:id` is only reported once the caller
/// has passed every gate step that does not need a target. On success a
/// [`CallerContext`] is attached to the request; on failure the handler never
/// runs.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    path: Option<Path<HashMap<String, String>>>,
    mut req: Request,
    next: Next,
) -> Response {
    let authorization = authorization_header(req.headers());

    let (policy, target, malformed) = match target_account(path) {
        Ok(target) => (state.policy, target, None),
        Err(e) => {
            let untargeted = AccessPolicy {
                self_only: false,
                ..state.policy
            };
            (untargeted, None, Some(e))
        }
    };

    let caller = match state
        .gate
        .authorize(authorization.as_deref(), policy, target, Utc::now())
        .await
    {
        Ok(caller) => caller,
        Err(e) => return errors::gate_error_to_response(e),
    };

    if let Some(e) = malformed {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", e.to_string());
    }

    req.extensions_mut().insert(CallerContext::new(caller));
    next.run(req).await
}

fn authorization_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn target_account(
    path: Option<Path<HashMap<String, String>>>,
) -> Result<Option<AccountId>, DomainError> {
    let Some(Path(params)) = path else {
        return Ok(None);
    };
    params.get("id").map(|raw| raw.parse::<AccountId>()).transpose()
}
