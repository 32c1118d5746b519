//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, transfer engine, token service and gate
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use strongbox_auth::SubjectResolver;
use strongbox_infra::AccountStore;

use crate::middleware::AuthState;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app<S>(services: Arc<AppServices<S>>) -> Router
where
    S: AccountStore + SubjectResolver,
{
    let auth_state = AuthState::new(services.gate.clone());

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/login", post(routes::session::login::<S>))
        .merge(routes::router::<S>(auth_state))
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
