use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};

use strongbox_auth::{AccessPolicy, SubjectResolver};
use strongbox_infra::AccountStore;

use crate::middleware::{AuthState, auth_middleware};

pub mod accounts;
pub mod session;
pub mod system;
pub mod transfer;

/// Router for every endpoint that needs a bearer token.
///
/// Each route group carries its own gate policy; the gate runs before the
/// handler, which therefore always sees an authorized [`CallerContext`].
///
/// [`CallerContext`]: crate::context::CallerContext
pub fn router<S>(auth: AuthState) -> Router
where
    S: AccountStore + SubjectResolver,
{
    let member = auth.require(AccessPolicy::AUTHENTICATED);
    let owner = auth.require(AccessPolicy::SELF_OR_ADMIN);
    let admin = auth.require(AccessPolicy::ADMIN_ONLY);

    Router::new()
        .route(
            "/whoami",
            get(system::whoami).route_layer(from_fn_with_state(member.clone(), auth_middleware)),
        )
        .route(
            "/logout",
            post(session::logout::<S>)
                .route_layer(from_fn_with_state(member.clone(), auth_middleware)),
        )
        .route(
            "/account",
            get(accounts::list_accounts::<S>)
                .post(accounts::create_account::<S>)
                .route_layer(from_fn_with_state(admin.clone(), auth_middleware)),
        )
        .route(
            "/account/:id",
            get(accounts::get_account::<S>)
                .patch(accounts::update_account::<S>)
                .route_layer(from_fn_with_state(owner, auth_middleware))
                .merge(
                    delete(accounts::delete_account::<S>)
                        .route_layer(from_fn_with_state(admin, auth_middleware)),
                ),
        )
        .route(
            "/transfer",
            post(transfer::transfer::<S>)
                .route_layer(from_fn_with_state(member, auth_middleware)),
        )
}
