use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every route here sits behind the `Access::Authenticated` gate chain, so handlers
/// only run for requests carrying a valid bearer token.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/{email}
        // Additionally requires the token email to equal the path email (checked in the handler).
        .route("/users/{email}", get(handlers::get_user))
        // GET /agreements[?email=|?status=]
        .route("/agreements", get(handlers::get_agreements))
        // GET /payments/{email}/{search}
        .route("/payments/{email}/{search}", get(handlers::get_payments))
}
