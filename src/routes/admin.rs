use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Admin Router Module
///
/// Routes restricted to users whose stored role is `admin`. The whole router is wrapped
/// in the `Access::Admin` gate chain: a valid token first (401), then a live role
/// lookup (403).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin-stats
        // Dashboard counts and availability percentages.
        .route("/admin-stats", get(handlers::get_admin_stats))
        // --- Coupons ---
        .route("/coupons", post(handlers::create_coupon))
        .route(
            "/coupons/{id}",
            patch(handlers::update_coupon_availability).delete(handlers::delete_coupon),
        )
        // --- Users ---
        .route("/members", get(handlers::get_members))
        .route("/users/{email}", patch(handlers::update_user_role))
        // --- Agreements ---
        // PATCH /accept-agreement/{id}
        // Marks the agreement accepted and stamps the acceptance date.
        .route(
            "/accept-agreement/{id}",
            patch(handlers::accept_agreement),
        )
        .route("/agreements/{id}", delete(handlers::delete_agreement))
}
