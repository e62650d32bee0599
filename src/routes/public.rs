use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Public Router Module
///
/// Endpoints reachable without any credential: browsing, first-login user creation,
/// agreement requests and the payment flow.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Liveness banner kept for existing deployment health checks.
        .route("/", get(|| async { "Tenantix server is running" }))
        // GET /health
        .route("/health", get(|| async { "ok" }))
        // POST /jwt
        // Issues a signed identity token for the posted claim set.
        .route("/jwt", post(handlers::issue_token))
        // GET /rooms?page=&size=
        .route("/rooms", get(handlers::get_rooms))
        .route("/roomsCount", get(handlers::get_rooms_count))
        // PATCH /rooms/{id}
        // Availability is flipped by the booking flow itself, so this stays open.
        .route("/rooms/{id}", patch(handlers::update_room_availability))
        .route("/coupons", get(handlers::get_coupons))
        // POST /users
        // Idempotent per email.
        .route("/users", post(handlers::create_user))
        // GET /agreements/{email}/{status}
        // Soft miss: answers `{}` when nothing matches.
        .route(
            "/agreements/{email}/{status}",
            get(handlers::get_agreement),
        )
        .route("/agreements", post(handlers::create_agreement))
        .route(
            "/announcements",
            get(handlers::get_announcements).post(handlers::create_announcement),
        )
        .route(
            "/create-payment-intent",
            post(handlers::create_payment_intent),
        )
        .route("/payments", post(handlers::create_payment))
}
