use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payment;
pub mod stats;
pub mod store;
pub mod token;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::Access;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use payment::{MockPaymentGateway, PaymentState, StripeGateway};
pub use store::{MemoryDocumentStore, PostgresDocumentStore, StoreState};
pub use token::TokenService;

/// ApiDoc
///
/// OpenAPI document aggregated from every `#[utoipa::path]` handler, served at
/// `/api-docs/openapi.json` and browsable through the Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::issue_token, handlers::get_rooms, handlers::get_rooms_count,
        handlers::update_room_availability, handlers::get_coupons, handlers::create_coupon,
        handlers::update_coupon_availability, handlers::delete_coupon, handlers::get_user,
        handlers::get_members, handlers::create_user, handlers::update_user_role,
        handlers::get_agreements, handlers::get_agreement, handlers::create_agreement,
        handlers::accept_agreement, handlers::delete_agreement, handlers::get_announcements,
        handlers::create_announcement, handlers::get_admin_stats,
        handlers::create_payment_intent, handlers::create_payment, handlers::get_payments
    ),
    components(
        schemas(
            models::Role, models::InsertResult, models::UpdateResult, models::DeleteResult,
            models::AvailabilityUpdate, models::RoleUpdate, models::PaymentIntentRequest,
            models::PaymentIntentResponse, models::TokenResponse, models::CountResponse,
            models::AgreementRequestStatus, models::AggregateStats,
        )
    ),
    tags(
        (name = "tenantix", description = "Tenantix rental management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of every long-lived dependency. Built once in `main`
/// (or in a test) and cloned cheaply into each request.
#[derive(Clone)]
pub struct AppState {
    /// The one document-store handle opened at startup.
    pub store: StoreState,
    /// External payment provider.
    pub payments: PaymentState,
    /// Identity token signer/verifier, keyed with the configured secret.
    pub tokens: TokenService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: StoreState, payments: PaymentState, config: AppConfig) -> Self {
        Self {
            store,
            payments,
            tokens: TokenService::new(&config.jwt_secret),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for StoreState {
    fn from_ref(app_state: &AppState) -> StoreState {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for PaymentState {
    fn from_ref(app_state: &AppState) -> PaymentState {
        app_state.payments.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// gated
///
/// Wraps every route of `router` in the gate chain for `access`. Every route group
/// goes through here, including the public one whose chain is empty.
fn gated(router: Router<AppState>, access: Access, state: &AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        state.clone(),
        move |state: State<AppState>, request: Request, next: Next| {
            auth::access_gate(access, state, request, next)
        },
    ))
}

/// create_router
///
/// Assembles the routing table, applies the per-group gate chains and the global
/// observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(gated(public::public_routes(), Access::Public, &state))
        .merge(gated(
            authenticated::authenticated_routes(),
            Access::Authenticated,
            &state,
        ))
        .merge(gated(admin::admin_routes(), Access::Admin, &state))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` set above so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
