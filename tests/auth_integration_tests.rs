use axum::{
    Router,
    body::Body,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri, header, request::Parts},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tenantix_api::{
    AppConfig, AppState, MemoryDocumentStore, MockPaymentGateway, create_router,
    auth::{self, Access, AuthUser},
    error::AppError,
    store::{Collection, Document, DocumentStore},
    token::{IdentityClaims, TokenService},
};
use tower::ServiceExt;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const ADMIN_EMAIL: &str = "admin@tenantix.io";
const TENANT_EMAIL: &str = "tenant@tenantix.io";
const MEMBER_EMAIL: &str = "member@tenantix.io";

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn create_app_state(store: Arc<MemoryDocumentStore>) -> AppState {
    let mut config = AppConfig::default();
    config.jwt_secret = TEST_JWT_SECRET.to_string();
    AppState::new(store, Arc::new(MockPaymentGateway::new()), config)
}

async fn seeded_store() -> Arc<MemoryDocumentStore> {
    let store = Arc::new(MemoryDocumentStore::new());
    for (email, role) in [
        (ADMIN_EMAIL, "admin"),
        (TENANT_EMAIL, "user"),
        (MEMBER_EMAIL, "member"),
    ] {
        store
            .insert_one(Collection::Users, doc(json!({ "email": email, "role": role })))
            .await
            .unwrap();
    }
    store
}

fn token_for(email: &str) -> String {
    TokenService::new(TEST_JWT_SECRET)
        .issue(&IdentityClaims::new(email))
        .unwrap()
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

/// Helper to get the Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_extractor_success_with_valid_jwt() {
    let app_state = create_app_state(seeded_store().await);
    let token = token_for(TENANT_EMAIL);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    let user = auth_user.unwrap();
    assert_eq!(user.email(), TENANT_EMAIL);
}

#[tokio::test]
async fn test_extractor_failure_with_missing_header() {
    let app_state = create_app_state(seeded_store().await);
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_extractor_rejects_non_bearer_scheme() {
    let app_state = create_app_state(seeded_store().await);
    let token = token_for(TENANT_EMAIL);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {}", token)).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_extractor_reuses_identity_attached_by_gate() {
    let app_state = create_app_state(seeded_store().await);
    let attached = AuthUser {
        claims: IdentityClaims::new(MEMBER_EMAIL),
    };

    // No Authorization header at all: the attached identity must be used as-is.
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.extensions.insert(attached.clone());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap(), attached);
}

// --- Gate Chain Tests ---

#[tokio::test]
async fn test_public_access_runs_no_gates() {
    let state = create_app_state(seeded_store().await);

    let user = auth::authorize(Access::Public, &state.tokens, state.store.as_ref(), &HeaderMap::new())
        .await
        .unwrap();

    assert!(user.is_none());
}

#[tokio::test]
async fn test_admin_access_checks_token_before_role() {
    let state = create_app_state(seeded_store().await);

    let result =
        auth::authorize(Access::Admin, &state.tokens, state.store.as_ref(), &HeaderMap::new()).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_admin_access_forbids_user_and_member_roles() {
    let state = create_app_state(seeded_store().await);

    for email in [TENANT_EMAIL, MEMBER_EMAIL] {
        let result = auth::authorize(
            Access::Admin,
            &state.tokens,
            state.store.as_ref(),
            &bearer(&token_for(email)),
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden)), "{email} must be forbidden");
    }
}

#[tokio::test]
async fn test_admin_access_forbids_unknown_email() {
    let state = create_app_state(seeded_store().await);

    let result = auth::authorize(
        Access::Admin,
        &state.tokens,
        state.store.as_ref(),
        &bearer(&token_for("ghost@tenantix.io")),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden)));
}

#[tokio::test]
async fn test_admin_access_allows_admin() {
    let state = create_app_state(seeded_store().await);

    let user = auth::authorize(
        Access::Admin,
        &state.tokens,
        state.store.as_ref(),
        &bearer(&token_for(ADMIN_EMAIL)),
    )
    .await
    .unwrap();

    assert_eq!(user.unwrap().email(), ADMIN_EMAIL);
}

#[tokio::test]
async fn test_unrecognised_stored_role_is_not_admin() {
    let store = seeded_store().await;
    store
        .insert_one(
            Collection::Users,
            doc(json!({ "email": "odd@tenantix.io", "role": "superuser" })),
        )
        .await
        .unwrap();
    let state = create_app_state(store);

    let result = auth::authorize(
        Access::Admin,
        &state.tokens,
        state.store.as_ref(),
        &bearer(&token_for("odd@tenantix.io")),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden)));
}

#[test]
fn test_require_self_rejects_other_email() {
    let user = AuthUser {
        claims: IdentityClaims::new(TENANT_EMAIL),
    };

    assert!(auth::require_self(&user, TENANT_EMAIL).is_ok());
    assert!(matches!(
        auth::require_self(&user, MEMBER_EMAIL),
        Err(AppError::Forbidden)
    ));
}

// --- Router-Level Tests ---

#[tokio::test]
async fn test_gated_routes_without_header_return_401() {
    let app = create_router(create_app_state(seeded_store().await));

    let gated = [
        (Method::GET, "/admin-stats"),
        (Method::GET, "/members"),
        (Method::GET, "/agreements"),
        (Method::GET, "/users/tenant@tenantix.io"),
        (Method::GET, "/payments/tenant@tenantix.io/null"),
        (Method::POST, "/coupons"),
        (Method::PATCH, "/coupons/abc"),
        (Method::DELETE, "/coupons/abc"),
        (Method::PATCH, "/users/tenant@tenantix.io"),
        (Method::PATCH, "/accept-agreement/abc"),
        (Method::DELETE, "/agreements/abc"),
    ];

    for (method, uri) in gated {
        let (status, body) = send(&app, method.clone(), uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["message"], "unauthorized access");
    }
}

#[tokio::test]
async fn test_invalid_token_returns_401() {
    let app = create_router(create_app_state(seeded_store().await));
    let forged = TokenService::new("attacker-secret")
        .issue(&IdentityClaims::new(ADMIN_EMAIL))
        .unwrap();

    let (status, _) = send(&app, Method::GET, "/admin-stats", Some(&forged)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_route_returns_403_for_non_admin() {
    let app = create_router(create_app_state(seeded_store().await));

    let (status, body) = send(&app, Method::GET, "/admin-stats", Some(&token_for(TENANT_EMAIL))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "forbidden access");
}

#[tokio::test]
async fn test_admin_route_succeeds_for_admin() {
    let app = create_router(create_app_state(seeded_store().await));

    let (status, body) = send(&app, Method::GET, "/admin-stats", Some(&token_for(ADMIN_EMAIL))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_users"], 1);
    assert_eq!(body["total_members"], 1);
}

#[tokio::test]
async fn test_role_is_rechecked_live_on_every_request() {
    let store = seeded_store().await;
    let app = create_router(create_app_state(store.clone()));
    let tenant_token = token_for(TENANT_EMAIL);

    let (before, _) = send(&app, Method::GET, "/members", Some(&tenant_token)).await;
    assert_eq!(before, StatusCode::FORBIDDEN);

    promote_to_admin(&store, TENANT_EMAIL).await;

    // Same token, new role.
    let (after, _) = send(&app, Method::GET, "/members", Some(&tenant_token)).await;
    assert_eq!(after, StatusCode::OK);
}

async fn promote_to_admin(store: &MemoryDocumentStore, email: &str) {
    tenantix_api::directory::set_role(store, email, tenantix_api::models::Role::Admin)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_self_lookup_with_other_users_token_returns_403() {
    let app = create_router(create_app_state(seeded_store().await));

    let (status, _) = send(
        &app,
        Method::GET,
        "/users/member@tenantix.io",
        Some(&token_for(TENANT_EMAIL)),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_self_lookup_with_own_token_returns_record() {
    let app = create_router(create_app_state(seeded_store().await));

    let (status, body) = send(
        &app,
        Method::GET,
        "/users/tenant@tenantix.io",
        Some(&token_for(TENANT_EMAIL)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], TENANT_EMAIL);
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn test_admin_token_does_not_bypass_self_match() {
    let app = create_router(create_app_state(seeded_store().await));

    let (status, _) = send(
        &app,
        Method::GET,
        "/users/tenant@tenantix.io",
        Some(&token_for(ADMIN_EMAIL)),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let app = create_router(create_app_state(seeded_store().await));

    let (status, body) = send(&app, Method::GET, "/roomsCount", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}
