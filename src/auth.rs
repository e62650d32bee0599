use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    directory,
    error::AppError,
    models::Role,
    store::DocumentStore,
    token::{IdentityClaims, TokenService},
};

/// AuthUser
///
/// The resolved identity of an authenticated request: the verified claim set.
/// Inserted into the request extensions by the gate chain so handlers can read it
/// without verifying the token a second time.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub claims: IdentityClaims,
}

impl AuthUser {
    pub fn email(&self) -> &str {
        &self.claims.email
    }
}

/// Gate
///
/// A single guard evaluated ahead of a handler. Each either lets the request
/// continue or ends it with a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Valid bearer token required, otherwise 401.
    Authenticated,
    /// The authenticated email must resolve to an `admin` user record, otherwise 403.
    Admin,
}

/// Access
///
/// The access level of a route. Each level expands to an ordered list of gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

impl Access {
    pub fn gates(self) -> &'static [Gate] {
        match self {
            Access::Public => &[],
            Access::Authenticated => &[Gate::Authenticated],
            Access::Admin => &[Gate::Authenticated, Gate::Admin],
        }
    }
}

/// require_authenticated
///
/// Extracts the `Authorization: Bearer <token>` credential and verifies it.
pub fn require_authenticated(
    tokens: &TokenService,
    headers: &HeaderMap,
) -> Result<AuthUser, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!("missing authorization header");
            AppError::Unauthenticated
        })?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthenticated)?;

    let claims = tokens.verify(token)?;
    Ok(AuthUser { claims })
}

/// require_admin
///
/// Re-reads the user's role from the directory on every call; the token itself
/// never carries authority.
pub async fn require_admin(store: &dyn DocumentStore, user: &AuthUser) -> Result<(), AppError> {
    match directory::role_of(store, user.email()).await? {
        Some(Role::Admin) => Ok(()),
        Some(_) => {
            tracing::warn!(email = %user.email(), "non-admin user hit an admin route");
            Err(AppError::Forbidden)
        }
        None => {
            tracing::warn!(email = %user.email(), "token email has no user record");
            Err(AppError::Forbidden)
        }
    }
}

/// require_self
///
/// Request-scoped identity check: the authenticated email must equal the email
/// the request targets.
pub fn require_self(user: &AuthUser, email: &str) -> Result<(), AppError> {
    if user.email() != email {
        tracing::warn!(email = %user.email(), target = %email, "identity mismatch");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// authorize
///
/// Runs the gates for `access` in order. The first failure is terminal.
/// Returns the authenticated identity when the chain authenticated one.
pub async fn authorize(
    access: Access,
    tokens: &TokenService,
    store: &dyn DocumentStore,
    headers: &HeaderMap,
) -> Result<Option<AuthUser>, AppError> {
    let mut user: Option<AuthUser> = None;

    for gate in access.gates() {
        match gate {
            Gate::Authenticated => {
                user = Some(require_authenticated(tokens, headers)?);
            }
            Gate::Admin => {
                let authenticated = user.as_ref().ok_or(AppError::Unauthenticated)?;
                require_admin(store, authenticated).await?;
            }
        }
    }

    Ok(user)
}

/// access_gate
///
/// Route-layer middleware wrapping `authorize`. On success the identity is attached
/// to the request and the handler runs; on failure the handler never executes.
pub async fn access_gate(
    access: Access,
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(user) = authorize(access, &state.tokens, state.store.as_ref(), request.headers()).await? {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// AuthUser Extractor Implementation
///
/// Reuses the identity attached by `access_gate` when present, otherwise verifies
/// the bearer token itself. Rejects with 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let tokens = TokenService::from_ref(state);
        require_authenticated(&tokens, &parts.headers)
    }
}
