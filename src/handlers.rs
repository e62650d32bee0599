use crate::{
    AppState,
    auth::{self, AuthUser},
    directory,
    error::{AppError, AppResult},
    models::{
        AgreementLookup, AgreementRequestStatus, AggregateStats, AvailabilityUpdate,
        CountResponse, CreateUserOutcome, DeleteResult, InsertResult, PaymentIntentRequest,
        PaymentIntentResponse, Role, RoleUpdate, TokenResponse, UpdateResult, UserRecord,
    },
    stats,
    store::{Collection, Document, Filter, FindOptions},
    token::IdentityClaims,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;

/// Literal the front-end sends when no payment search term is set.
const NO_SEARCH: &str = "null";

// --- Query Structs ---

/// RoomPage
///
/// Pagination window for `GET /rooms`. Missing values default to zero, which
/// returns every room (a zero limit means no limit).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct RoomPage {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// AgreementFilter
///
/// `email` turns the listing into a "has this user already requested" check;
/// `status` narrows the listing to one status.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct AgreementFilter {
    pub email: Option<String>,
    pub status: Option<String>,
}

fn availability_set(availability: bool) -> Document {
    let mut set = Document::new();
    set.insert("availability".to_string(), Value::Bool(availability));
    set
}

// --- Identity ---

/// issue_token
///
/// [Public Route] Signs an identity token for the posted claim set.
#[utoipa::path(
    post,
    path = "/jwt",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Claim set has no email")
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    Json(body): Json<Document>,
) -> AppResult<Json<TokenResponse>> {
    let claims = IdentityClaims::from_json(body)
        .ok_or_else(|| AppError::BadRequest("claims must include an email".to_string()))?;
    let token = state.tokens.issue(&claims)?;
    tracing::debug!(email = %claims.email, "issued identity token");
    Ok(Json(TokenResponse { token }))
}

// --- Rooms ---

/// get_rooms
///
/// [Public Route] Lists rooms with `skip = page * size`, `limit = size`.
#[utoipa::path(get, path = "/rooms", params(RoomPage), responses((status = 200, description = "Rooms")))]
pub async fn get_rooms(
    State(state): State<AppState>,
    Query(page): Query<RoomPage>,
) -> AppResult<Json<Vec<Document>>> {
    let options = FindOptions::page(page.page.unwrap_or(0), page.size.unwrap_or(0));
    let rooms = state
        .store
        .find(Collection::Rooms, &Filter::all(), options)
        .await?;
    Ok(Json(rooms))
}

/// get_rooms_count
///
/// [Public Route] Total number of rooms, used by the front-end to size its pager.
#[utoipa::path(get, path = "/roomsCount", responses((status = 200, description = "Room count", body = CountResponse)))]
pub async fn get_rooms_count(State(state): State<AppState>) -> AppResult<Json<CountResponse>> {
    let count = state
        .store
        .estimated_document_count(Collection::Rooms)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// update_room_availability
///
/// [Public Route] Flips a room's `availability` flag.
#[utoipa::path(
    patch,
    path = "/rooms/{id}",
    params(("id" = String, Path, description = "Room ID")),
    request_body = AvailabilityUpdate,
    responses((status = 200, description = "Updated", body = UpdateResult))
)]
pub async fn update_room_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AvailabilityUpdate>,
) -> AppResult<Json<UpdateResult>> {
    let result = state
        .store
        .update_one(
            Collection::Rooms,
            &Filter::by_id(&id),
            availability_set(payload.availability),
        )
        .await?;
    Ok(Json(result))
}

// --- Coupons ---

/// get_coupons
///
/// [Public Route] Every coupon, available or not. The client filters by `availability`.
#[utoipa::path(get, path = "/coupons", responses((status = 200, description = "Coupons")))]
pub async fn get_coupons(State(state): State<AppState>) -> AppResult<Json<Vec<Document>>> {
    let coupons = state
        .store
        .find(Collection::Coupons, &Filter::all(), FindOptions::default())
        .await?;
    Ok(Json(coupons))
}

/// create_coupon
///
/// [Admin Route] Stores a new coupon. The body is stored as sent, under a fresh `_id`.
#[utoipa::path(post, path = "/coupons", request_body = serde_json::Value, responses((status = 200, description = "Created", body = InsertResult)))]
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(coupon): Json<Document>,
) -> AppResult<Json<InsertResult>> {
    let result = state.store.insert_one(Collection::Coupons, coupon).await?;
    Ok(Json(result))
}

/// update_coupon_availability
///
/// [Admin Route] Enables or disables a coupon.
#[utoipa::path(
    patch,
    path = "/coupons/{id}",
    params(("id" = String, Path, description = "Coupon ID")),
    request_body = AvailabilityUpdate,
    responses((status = 200, description = "Updated", body = UpdateResult))
)]
pub async fn update_coupon_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AvailabilityUpdate>,
) -> AppResult<Json<UpdateResult>> {
    let result = state
        .store
        .update_one(
            Collection::Coupons,
            &Filter::by_id(&id),
            availability_set(payload.availability),
        )
        .await?;
    Ok(Json(result))
}

/// delete_coupon
///
/// [Admin Route] Removes a coupon. Deleting an unknown ID reports `deletedCount: 0`.
#[utoipa::path(
    delete,
    path = "/coupons/{id}",
    params(("id" = String, Path, description = "Coupon ID")),
    responses((status = 200, description = "Deleted", body = DeleteResult))
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResult>> {
    let result = state
        .store
        .delete_one(Collection::Coupons, &Filter::by_id(&id))
        .await?;
    Ok(Json(result))
}

// --- Users ---

/// get_user
///
/// [Authenticated Route] Returns the caller's own user record (or `null`).
///
/// *Authorization*: the token's email must match the path email, otherwise 403.
#[utoipa::path(
    get,
    path = "/users/{email}",
    params(("email" = String, Path, description = "User email")),
    responses(
        (status = 200, description = "User record"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Token belongs to another user")
    )
)]
pub async fn get_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<Option<Document>>> {
    auth::require_self(&user, &email)?;
    let record = state
        .store
        .find_one(Collection::Users, &Filter::all().eq("email", email.as_str()))
        .await?;
    Ok(Json(record))
}

/// get_members
///
/// [Admin Route] Lists every user whose role is `member`.
#[utoipa::path(get, path = "/members", responses((status = 200, description = "Members")))]
pub async fn get_members(State(state): State<AppState>) -> AppResult<Json<Vec<Document>>> {
    Ok(Json(directory::list_members(state.store.as_ref()).await?))
}

/// create_user
///
/// [Public Route] Saves a user on first login. Idempotent per email.
/// New users always start as `user`; roles only change through the admin route.
#[utoipa::path(post, path = "/users", request_body = serde_json::Value, responses((status = 200, description = "Created or already present")))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<Document>,
) -> AppResult<Json<CreateUserOutcome>> {
    let mut user: UserRecord = serde_json::from_value(Value::Object(body))
        .map_err(|e| AppError::BadRequest(format!("invalid user: {e}")))?;
    user.role = Role::User;
    let outcome = directory::create_user_if_absent(state.store.as_ref(), &user).await?;
    Ok(Json(outcome))
}

/// update_user_role
///
/// [Admin Route] Changes a user's role. Takes effect on the user's next gated request,
/// since the admin gate reads the role live.
#[utoipa::path(
    patch,
    path = "/users/{email}",
    params(("email" = String, Path, description = "User email")),
    request_body = RoleUpdate,
    responses((status = 200, description = "Updated", body = UpdateResult))
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(payload): Json<RoleUpdate>,
) -> AppResult<Json<UpdateResult>> {
    let result = directory::set_role(state.store.as_ref(), &email, payload.role).await?;
    tracing::info!(email = %email, role = payload.role.as_str(), "changed user role");
    Ok(Json(result))
}

// --- Agreements ---

/// get_agreements
///
/// [Authenticated Route] With `?email=` answers `{ isRequested }`; with `?status=`
/// lists agreements in that status; otherwise lists all agreements.
#[utoipa::path(
    get,
    path = "/agreements",
    params(AgreementFilter),
    responses((status = 200, description = "Agreements or request status"))
)]
pub async fn get_agreements(
    State(state): State<AppState>,
    Query(filter): Query<AgreementFilter>,
) -> AppResult<Response> {
    if let Some(email) = filter.email.filter(|e| !e.is_empty()) {
        let existing = state
            .store
            .find_one(
                Collection::Agreements,
                &Filter::all().eq("user_email", email.as_str()),
            )
            .await?;
        let status = AgreementRequestStatus {
            is_requested: existing.is_some(),
        };
        return Ok(Json(status).into_response());
    }

    let query = match filter.status.filter(|s| !s.is_empty()) {
        Some(status) => Filter::all().eq("status", status.as_str()),
        None => Filter::all(),
    };
    let agreements = state
        .store
        .find(Collection::Agreements, &query, FindOptions::default())
        .await?;
    Ok(Json(agreements).into_response())
}

/// get_agreement
///
/// [Public Route] Composite-key lookup. A miss answers `{}` with 200, never 404.
#[utoipa::path(
    get,
    path = "/agreements/{email}/{status}",
    params(
        ("email" = String, Path, description = "Tenant email"),
        ("status" = String, Path, description = "Agreement status")
    ),
    responses((status = 200, description = "Agreement, or an empty object"))
)]
pub async fn get_agreement(
    State(state): State<AppState>,
    Path((email, status)): Path<(String, String)>,
) -> AppResult<Json<AgreementLookup>> {
    let filter = Filter::all()
        .eq("user_email", email.as_str())
        .eq("status", status.as_str());
    let lookup = match state.store.find_one(Collection::Agreements, &filter).await? {
        Some(doc) => AgreementLookup::Found(doc),
        None => AgreementLookup::Absent,
    };
    Ok(Json(lookup))
}

/// create_agreement
///
/// [Public Route] Records an agreement request. A missing `status` defaults to `pending`.
#[utoipa::path(post, path = "/agreements", request_body = serde_json::Value, responses((status = 200, description = "Created", body = InsertResult)))]
pub async fn create_agreement(
    State(state): State<AppState>,
    Json(mut agreement): Json<Document>,
) -> AppResult<Json<InsertResult>> {
    agreement
        .entry("status")
        .or_insert_with(|| Value::String("pending".to_string()));
    let result = state
        .store
        .insert_one(Collection::Agreements, agreement)
        .await?;
    Ok(Json(result))
}

/// accept_agreement
///
/// [Admin Route] Marks an agreement accepted and stamps `accepted_date` (UTC, RFC 3339).
#[utoipa::path(
    patch,
    path = "/accept-agreement/{id}",
    params(("id" = String, Path, description = "Agreement ID")),
    responses((status = 200, description = "Accepted", body = UpdateResult))
)]
pub async fn accept_agreement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UpdateResult>> {
    let mut set = Document::new();
    set.insert("status".to_string(), Value::String("accepted".to_string()));
    set.insert(
        "accepted_date".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
    let result = state
        .store
        .update_one(Collection::Agreements, &Filter::by_id(&id), set)
        .await?;
    tracing::info!(agreement = %id, matched = result.matched_count, "accepted agreement");
    Ok(Json(result))
}

/// delete_agreement
///
/// [Admin Route] Removes an agreement request, typically after rejecting it.
#[utoipa::path(
    delete,
    path = "/agreements/{id}",
    params(("id" = String, Path, description = "Agreement ID")),
    responses((status = 200, description = "Deleted", body = DeleteResult))
)]
pub async fn delete_agreement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResult>> {
    let result = state
        .store
        .delete_one(Collection::Agreements, &Filter::by_id(&id))
        .await?;
    Ok(Json(result))
}

// --- Announcements ---

/// get_announcements
///
/// [Public Route] Lists announcements in the order they were posted.
#[utoipa::path(get, path = "/announcements", responses((status = 200, description = "Announcements")))]
pub async fn get_announcements(State(state): State<AppState>) -> AppResult<Json<Vec<Document>>> {
    let announcements = state
        .store
        .find(
            Collection::Announcements,
            &Filter::all(),
            FindOptions::default(),
        )
        .await?;
    Ok(Json(announcements))
}

/// create_announcement
///
/// [Public Route] Posts an announcement. The body is stored as sent.
#[utoipa::path(post, path = "/announcements", request_body = serde_json::Value, responses((status = 200, description = "Created", body = InsertResult)))]
pub async fn create_announcement(
    State(state): State<AppState>,
    Json(announcement): Json<Document>,
) -> AppResult<Json<InsertResult>> {
    let result = state
        .store
        .insert_one(Collection::Announcements, announcement)
        .await?;
    Ok(Json(result))
}

// --- Dashboard ---

/// get_admin_stats
///
/// [Admin Route] Fresh dashboard counts and availability percentages.
#[utoipa::path(
    get,
    path = "/admin-stats",
    responses(
        (status = 200, description = "Stats", body = AggregateStats),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_admin_stats(State(state): State<AppState>) -> AppResult<Json<AggregateStats>> {
    Ok(Json(stats::compute_admin_stats(state.store.as_ref()).await?))
}

// --- Payments ---

/// create_payment_intent
///
/// [Public Route] Converts `price` to minor units and delegates to the payment provider.
#[utoipa::path(
    post,
    path = "/create-payment-intent",
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Intent created", body = PaymentIntentResponse),
        (status = 400, description = "Invalid price"),
        (status = 502, description = "Provider failure")
    )
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(payload): Json<PaymentIntentRequest>,
) -> AppResult<Json<PaymentIntentResponse>> {
    if !payload.price.is_finite() || payload.price <= 0.0 {
        return Err(AppError::BadRequest(
            "price must be a positive number".to_string(),
        ));
    }
    let amount = (payload.price * 100.0) as i64;

    let client_secret = state
        .payments
        .create_payment_intent(amount, &state.config.currency)
        .await?;
    Ok(Json(PaymentIntentResponse { client_secret }))
}

/// create_payment
///
/// [Public Route] Records a completed payment in the tenant's history once the
/// provider has confirmed it client-side.
#[utoipa::path(post, path = "/payments", request_body = serde_json::Value, responses((status = 200, description = "Recorded", body = InsertResult)))]
pub async fn create_payment(
    State(state): State<AppState>,
    Json(payment): Json<Document>,
) -> AppResult<Json<InsertResult>> {
    let result = state.store.insert_one(Collection::Payments, payment).await?;
    Ok(Json(result))
}

/// get_payments
///
/// [Authenticated Route] Payment history for `email`, optionally narrowed by a
/// case-insensitive substring match on `month`. The literal `null` disables the search.
#[utoipa::path(
    get,
    path = "/payments/{email}/{search}",
    params(
        ("email" = String, Path, description = "Payer email"),
        ("search" = String, Path, description = "Month search term, or `null`")
    ),
    responses((status = 200, description = "Payments"))
)]
pub async fn get_payments(
    State(state): State<AppState>,
    Path((email, search)): Path<(String, String)>,
) -> AppResult<Json<Vec<Document>>> {
    let mut filter = Filter::all().eq("email", email.as_str());
    if search != NO_SEARCH {
        filter = filter.contains_ignore_case("month", &search);
    }
    let payments = state
        .store
        .find(Collection::Payments, &filter, FindOptions::default())
        .await?;
    Ok(Json(payments))
}

