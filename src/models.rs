use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::store::Document;

// --- Core Records (Mapped to Collections) ---

/// Role
///
/// The RBAC attribute of a user record. Only `admin` passes the admin gate;
/// `member` marks a tenant with an accepted agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Member,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

/// UserRecord
///
/// A stored user. `email` is the unique key and `role` the only attribute the
/// authorization gates read; every other profile field is carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Role,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

/// Unknown or malformed stored roles never grant anything; they read as `user`.
fn lenient_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Role, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw.clone()).unwrap_or_else(|_| {
        tracing::warn!("unrecognised stored role {}, treating as user", raw);
        Role::User
    }))
}

// --- Write Outcomes ---

/// InsertResult
///
/// Returned by every create endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: String,
}

impl InsertResult {
    pub fn new(inserted_id: String) -> Self {
        Self {
            acknowledged: true,
            inserted_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateResult {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            matched_count,
            modified_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self { deleted_count }
    }
}

/// CreateUserOutcome
///
/// User creation is idempotent: a second insert for the same email reports
/// `AlreadyExists` (with a null `insertedId`) instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CreateUserOutcome {
    Created(InsertResult),
    AlreadyExists {
        message: String,
        #[serde(rename = "insertedId")]
        inserted_id: Option<String>,
    },
}

impl CreateUserOutcome {
    pub fn already_exists() -> Self {
        CreateUserOutcome::AlreadyExists {
            message: "User already exist".to_string(),
            inserted_id: None,
        }
    }
}

/// AgreementLookup
///
/// Result of the composite-key agreement lookup. A miss is still a success:
/// `Absent` serializes to `{}` rather than producing a 404.
#[derive(Debug, Clone, PartialEq)]
pub enum AgreementLookup {
    Found(Document),
    Absent,
}

impl Serialize for AgreementLookup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AgreementLookup::Found(doc) => doc.serialize(serializer),
            AgreementLookup::Absent => Map::new().serialize(serializer),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// Body of `PATCH /rooms/{id}` and `PATCH /coupons/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AvailabilityUpdate {
    pub availability: bool,
}

/// Body of `PATCH /users/{email}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RoleUpdate {
    pub role: Role,
}

/// Body of `POST /create-payment-intent`; `price` is in major currency units.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PaymentIntentRequest {
    pub price: f64,
}

// --- Response Schemas (Output) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CountResponse {
    pub count: u64,
}

/// Response of `GET /agreements?email=...`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AgreementRequestStatus {
    pub is_requested: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

/// AggregateStats
///
/// Admin dashboard snapshot, recomputed on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AggregateStats {
    pub total_rooms: u64,
    pub total_users: u64,
    pub total_members: u64,
    #[serde(rename = "percentOfAvailable")]
    pub percent_of_available: f64,
    #[serde(rename = "percentOfUnavailable")]
    pub percent_of_unavailable: f64,
}
