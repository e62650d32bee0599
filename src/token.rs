use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tokens are valid for this many days after issuance.
pub const TOKEN_VALIDITY_DAYS: i64 = 10;

/// Claim names owned by the token service; caller-supplied values are discarded.
const RESERVED_CLAIMS: [&str; 2] = ["iat", "exp"];

/// IdentityClaims
///
/// The caller-visible claim set carried inside an identity token. `email` is mandatory;
/// any other attribute supplied at login is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentityClaims {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            extra: Map::new(),
        }
    }

    /// Builds a claim set from an arbitrary JSON object, requiring a string `email`.
    pub fn from_json(mut body: Map<String, Value>) -> Option<Self> {
        let email = match body.remove("email") {
            Some(Value::String(email)) if !email.is_empty() => email,
            _ => return None,
        };
        for reserved in RESERVED_CLAIMS {
            body.remove(reserved);
        }
        Some(Self { email, extra: body })
    }
}

/// Claims
///
/// The signed payload: the identity claims plus the timing claims the token service
/// controls. Serialized flat, so `email` sits next to `iat` and `exp`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub identity: IdentityClaims,
    /// Issued At, seconds since the epoch.
    pub iat: u64,
    /// Expiration Time, seconds since the epoch.
    pub exp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Malformed, signed with another key, or expired.
    #[error("invalid identity token")]
    Invalid,
}

/// TokenService
///
/// Issues and verifies HS256-signed identity tokens with the server-held secret.
/// Stateless: nothing is persisted and there is no revocation list.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validity: Duration::days(TOKEN_VALIDITY_DAYS),
        }
    }

    /// Signs a token for `claims`, valid from now for the fixed window.
    pub fn issue(&self, claims: &IdentityClaims) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(claims, Utc::now())
    }

    /// Signs a token as if it had been issued at `issued_at`.
    pub fn issue_at(
        &self,
        claims: &IdentityClaims,
        issued_at: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let mut identity = claims.clone();
        for reserved in RESERVED_CLAIMS {
            identity.extra.remove(reserved);
        }

        let iat = issued_at.timestamp().max(0) as u64;
        let exp = (issued_at + self.validity).timestamp().max(0) as u64;

        let payload = Claims { identity, iat, exp };
        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
    }

    /// Validates signature and expiry, returning the identity claims on success.
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims.identity),
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                    ErrorKind::InvalidSignature => tracing::warn!("rejected token with bad signature"),
                    other => tracing::debug!("rejected malformed token: {:?}", other),
                }
                Err(AuthError::Invalid)
            }
        }
    }
}
