use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{payment::PaymentError, store::StoreError, token::AuthError};

/// AppError
///
/// Every failure a handler or gate can end a request with. Gate failures are terminal:
/// once one of these is returned no handler logic runs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing, malformed, expired or foreign-signed bearer token.
    #[error("unauthorized access")]
    Unauthenticated,

    /// Authenticated, but the role or identity check failed.
    #[error("forbidden access")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("payment provider failure: {0}")]
    Payment(#[from] PaymentError),

    /// Signing a freshly issued token failed.
    #[error("token signing failure: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for AppError {
    fn from(_: AuthError) -> Self {
        AppError::Unauthenticated
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            // Caller-supplied paging the store refuses is a client error.
            AppError::Store(StoreError::InvalidOptions(_)) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::Duplicate { .. }) => StatusCode::CONFLICT,
            AppError::Store(_) | AppError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Payment(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs; clients only get a generic message.
        let message = match &self {
            AppError::Store(e @ (StoreError::InvalidOptions(_) | StoreError::Duplicate { .. })) => {
                tracing::debug!("rejected store request: {}", e);
                e.to_string()
            }
            AppError::Store(e) => {
                tracing::error!("store error: {:?}", e);
                "internal server error".to_string()
            }
            AppError::Token(e) => {
                tracing::error!("token error: {:?}", e);
                "internal server error".to_string()
            }
            AppError::Payment(e) => {
                tracing::error!("payment error: {:?}", e);
                "payment provider unavailable".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
