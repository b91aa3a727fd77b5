//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Market API                         │
//! │                                                                         │
//! │  Handler  Result<Json<T>, ApiError>                                     │
//! │     │                                                                   │
//! │     ├── DbError ───────────┐                                            │
//! │     ├── CoreError ─────────┤                                            │
//! │     ├── ValidationError ───┼──► ApiError { code, message } ──► status   │
//! │     └── CheckoutError ─────┘                                            │
//! │                                                                         │
//! │  Storage details are logged, clients only see a generic message.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Response Body
//! ```json
//! { "code": "NOT_FOUND", "message": "Cart not found: 4b1e..." }
//! ```
//!
//! Checkout failures also carry `"retryable"`: whether the same cart may go
//! through if the client simply tries again.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use bazaar_checkout::CheckoutError;
use bazaar_core::{CoreError, ValidationError};
use bazaar_db::DbError;

/// API error returned from handlers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Set for checkout failures only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Cart has no lines to check out (400)
    EmptyCart,

    /// Cart or line limits exceeded (422)
    CartError,

    /// Order lifecycle violated (409)
    InvalidStatus,

    /// Not enough stock, or another checkout took it first (409)
    InsufficientStock,

    /// Checkout ran past its deadline (504)
    Timeout,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError | ErrorCode::EmptyCart => StatusCode::BAD_REQUEST,
            ErrorCode::CartError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InvalidStatus | ErrorCode::InsufficientStock => StatusCode::CONFLICT,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            retryable: None,
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::Domain(e) => e.into(),
            DbError::UniqueViolation { field, value } => ApiError::validation(format!(
                "{} '{}' already exists",
                field, value
            )),
            DbError::StockConflict { product_id } => ApiError::new(
                ErrorCode::InsufficientStock,
                format!("Stock changed concurrently for product {}", product_id),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            CoreError::InvalidOrderStatus { .. } => {
                ApiError::new(ErrorCode::InvalidStatus, err.to_string())
            }
            CoreError::CartTooLarge { .. } => ApiError::new(ErrorCode::CartError, err.to_string()),
            CoreError::QuantityTooLarge { .. } => ApiError::validation(err.to_string()),
            CoreError::TotalOverflow { .. } => ApiError::new(ErrorCode::CartError, err.to_string()),
            CoreError::IllegalTransition { .. } => {
                tracing::error!("Checkout stage machine misuse: {}", err);
                ApiError::internal("Checkout failed")
            }
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Maps the failure of a checkout that committed nothing.
impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        let retryable = Some(err.is_retryable());
        let code = match &err {
            CheckoutError::EmptyCart => ErrorCode::EmptyCart,
            CheckoutError::ProductNotFound { .. } => ErrorCode::NotFound,
            CheckoutError::InsufficientStock { .. } | CheckoutError::StockRaceLost { .. } => {
                ErrorCode::InsufficientStock
            }
            CheckoutError::TotalOverflow { .. } => ErrorCode::CartError,
            CheckoutError::Timeout { .. } => ErrorCode::Timeout,
            CheckoutError::OrderPersistenceFailure { .. } | CheckoutError::Storage { .. } => {
                tracing::error!("Checkout storage failure: {}", err);
                return ApiError {
                    retryable,
                    ..ApiError::new(ErrorCode::DatabaseError, "Failed to save order")
                };
            }
            CheckoutError::Internal { .. } => {
                tracing::error!("Checkout internal failure: {}", err);
                return ApiError {
                    retryable,
                    ..ApiError::internal("Checkout failed")
                };
            }
        };
        ApiError {
            retryable,
            ..ApiError::new(code, err.to_string())
        }
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
