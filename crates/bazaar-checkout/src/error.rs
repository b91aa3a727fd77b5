//! # Checkout Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  StoreError     what a CheckoutStore call can fail with                 │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  CheckoutError  the failure kind reported in a CheckoutOutcome          │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  ApiError       (market-api) code + message for clients                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::CoreError;
use bazaar_db::DbError;
use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Store Error
// =============================================================================

/// Failures of the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A conditional stock decrement matched no row; the order was rolled back.
    #[error("Stock changed concurrently for product {product_id}")]
    StockConflict { product_id: String },

    /// Anything else the backend reported.
    #[error("Storage backend failed: {0}")]
    Backend(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::StockConflict { product_id } => StoreError::StockConflict { product_id },
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Result type for storage calls.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Checkout Error
// =============================================================================

/// Why a checkout (or part of it) failed.
///
/// Serialized into checkout reports as `{ "kind": "insufficient_stock", ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutError {
    /// The shopper has no cart or the cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line points at a product that no longer exists.
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// Validation found a line asking for more than the ledger holds.
    ///
    /// ## When This Occurs
    /// ```text
    /// cart: 2 × Sourdough     ledger: 1 × Sourdough
    ///            └──────────────┬──────────┘
    ///                           ▼
    /// Item "Sourdough" has only 1 left in stock.
    /// ```
    #[error("Item \"{product}\" has only {available} left in stock.")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Validation passed but a concurrent checkout took the stock before the
    /// conditional decrement ran.
    #[error("Stock for product {product_id} was taken by another checkout")]
    StockRaceLost { product_id: String },

    /// A seller's order total does not fit in i64 cents.
    #[error("Order total for seller {seller_id} is too large")]
    TotalOverflow { seller_id: String },

    /// Writing a seller's order failed; that seller's transaction rolled back.
    #[error("Failed to save order for seller {seller_id}: {message}")]
    OrderPersistenceFailure { seller_id: String, message: String },

    /// The request deadline passed before checkout finished.
    #[error("Checkout timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Loading the cart or clearing purchased lines failed.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// The orchestrator was driven through an illegal stage transition.
    #[error("Internal checkout error: {message}")]
    Internal { message: String },
}

impl CheckoutError {
    /// Stable machine-readable code (SCREAMING_SNAKE_CASE).
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "EMPTY_CART",
            CheckoutError::ProductNotFound { .. } => "PRODUCT_NOT_FOUND",
            CheckoutError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CheckoutError::StockRaceLost { .. } => "STOCK_RACE_LOST",
            CheckoutError::TotalOverflow { .. } => "TOTAL_OVERFLOW",
            CheckoutError::OrderPersistenceFailure { .. } => "ORDER_PERSISTENCE_FAILURE",
            CheckoutError::Timeout { .. } => "TIMEOUT",
            CheckoutError::Storage { .. } => "STORAGE_ERROR",
            CheckoutError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same cart later may succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::StockRaceLost { .. }
                | CheckoutError::OrderPersistenceFailure { .. }
                | CheckoutError::Timeout { .. }
                | CheckoutError::Storage { .. }
        )
    }

    pub(crate) fn storage(err: StoreError) -> Self {
        CheckoutError::Storage {
            message: err.to_string(),
        }
    }

    /// Maps a failed order placement for `seller_id`.
    pub(crate) fn commit(seller_id: &str, err: StoreError) -> Self {
        match err {
            StoreError::StockConflict { product_id } => CheckoutError::StockRaceLost { product_id },
            StoreError::Backend(message) => CheckoutError::OrderPersistenceFailure {
                seller_id: seller_id.to_string(),
                message,
            },
        }
    }
}

impl From<CoreError> for CheckoutError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                product,
                available,
                requested,
            } => CheckoutError::InsufficientStock {
                product,
                available,
                requested,
            },
            CoreError::ProductNotFound(product_id) => CheckoutError::ProductNotFound { product_id },
            CoreError::TotalOverflow { seller_id } => CheckoutError::TotalOverflow { seller_id },
            other => CheckoutError::Internal {
                message: other.to_string(),
            },
        }
    }
}
