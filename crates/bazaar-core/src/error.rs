//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors                                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  bazaar-checkout errors                                                │
//! │  └── CheckoutError    - Per-checkout failure kinds                     │
//! │                                                                         │
//! │  market-api errors                                                     │
//! │  └── ApiError         - What clients see (serialized)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product, order ID, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::checkout::CheckoutStage;
use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Product cannot be found.
    ///
    /// ## When This Occurs
    /// - A cart line references a product removed from the catalog
    /// - Adding an unknown product ID to a cart
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Requested quantity exceeds the stock ledger.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (cart: 5 × Honey Jar)
    ///      │
    ///      ▼
    /// Stock Validator: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Honey Jar", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Item "Honey Jar" has only 3 left in stock."
    /// ```
    #[error("Item \"{product}\" has only {available} left in stock (requested {requested})")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Order status change is not allowed by the lifecycle.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidOrderStatus {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Checkout state machine was driven out of order.
    #[error("Illegal checkout transition: {from} -> {to}")]
    IllegalTransition {
        from: CheckoutStage,
        to: CheckoutStage,
    },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// An order total does not fit in i64 cents.
    ///
    /// ## When This Occurs
    /// Only for products priced outside [`crate::MAX_PRICE_CENTS`], which
    /// validation and the schema reject; drafting reports it instead of
    /// wrapping or panicking.
    #[error("Order total for seller {seller_id} is too large")]
    TotalOverflow { seller_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product: "Honey Jar".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Item \"Honey Jar\" has only 3 left in stock (requested 5)"
        );
    }

    #[test]
    fn test_invalid_status_message() {
        let err = CoreError::InvalidOrderStatus {
            order_id: "o-1".to_string(),
            from: OrderStatus::Completed,
            to: OrderStatus::Pending,
        };
        assert_eq!(err.to_string(), "Order o-1 cannot move from completed to pending");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "product_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
