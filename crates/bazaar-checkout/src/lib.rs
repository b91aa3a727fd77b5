//! # bazaar-checkout: Checkout Orchestrator
//!
//! Turns a shopper's multi-seller cart into one order per seller.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  market-api  POST /checkout/{shopper_id}                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              bazaar-checkout (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   CheckoutService<S: CheckoutStore>                             │   │
//! │  │     ├── bazaar-core: validate_stock, split_by_seller,          │   │
//! │  │     │                OrderDraft, CheckoutRun                    │   │
//! │  │     └── S: cart_lines, product, place_order, delete_cart_lines │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  bazaar-db Database (one SQLite transaction per seller)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//! - No overselling: stock is decremented by a conditional update inside
//!   the seller's order transaction.
//! - No orphaned orders: an order, its lines, both history records and its
//!   stock decrements commit together or not at all.
//! - Partial success is explicit: sellers committed before a failure stay
//!   committed and are reported alongside the failing seller and error.
//!
//! ## Usage
//! ```rust,ignore
//! use bazaar_checkout::{CheckoutConfig, CheckoutService};
//!
//! let service = CheckoutService::new(db.clone(), CheckoutConfig::default());
//! let outcome = service.checkout(&shopper_id).await;
//! ```

pub mod error;
pub mod service;
pub mod store;

pub use error::{CheckoutError, StoreError, StoreResult};
pub use service::{CheckoutConfig, CheckoutOutcome, CheckoutService, DEFAULT_CHECKOUT_TIMEOUT};
pub use store::{CheckoutStore, StoredCart, StoredCartLine};

pub use bazaar_core::checkout::{CheckoutPolicy, CheckoutStage};
