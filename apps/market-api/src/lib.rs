//! # market-api
//!
//! HTTP surface over the Bazaar checkout engine.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET    /health                                                         │
//! │                                                                         │
//! │  GET    /carts/{shopper_id}                     cart grouped by seller  │
//! │  DELETE /carts/{shopper_id}                     empty the cart          │
//! │  POST   /carts/{shopper_id}/lines               add (merges quantity)   │
//! │  PUT    /carts/{shopper_id}/lines/{product_id}  set quantity (0 drops)  │
//! │  DELETE /carts/{shopper_id}/lines/{product_id}  remove line             │
//! │                                                                         │
//! │  POST   /checkout/{shopper_id}                  one order per seller    │
//! │                                                                         │
//! │  GET    /history/buyers/{buyer_id}              newest first            │
//! │  GET    /history/sellers/{seller_id}            newest first            │
//! │                                                                         │
//! │  GET    /orders/{order_id}                                              │
//! │  PATCH  /orders/{order_id}/status               lifecycle transition    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;

use bazaar_checkout::{CheckoutConfig, CheckoutService};
use bazaar_db::Database;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult, ErrorCode};

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    pub db: Database,
    pub checkout: CheckoutService<Database>,
}

impl AppState {
    pub fn new(db: Database, checkout: CheckoutConfig) -> Self {
        AppState {
            checkout: CheckoutService::new(db.clone(), checkout),
            db,
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Builds the full router over `state`.
pub fn router(state: SharedState) -> Router {
    routes::router().with_state(state)
}
