//! HTTP handlers, one module per resource.

pub mod cart;
pub mod checkout;
pub mod history;
pub mod orders;

use axum::extract::State;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Serialize;

use crate::SharedState;
use bazaar_core::ValidationError;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health))
        .route("/carts/{shopper_id}", get(cart::get_cart).delete(cart::clear_cart))
        .route("/carts/{shopper_id}/lines", post(cart::add_line))
        .route(
            "/carts/{shopper_id}/lines/{product_id}",
            put(cart::set_quantity).delete(cart::remove_line),
        )
        .route("/checkout/{shopper_id}", post(checkout::checkout))
        .route("/history/buyers/{buyer_id}", get(history::buyer_history))
        .route("/history/sellers/{seller_id}", get(history::seller_history))
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/orders/{order_id}/status", patch(orders::update_status))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let database = state.db.health_check().await;
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
    })
}

/// Shopper and seller ids are opaque but must not be blank.
pub(crate) fn require_party_id(field: &str, id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}
