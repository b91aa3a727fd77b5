//! Order lookup and status handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::SharedState;
use bazaar_core::validation::validate_id;
use bazaar_core::{Order, OrderStatus, PlacedOrder};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Parsed leniently: `"Confirmed"` and `" confirmed "` both work.
    pub status: String,
}

pub async fn get_order(
    State(state): State<SharedState>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<PlacedOrder>> {
    validate_id("order_id", &order_id)?;

    state
        .db
        .orders()
        .get_placed(&order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Order", &order_id))
}

pub async fn update_status(
    State(state): State<SharedState>,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Order>> {
    validate_id("order_id", &order_id)?;
    let next: OrderStatus = req.status.parse()?;

    let order = state.db.orders().update_status(&order_id, next).await?;
    tracing::info!(order_id = %order.id, status = %order.status, "Order status updated");

    Ok(Json(order))
}
