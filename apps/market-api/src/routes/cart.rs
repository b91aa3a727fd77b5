//! Cart handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::require_party_id;
use crate::error::ApiResult;
use crate::SharedState;
use bazaar_core::cart::CartView;
use bazaar_core::validation::validate_id;
use bazaar_core::CartLine;

#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub removed: u64,
}

pub async fn get_cart(
    State(state): State<SharedState>,
    Path(shopper_id): Path<String>,
) -> ApiResult<Json<CartView>> {
    require_party_id("shopper_id", &shopper_id)?;
    Ok(Json(state.db.carts().view(&shopper_id).await?))
}

pub async fn add_line(
    State(state): State<SharedState>,
    Path(shopper_id): Path<String>,
    Json(req): Json<AddLineRequest>,
) -> ApiResult<(StatusCode, Json<CartLine>)> {
    require_party_id("shopper_id", &shopper_id)?;
    validate_id("product_id", &req.product_id)?;

    let line = state
        .db
        .carts()
        .add_line(&shopper_id, &req.product_id, req.quantity)
        .await?;

    tracing::debug!(
        shopper_id = %shopper_id,
        product_id = %line.product_id,
        quantity = line.quantity,
        "Cart line added"
    );
    Ok((StatusCode::CREATED, Json(line)))
}

/// `quantity: 0` removes the line and answers 204.
pub async fn set_quantity(
    State(state): State<SharedState>,
    Path((shopper_id, product_id)): Path<(String, String)>,
    Json(req): Json<SetQuantityRequest>,
) -> ApiResult<Result<Json<CartLine>, StatusCode>> {
    require_party_id("shopper_id", &shopper_id)?;
    validate_id("product_id", &product_id)?;

    let line = state
        .db
        .carts()
        .set_quantity(&shopper_id, &product_id, req.quantity)
        .await?;

    Ok(line.map(Json).ok_or(StatusCode::NO_CONTENT))
}

pub async fn remove_line(
    State(state): State<SharedState>,
    Path((shopper_id, product_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    require_party_id("shopper_id", &shopper_id)?;
    state.db.carts().remove_line(&shopper_id, &product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_cart(
    State(state): State<SharedState>,
    Path(shopper_id): Path<String>,
) -> ApiResult<Json<ClearedResponse>> {
    require_party_id("shopper_id", &shopper_id)?;
    let removed = state.db.carts().clear(&shopper_id).await?;
    Ok(Json(ClearedResponse { removed }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_lines_grouped_by_seller() {
        let (app, db) = app().await;
        let honey = seed(&db, "hillside", "Honey", 850, 5).await;
        let bread = seed(&db, "rye-rise", "Sourdough", 600, 3).await;

        let uri = "/carts/shopper-1/lines";
        let (status, line) =
            send(&app, "POST", uri, Some(json!({ "product_id": honey.id, "quantity": 2 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(line["quantity"], 2);

        // quantity defaults to 1 and merges
        send(&app, "POST", uri, Some(json!({ "product_id": bread.id }))).await;
        let (_, line) = send(&app, "POST", uri, Some(json!({ "product_id": bread.id }))).await;
        assert_eq!(line["quantity"], 2);

        let (status, view) = send(&app, "GET", "/carts/shopper-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["sellers"].as_array().unwrap().len(), 2);
        assert_eq!(view["sellers"][0]["seller_id"], "hillside");
        assert_eq!(view["total_cents"], 850 * 2 + 600 * 2);
    }

    #[tokio::test]
    async fn test_removed_product_shows_as_unavailable() {
        let (app, db) = app().await;
        let honey = seed(&db, "hillside", "Honey", 850, 5).await;
        send(&app, "POST", "/carts/shopper-1/lines", Some(json!({ "product_id": honey.id }))).await;

        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(&honey.id)
            .execute(db.pool())
            .await
            .unwrap();

        let (status, view) = send(&app, "GET", "/carts/shopper-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(view["sellers"].as_array().unwrap().is_empty());
        assert_eq!(view["unavailable"][0]["product_id"], honey.id.as_str());
        assert_eq!(view["unavailable"][0]["quantity"], 1);

        // checkout refuses the cart until the line is removed
        let (status, body) = send(&app, "POST", "/checkout/shopper-1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let uri = format!("/carts/shopper-1/lines/{}", honey.id);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, view) = send(&app, "GET", "/carts/shopper-1", None).await;
        assert!(view["unavailable"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_line_rejects_bad_input() {
        let (app, db) = app().await;
        let honey = seed(&db, "hillside", "Honey", 850, 5).await;
        let uri = "/carts/shopper-1/lines";

        let (status, body) =
            send(&app, "POST", uri, Some(json!({ "product_id": honey.id, "quantity": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) =
            send(&app, "POST", uri, Some(json!({ "product_id": "not-a-uuid" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = bazaar_db::generate_product_id();
        let (status, body) = send(&app, "POST", uri, Some(json!({ "product_id": missing }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_set_quantity_and_remove() {
        let (app, db) = app().await;
        let honey = seed(&db, "hillside", "Honey", 850, 5).await;
        send(
            &app,
            "POST",
            "/carts/shopper-1/lines",
            Some(json!({ "product_id": honey.id })),
        )
        .await;

        let uri = format!("/carts/shopper-1/lines/{}", honey.id);
        let (status, line) = send(&app, "PUT", &uri, Some(json!({ "quantity": 4 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(line["quantity"], 4);

        let (status, _) = send(&app, "PUT", &uri, Some(json!({ "quantity": 0 }))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clear_cart() {
        let (app, db) = app().await;
        let honey = seed(&db, "hillside", "Honey", 850, 5).await;
        let bread = seed(&db, "rye-rise", "Sourdough", 600, 3).await;
        for id in [&honey.id, &bread.id] {
            send(&app, "POST", "/carts/shopper-1/lines", Some(json!({ "product_id": id }))).await;
        }

        let (status, body) = send(&app, "DELETE", "/carts/shopper-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 2);

        let (_, view) = send(&app, "GET", "/carts/shopper-1", None).await;
        assert_eq!(view["item_count"], 0);

        let (status, _) = send(&app, "DELETE", "/carts/nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
