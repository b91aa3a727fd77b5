//! Order history handlers. Both sides list newest first.

use axum::extract::{Path, State};
use axum::Json;

use super::require_party_id;
use crate::error::ApiResult;
use crate::SharedState;
use bazaar_core::PlacedOrder;

pub async fn buyer_history(
    State(state): State<SharedState>,
    Path(buyer_id): Path<String>,
) -> ApiResult<Json<Vec<PlacedOrder>>> {
    require_party_id("buyer_id", &buyer_id)?;
    Ok(Json(state.db.history().buyer_orders(&buyer_id).await?))
}

pub async fn seller_history(
    State(state): State<SharedState>,
    Path(seller_id): Path<String>,
) -> ApiResult<Json<Vec<PlacedOrder>>> {
    require_party_id("seller_id", &seller_id)?;
    Ok(Json(state.db.history().seller_orders(&seller_id).await?))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_history_after_checkout() {
        let (app, db) = app().await;
        let honey = seed(&db, "hillside", "Honey", 850, 5).await;
        let bread = seed(&db, "rye-rise", "Sourdough", 600, 3).await;
        for id in [&honey.id, &bread.id] {
            send(&app, "POST", "/carts/shopper-1/lines", Some(json!({ "product_id": id }))).await;
        }
        send(&app, "POST", "/checkout/shopper-1", None).await;

        let (status, buyer) = send(&app, "GET", "/history/buyers/shopper-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(buyer.as_array().unwrap().len(), 2);

        let (_, seller) = send(&app, "GET", "/history/sellers/hillside", None).await;
        let seller = seller.as_array().unwrap();
        assert_eq!(seller.len(), 1);
        assert_eq!(seller[0]["order"]["buyer_id"], "shopper-1");
        assert_eq!(seller[0]["lines"][0]["name_snapshot"], "Honey");
    }

    #[tokio::test]
    async fn test_history_empty_for_unknown_party() {
        let (app, _db) = app().await;
        let (status, body) = send(&app, "GET", "/history/sellers/nobody", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }
}
