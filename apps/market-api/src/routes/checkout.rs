//! Checkout handler.
//!
//! ```text
//! outcome                        status                 body
//! ─────────────────────────────  ─────────────────────  ───────────────────
//! complete                       200 OK                 CheckoutReport
//! partial                        409 Conflict           CheckoutReport
//! rejected at a seller           4xx / 5xx per error    CheckoutReport
//! rejected before any seller     4xx / 5xx per error    ApiError
//! ```
//!
//! A report is the outcome plus `retryable`, so the client always learns
//! which seller stopped the checkout.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::require_party_id;
use crate::error::{ApiError, ApiResult};
use crate::SharedState;
use bazaar_checkout::{CheckoutError, CheckoutOutcome};

/// Response body for a checkout that got as far as a seller.
#[derive(Debug, Serialize)]
pub struct CheckoutReport {
    #[serde(flatten)]
    pub outcome: CheckoutOutcome,
    /// Whether trying the same cart again may succeed; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl CheckoutReport {
    pub fn new(outcome: CheckoutOutcome) -> Self {
        let retryable = outcome.error.as_ref().map(CheckoutError::is_retryable);
        CheckoutReport { outcome, retryable }
    }
}

pub async fn checkout(
    State(state): State<SharedState>,
    Path(shopper_id): Path<String>,
) -> ApiResult<Response> {
    require_party_id("shopper_id", &shopper_id)?;

    let outcome = state.checkout.checkout(&shopper_id).await;

    if outcome.is_complete() {
        return Ok((StatusCode::OK, Json(CheckoutReport::new(outcome))).into_response());
    }

    if outcome.is_partial() {
        return Ok((StatusCode::CONFLICT, Json(CheckoutReport::new(outcome))).into_response());
    }

    let Some(err) = outcome.error.clone() else {
        return Err(ApiError::internal("Checkout finished without a result"));
    };

    if outcome.failed_seller_id.is_some() {
        let status = ApiError::from(err).status();
        return Ok((status, Json(CheckoutReport::new(outcome))).into_response());
    }

    Err(err.into())
}
