//! # Checkout Store
//!
//! The storage seam of checkout. The orchestrator only ever talks to these
//! four calls, so tests can wrap the real database and inject failures or
//! delays at exactly one step.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutService ──► CheckoutStore                                      │
//! │                        ├── cart_lines(shopper)      read                │
//! │                        ├── product(id)              read                │
//! │                        ├── place_order(draft)       one transaction     │
//! │                        └── delete_cart_lines(..)    idempotent          │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │                      impl for bazaar_db::Database                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StoreResult;
use bazaar_core::checkout::OrderDraft;
use bazaar_core::{PlacedOrder, Product};
use bazaar_db::Database;

/// A shopper's cart as checkout sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCart {
    pub cart_id: String,
    /// Lines in insertion order.
    pub lines: Vec<StoredCartLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCartLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Storage operations checkout depends on.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// The shopper's cart, `None` if the shopper never created one.
    async fn cart_lines(&self, shopper_id: &str) -> StoreResult<Option<StoredCart>>;

    /// The product as it reads right now, `None` if it doesn't exist.
    async fn product(&self, product_id: &str) -> StoreResult<Option<Product>>;

    /// Creates the order, its lines, both history records and every
    /// conditional stock decrement in one transaction.
    async fn place_order(&self, draft: &OrderDraft) -> StoreResult<PlacedOrder>;

    /// Deletes the given products' lines. Idempotent.
    async fn delete_cart_lines(&self, cart_id: &str, product_ids: &[String]) -> StoreResult<u64>;
}

#[async_trait]
impl CheckoutStore for Database {
    async fn cart_lines(&self, shopper_id: &str) -> StoreResult<Option<StoredCart>> {
        let found = self.carts().lines_for_shopper(shopper_id).await?;

        Ok(found.map(|(cart, lines)| StoredCart {
            cart_id: cart.id,
            lines: lines
                .into_iter()
                .map(|line| StoredCartLine {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .collect(),
        }))
    }

    async fn product(&self, product_id: &str) -> StoreResult<Option<Product>> {
        Ok(self.products().get_by_id(product_id).await?)
    }

    async fn place_order(&self, draft: &OrderDraft) -> StoreResult<PlacedOrder> {
        Ok(self.orders().place_order(draft).await?)
    }

    async fn delete_cart_lines(&self, cart_id: &str, product_ids: &[String]) -> StoreResult<u64> {
        Ok(self.carts().delete_lines(cart_id, product_ids).await?)
    }
}

#[async_trait]
impl<S: CheckoutStore + ?Sized> CheckoutStore for Arc<S> {
    async fn cart_lines(&self, shopper_id: &str) -> StoreResult<Option<StoredCart>> {
        (**self).cart_lines(shopper_id).await
    }

    async fn product(&self, product_id: &str) -> StoreResult<Option<Product>> {
        (**self).product(product_id).await
    }

    async fn place_order(&self, draft: &OrderDraft) -> StoreResult<PlacedOrder> {
        (**self).place_order(draft).await
    }

    async fn delete_cart_lines(&self, cart_id: &str, product_ids: &[String]) -> StoreResult<u64> {
        (**self).delete_cart_lines(cart_id, product_ids).await
    }
}
