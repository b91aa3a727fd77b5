//! # Order History Repository
//!
//! Reads the two append-only history tables written by order placement.
//! Every committed order has exactly one record on each side.

use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::repository::order::OrderRepository;
use bazaar_core::{HistorySide, Order, PlacedOrder};

/// Repository for buyer and seller order history.
#[derive(Debug, Clone)]
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    /// Creates a new HistoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        HistoryRepository { pool }
    }

    /// A buyer's orders, newest first, each with its lines.
    pub async fn buyer_orders(&self, buyer_id: &str) -> DbResult<Vec<PlacedOrder>> {
        self.orders(HistorySide::Buyer, buyer_id).await
    }

    /// A seller's orders, newest first, each with its lines.
    pub async fn seller_orders(&self, seller_id: &str) -> DbResult<Vec<PlacedOrder>> {
        self.orders(HistorySide::Seller, seller_id).await
    }

    async fn orders(&self, side: HistorySide, party_id: &str) -> DbResult<Vec<PlacedOrder>> {
        let (table, column) = table_for(side);
        let sql = format!(
            "SELECT o.id, o.buyer_id, o.seller_id, o.status, o.total_cents, \
                    o.created_at, o.updated_at \
             FROM {table} h \
             JOIN orders o ON o.id = h.order_id \
             WHERE h.{column} = ?1 \
             ORDER BY h.recorded_at DESC, h.rowid DESC"
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(party_id)
            .fetch_all(&self.pool)
            .await?;

        OrderRepository::new(self.pool.clone())
            .with_lines(orders)
            .await
    }
}

fn table_for(side: HistorySide) -> (&'static str, &'static str) {
    match side {
        HistorySide::Buyer => ("buyer_order_history", "buyer_id"),
        HistorySide::Seller => ("seller_order_history", "seller_id"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::generate_product_id;
    use crate::{Database, DbConfig};
    use bazaar_core::checkout::{split_by_seller, CheckoutLine, OrderDraft};
    use bazaar_core::Product;
    use chrono::Utc;

    async fn place(db: &Database, buyer: &str, seller: &str, qty: i64) -> PlacedOrder {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            seller_id: seller.to_string(),
            name: "Jam".to_string(),
            unit: "jar".to_string(),
            price_cents: 300,
            stock_quantity: 10,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        let groups = split_by_seller(vec![CheckoutLine::new(product, qty)]);
        db.orders()
            .place_order(&OrderDraft::from_group(buyer, &groups[0]).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_both_sides_recorded_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = place(&db, "buyer", "s1", 1).await;
        let second = place(&db, "buyer", "s2", 2).await;

        let buyer = db.history().buyer_orders("buyer").await.unwrap();
        let ids: Vec<&str> = buyer.iter().map(|p| p.order.id.as_str()).collect();
        assert_eq!(ids, vec![second.order.id.as_str(), first.order.id.as_str()]);
        assert_eq!(buyer[0].lines.len(), 1);
        assert_eq!(buyer[0].lines[0].quantity, 2);

        let s1 = db.history().seller_orders("s1").await.unwrap();
        assert_eq!(s1.len(), 1);
        assert_eq!(s1[0].order.id, first.order.id);

        let recorded: Vec<String> =
            sqlx::query_scalar("SELECT order_id FROM seller_order_history WHERE seller_id = ?1")
                .bind("s2")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert_eq!(recorded, vec![second.order.id.clone()]);
    }

    #[tokio::test]
    async fn test_unknown_party_has_empty_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.history().buyer_orders("nobody").await.unwrap().is_empty());
        assert!(db.history().seller_orders("nobody").await.unwrap().is_empty());
    }
}
