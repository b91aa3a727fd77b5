//! # Order Repository
//!
//! Persists one seller's order and everything that must commit with it.
//!
//! ## Order Placement Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   ├── INSERT orders              (status = pending, total = Σ lines)    │
//! │   ├── INSERT order_lines × N     (name/unit/price snapshots)            │
//! │   ├── INSERT buyer_order_history                                        │
//! │   ├── INSERT seller_order_history                                       │
//! │   └── UPDATE products ... WHERE stock_quantity >= q   × N               │
//! │          │                                                              │
//! │          ├── all matched ──► COMMIT                                     │
//! │          └── any missed  ──► ROLLBACK, DbError::StockConflict           │
//! │                                                                         │
//! │  Either the order, its lines, both history records and every stock     │
//! │  decrement exist, or none of them do.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::product::decrement_stock_if_available;
use bazaar_core::checkout::OrderDraft;
use bazaar_core::{CoreError, Order, OrderLine, OrderStatus, PlacedOrder};

const ORDER_COLUMNS: &str =
    "id, buyer_id, seller_id, status, total_cents, created_at, updated_at";

const ORDER_LINE_COLUMNS: &str = "id, order_id, product_id, name_snapshot, unit_snapshot, \
     unit_price_cents, quantity, line_total_cents";

/// Repository for orders and order lines.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Places one seller's order atomically.
    ///
    /// ## Errors
    /// * `DbError::StockConflict` - a conditional decrement matched no row;
    ///   nothing was written
    /// * any other `DbError` - nothing was written
    pub async fn place_order(&self, draft: &OrderDraft) -> DbResult<PlacedOrder> {
        let mut tx = self.pool.begin().await?;

        let placed = insert_order(&mut tx, draft).await?;

        for line in &draft.lines {
            decrement_stock_if_available(&mut tx, &line.product_id, line.quantity).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_id = %placed.order.id,
            buyer_id = %placed.order.buyer_id,
            seller_id = %placed.order.seller_id,
            total_cents = placed.order.total_cents,
            lines = placed.lines.len(),
            "Order placed"
        );

        Ok(placed)
    }

    /// Gets an order by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets an order with its lines.
    pub async fn get_placed(&self, id: &str) -> DbResult<Option<PlacedOrder>> {
        let Some(order) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let lines = self.get_lines(id).await?;
        Ok(Some(PlacedOrder { order, lines }))
    }

    /// Gets the lines of an order in checkout order.
    pub async fn get_lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let sql = format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY position"
        );
        let lines = sqlx::query_as::<_, OrderLine>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }

    /// Moves an order to `next` if the lifecycle allows it.
    ///
    /// ## Status Lifecycle
    /// ```text
    ///   pending ──► confirmed ──► completed
    ///      │            │
    ///      └────────────┴──► cancelled
    /// ```
    ///
    /// The update is conditional on the status that was checked, so two
    /// concurrent updates can't both apply.
    pub async fn update_status(&self, order_id: &str, next: OrderStatus) -> DbResult<Order> {
        let order = self
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        if !order.status.can_transition_to(next) {
            return Err(CoreError::InvalidOrderStatus {
                order_id: order_id.to_string(),
                from: order.status,
                to: next,
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(order_id)
        .bind(order.status)
        .bind(next)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let updated = self
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        if result.rows_affected() == 0 {
            // lost to a concurrent update; report against what's there now
            return Err(CoreError::InvalidOrderStatus {
                order_id: order_id.to_string(),
                from: updated.status,
                to: next,
            }
            .into());
        }

        debug!(order_id = %order_id, from = %order.status, to = %next, "Order status updated");
        Ok(updated)
    }

    /// Attaches lines to each order, keeping the orders' order.
    pub(crate) async fn with_lines(&self, orders: Vec<Order>) -> DbResult<Vec<PlacedOrder>> {
        let mut by_order: HashMap<String, Vec<OrderLine>> = HashMap::new();
        for order in &orders {
            by_order.insert(order.id.clone(), self.get_lines(&order.id).await?);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let lines = by_order.remove(&order.id).unwrap_or_default();
                PlacedOrder { order, lines }
            })
            .collect())
    }
}

/// Inserts the order, its lines and both history records.
async fn insert_order(conn: &mut SqliteConnection, draft: &OrderDraft) -> DbResult<PlacedOrder> {
    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4().to_string(),
        buyer_id: draft.buyer_id.clone(),
        seller_id: draft.seller_id.clone(),
        status: OrderStatus::Pending,
        total_cents: draft.total_cents,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO orders (id, buyer_id, seller_id, status, total_cents, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&order.id)
    .bind(&order.buyer_id)
    .bind(&order.seller_id)
    .bind(order.status)
    .bind(order.total_cents)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    let mut lines = Vec::with_capacity(draft.lines.len());
    for (position, line) in draft.lines.iter().enumerate() {
        let order_line = OrderLine {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            product_id: line.product_id.clone(),
            name_snapshot: line.name.clone(),
            unit_snapshot: line.unit.clone(),
            unit_price_cents: line.unit_price_cents,
            quantity: line.quantity,
            line_total_cents: line.line_total_cents,
        };

        sqlx::query(
            r#"
            INSERT INTO order_lines (
                id, order_id, position, product_id, name_snapshot, unit_snapshot,
                unit_price_cents, quantity, line_total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&order_line.id)
        .bind(&order_line.order_id)
        .bind(position as i64)
        .bind(&order_line.product_id)
        .bind(&order_line.name_snapshot)
        .bind(&order_line.unit_snapshot)
        .bind(order_line.unit_price_cents)
        .bind(order_line.quantity)
        .bind(order_line.line_total_cents)
        .execute(&mut *conn)
        .await?;

        lines.push(order_line);
    }

    sqlx::query(
        "INSERT INTO buyer_order_history (id, buyer_id, order_id, recorded_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&order.buyer_id)
    .bind(&order.id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO seller_order_history (id, seller_id, order_id, recorded_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&order.seller_id)
    .bind(&order.id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(PlacedOrder { order, lines })
}

// =============================================================================
// Unit Tests
// =============================================================================
