//! # Cart Repository
//!
//! The cart store: at most one cart per shopper, created lazily, holding
//! (product, quantity) lines in insertion order.
//!
//! ## Line Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_line(p, 2)      ──► line p: 2         (cart created if absent)     │
//! │  add_line(p, 1)      ──► line p: 3         (merged, not duplicated)     │
//! │  set_quantity(p, 5)  ──► line p: 5         (exact quantity)             │
//! │  set_quantity(p, 0)  ──► line p removed                                │
//! │  remove_line(p)      ──► NotFound if p isn't in the cart               │
//! │  clear()             ──► all lines removed, cart row kept              │
//! │  delete_lines([..])  ──► checkout's clearer, idempotent                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bazaar_core::cart::{CartView, CartViewLine, UnavailableCartLine};
use bazaar_core::validation::{validate_cart_size, validate_quantity, validate_set_quantity};
use bazaar_core::{Cart, CartLine, CoreError, MAX_LINE_QUANTITY};

/// Repository for carts and cart lines.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets the shopper's cart, if one was ever created.
    pub async fn get_by_shopper(&self, shopper_id: &str) -> DbResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, shopper_id, created_at FROM carts WHERE shopper_id = ?1",
        )
        .bind(shopper_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Returns the shopper's cart, creating it if absent.
    ///
    /// Concurrent callers for the same shopper all end up with the same row:
    /// the insert is a no-op when `shopper_id` already has a cart.
    pub async fn get_or_create(&self, shopper_id: &str) -> DbResult<Cart> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, shopper_id, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (shopper_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(shopper_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_by_shopper(shopper_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", shopper_id))
    }

    /// Lines of a cart in insertion order.
    pub async fn lines(&self, cart_id: &str) -> DbResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT cart_id, product_id, quantity, added_at
            FROM cart_lines
            WHERE cart_id = ?1
            ORDER BY position
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// The shopper's cart and its lines, `None` if there is no cart.
    pub async fn lines_for_shopper(
        &self,
        shopper_id: &str,
    ) -> DbResult<Option<(Cart, Vec<CartLine>)>> {
        let Some(cart) = self.get_by_shopper(shopper_id).await? else {
            return Ok(None);
        };
        let lines = self.lines(&cart.id).await?;
        Ok(Some((cart, lines)))
    }

    /// Adds `quantity` of a product, merging into an existing line.
    ///
    /// ## Errors
    /// - Validation: quantity outside 1..=999
    /// - NotFound: unknown product
    /// - CartTooLarge: a new line would exceed the line limit
    /// - QuantityTooLarge: the merged quantity would exceed 999
    pub async fn add_line(
        &self,
        shopper_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<CartLine> {
        validate_quantity(quantity).map_err(CoreError::from)?;
        self.ensure_product_exists(product_id).await?;

        let cart = self.get_or_create(shopper_id).await?;
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM cart_lines WHERE cart_id = ?1 AND product_id = ?2",
        )
        .bind(&cart.id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            Some(current) if current + quantity > MAX_LINE_QUANTITY => {
                return Err(CoreError::QuantityTooLarge {
                    requested: current + quantity,
                    max: MAX_LINE_QUANTITY,
                }
                .into());
            }
            Some(_) => {}
            None => {
                let count: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM cart_lines WHERE cart_id = ?1")
                        .bind(&cart.id)
                        .fetch_one(&mut *tx)
                        .await?;
                check_cart_size(count)?;
            }
        }

        sqlx::query(
            r#"
            INSERT INTO cart_lines (cart_id, product_id, quantity, added_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = quantity + excluded.quantity
            "#,
        )
        .bind(&cart.id)
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(shopper_id = %shopper_id, product_id = %product_id, quantity, "Added cart line");
        self.get_line(&cart.id, product_id).await
    }

    /// Sets a line to exactly `quantity`. Zero removes the line.
    ///
    /// ## Returns
    /// * `Ok(Some(line))` - Line now has `quantity`
    /// * `Ok(None)` - Quantity was zero, line is gone
    pub async fn set_quantity(
        &self,
        shopper_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<Option<CartLine>> {
        validate_set_quantity(quantity).map_err(CoreError::from)?;

        let cart = self
            .get_by_shopper(shopper_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", shopper_id))?;

        if quantity == 0 {
            sqlx::query("DELETE FROM cart_lines WHERE cart_id = ?1 AND product_id = ?2")
                .bind(&cart.id)
                .bind(product_id)
                .execute(&self.pool)
                .await?;
            debug!(shopper_id = %shopper_id, product_id = %product_id, "Removed cart line (quantity 0)");
            return Ok(None);
        }

        self.ensure_product_exists(product_id).await?;

        let mut tx = self.pool.begin().await?;
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM cart_lines WHERE cart_id = ?1 AND product_id = ?2",
        )
        .bind(&cart.id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM cart_lines WHERE cart_id = ?1")
                    .bind(&cart.id)
                    .fetch_one(&mut *tx)
                    .await?;
            check_cart_size(count)?;
        }

        sqlx::query(
            r#"
            INSERT INTO cart_lines (cart_id, product_id, quantity, added_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = excluded.quantity
            "#,
        )
        .bind(&cart.id)
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_line(&cart.id, product_id).await.map(Some)
    }

    /// Removes one product from the shopper's cart.
    pub async fn remove_line(&self, shopper_id: &str, product_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM cart_lines
            WHERE product_id = ?2
              AND cart_id = (SELECT id FROM carts WHERE shopper_id = ?1)
            "#,
        )
        .bind(shopper_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart line", product_id));
        }

        Ok(())
    }

    /// Removes every line from the shopper's cart.
    ///
    /// ## Returns
    /// Number of lines removed (zero for an already-empty cart).
    pub async fn clear(&self, shopper_id: &str) -> DbResult<u64> {
        let cart = self
            .get_by_shopper(shopper_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", shopper_id))?;

        let result = sqlx::query("DELETE FROM cart_lines WHERE cart_id = ?1")
            .bind(&cart.id)
            .execute(&self.pool)
            .await?;

        debug!(shopper_id = %shopper_id, removed = result.rows_affected(), "Cleared cart");
        Ok(result.rows_affected())
    }

    /// Deletes the given products' lines from a cart.
    ///
    /// Idempotent: lines that are already gone are ignored.
    pub async fn delete_lines(&self, cart_id: &str, product_ids: &[String]) -> DbResult<u64> {
        if product_ids.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM cart_lines WHERE cart_id = ");
        builder.push_bind(cart_id);
        builder.push(" AND product_id IN (");
        let mut separated = builder.separated(", ");
        for id in product_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// The shopper's cart grouped by seller, with subtotals.
    ///
    /// A shopper without a cart gets an empty view. Lines whose product was
    /// removed from the catalog are listed under `unavailable`.
    pub async fn view(&self, shopper_id: &str) -> DbResult<CartView> {
        let Some(cart) = self.get_by_shopper(shopper_id).await? else {
            return Ok(CartView::empty(shopper_id));
        };

        let rows = sqlx::query_as::<_, CartViewRow>(
            r#"
            SELECT
                cl.product_id,
                cl.quantity,
                p.seller_id,
                p.name,
                p.unit,
                p.price_cents,
                p.stock_quantity
            FROM cart_lines cl
            LEFT JOIN products p ON p.id = cl.product_id
            WHERE cl.cart_id = ?1
            ORDER BY cl.position
            "#,
        )
        .bind(&cart.id)
        .fetch_all(&self.pool)
        .await?;

        let mut lines = Vec::with_capacity(rows.len());
        let mut unavailable = Vec::new();
        for row in rows {
            match row.into_line() {
                Ok(line) => lines.push(line),
                Err(gone) => unavailable.push(gone),
            }
        }

        Ok(CartView::build(shopper_id, Some(cart.id), lines, unavailable))
    }

    async fn get_line(&self, cart_id: &str, product_id: &str) -> DbResult<CartLine> {
        sqlx::query_as::<_, CartLine>(
            r#"
            SELECT cart_id, product_id, quantity, added_at
            FROM cart_lines
            WHERE cart_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Cart line", product_id))
    }

    async fn ensure_product_exists(&self, product_id: &str) -> DbResult<()> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        found
            .map(|_| ())
            .ok_or_else(|| DbError::not_found("Product", product_id))
    }
}

fn check_cart_size(current_lines: i64) -> DbResult<()> {
    validate_cart_size(current_lines.max(0) as usize).map_err(|_| {
        DbError::from(CoreError::CartTooLarge {
            max: bazaar_core::MAX_CART_LINES,
        })
    })
}

/// A cart line left-joined with its product; product columns are NULL once
/// the product is gone.
#[derive(Debug, sqlx::FromRow)]
struct CartViewRow {
    product_id: String,
    quantity: i64,
    seller_id: Option<String>,
    name: Option<String>,
    unit: Option<String>,
    price_cents: Option<i64>,
    stock_quantity: Option<i64>,
}

impl CartViewRow {
    fn into_line(self) -> Result<CartViewLine, UnavailableCartLine> {
        match (self.seller_id, self.name, self.unit, self.price_cents, self.stock_quantity) {
            (Some(seller_id), Some(name), Some(unit), Some(price_cents), Some(stock_quantity)) => {
                Ok(CartViewLine {
                    product_id: self.product_id,
                    seller_id,
                    name,
                    unit,
                    price_cents,
                    quantity: self.quantity,
                    stock_quantity,
                })
            }
            _ => Err(UnavailableCartLine {
                product_id: self.product_id,
                quantity: self.quantity,
            }),
        }
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
    use bazaar_core::Product;

    async fn setup() -> (Database, Product, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let make = |seller: &str, name: &str, price: i64, stock: i64| Product {
            id: generate_product_id(),
            seller_id: seller.to_string(),
            name: name.to_string(),
            unit: "each".to_string(),
            price_cents: price,
            stock_quantity: stock,
            created_at: now,
            updated_at: now,
        };
        let honey = make("s1", "Honey", 200, 5);
        let bread = make("s2", "Bread", 450, 0);
        db.products().insert(&honey).await.unwrap();
        db.products().insert(&bread).await.unwrap();
        (db, honey, bread)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (db, _, _) = setup().await;
        let first = db.carts().get_or_create("shopper").await.unwrap();
        let second = db.carts().get_or_create("shopper").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_add_line_merges_quantities() {
        let (db, honey, _) = setup().await;
        db.carts().add_line("shopper", &honey.id, 2).await.unwrap();
        let line = db.carts().add_line("shopper", &honey.id, 1).await.unwrap();
        assert_eq!(line.quantity, 3);

        let (_, lines) = db.carts().lines_for_shopper("shopper").await.unwrap().unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn test_add_line_unknown_product() {
        let (db, _, _) = setup().await;
        let err = db.carts().add_line("shopper", "nope", 1).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(db.carts().get_by_shopper("shopper").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_line_rejects_merged_overflow() {
        let (db, honey, _) = setup().await;
        db.carts().add_line("shopper", &honey.id, 998).await.unwrap();
        let err = db.carts().add_line("shopper", &honey.id, 2).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::QuantityTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_set_quantity() {
        let (db, honey, bread) = setup().await;

        let missing_cart = db.carts().set_quantity("shopper", &honey.id, 1).await.unwrap_err();
        assert!(missing_cart.is_not_found());

        db.carts().add_line("shopper", &honey.id, 2).await.unwrap();
        let line = db.carts().set_quantity("shopper", &honey.id, 7).await.unwrap();
        assert_eq!(line.unwrap().quantity, 7);

        // upsert for a product not yet in the cart
        let line = db.carts().set_quantity("shopper", &bread.id, 4).await.unwrap();
        assert_eq!(line.unwrap().quantity, 4);

        assert!(db.carts().set_quantity("shopper", &honey.id, 0).await.unwrap().is_none());
        assert!(db.carts().set_quantity("shopper", &honey.id, -1).await.is_err());

        let (_, lines) = db.carts().lines_for_shopper("shopper").await.unwrap().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, bread.id);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (db, honey, bread) = setup().await;
        assert!(db.carts().clear("shopper").await.unwrap_err().is_not_found());

        db.carts().add_line("shopper", &honey.id, 1).await.unwrap();
        db.carts().add_line("shopper", &bread.id, 1).await.unwrap();

        db.carts().remove_line("shopper", &honey.id).await.unwrap();
        assert!(db.carts().remove_line("shopper", &honey.id).await.unwrap_err().is_not_found());

        assert_eq!(db.carts().clear("shopper").await.unwrap(), 1);
        assert_eq!(db.carts().clear("shopper").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_lines_is_idempotent() {
        let (db, honey, bread) = setup().await;
        db.carts().add_line("shopper", &honey.id, 1).await.unwrap();
        db.carts().add_line("shopper", &bread.id, 1).await.unwrap();
        let cart = db.carts().get_by_shopper("shopper").await.unwrap().unwrap();

        let ids = vec![honey.id.clone()];
        assert_eq!(db.carts().delete_lines(&cart.id, &ids).await.unwrap(), 1);
        assert_eq!(db.carts().delete_lines(&cart.id, &ids).await.unwrap(), 0);
        assert_eq!(db.carts().delete_lines(&cart.id, &[]).await.unwrap(), 0);

        let lines = db.carts().lines(&cart.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, bread.id);
    }

    #[tokio::test]
    async fn test_view_groups_by_seller() {
        let (db, honey, bread) = setup().await;
        assert!(db.carts().view("shopper").await.unwrap().is_empty());

        db.carts().add_line("shopper", &bread.id, 1).await.unwrap();
        db.carts().add_line("shopper", &honey.id, 3).await.unwrap();

        let view = db.carts().view("shopper").await.unwrap();
        assert_eq!(view.sellers.len(), 2);
        assert_eq!(view.sellers[0].seller_id, "s2");
        assert!(!view.sellers[0].all_in_stock);
        assert_eq!(view.sellers[1].subtotal_cents, 600);
        assert_eq!(view.total_cents, 1050);
        assert!(view.unavailable.is_empty());
    }

    #[tokio::test]
    async fn test_view_flags_removed_products() {
        let (db, honey, bread) = setup().await;
        db.carts().add_line("shopper", &honey.id, 2).await.unwrap();
        db.carts().add_line("shopper", &bread.id, 1).await.unwrap();

        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(&honey.id)
            .execute(db.pool())
            .await
            .unwrap();

        let view = db.carts().view("shopper").await.unwrap();
        assert_eq!(
            view.unavailable,
            vec![UnavailableCartLine {
                product_id: honey.id.clone(),
                quantity: 2,
            }]
        );
        assert_eq!(view.sellers.len(), 1);
        assert_eq!(view.total_cents, 450);

        // once the last available line goes, the removed one still shows
        db.carts().remove_line("shopper", &bread.id).await.unwrap();
        let view = db.carts().view("shopper").await.unwrap();
        assert!(!view.is_empty());
        assert_eq!(view.unavailable.len(), 1);
    }
}
