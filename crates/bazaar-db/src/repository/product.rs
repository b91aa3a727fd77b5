//! # Product Repository
//!
//! Database operations for products, which double as the stock ledger.
//!
//! ## Key Operations
//! - Lookup by id (checkout reads price, unit, name and stock here)
//! - Listing a seller's products
//! - Compare-and-decrement of stock inside an order transaction
//!
//! ## Compare-and-Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products                                                        │
//! │     SET stock_quantity = stock_quantity - :qty                          │
//! │   WHERE id = :id AND stock_quantity >= :qty                             │
//! │                                                                         │
//! │  rows_affected = 1  ──► decremented, stock stays >= 0                  │
//! │  rows_affected = 0  ──► someone else got there first                   │
//! │                          DbError::StockConflict, tx rolls back         │
//! │                                                                         │
//! │  Never read-then-write: the check and the write are one statement.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bazaar_core::validation::{
    validate_price_cents, validate_product_name, validate_stock_quantity, validate_unit,
};
use bazaar_core::{CoreError, Product};

const PRODUCT_COLUMNS: &str =
    "id, seller_id, name, unit, price_cents, stock_quantity, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
/// let product = repo.get_by_id("uuid-here").await?;
/// let stock = repo.stock("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// Used by the seed binary and tests; catalog management lives elsewhere.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_product_name(&product.name).map_err(CoreError::from)?;
        validate_unit(&product.unit).map_err(CoreError::from)?;
        validate_price_cents(product.price_cents).map_err(CoreError::from)?;
        validate_stock_quantity(product.stock_quantity).map_err(CoreError::from)?;

        debug!(id = %product.id, seller_id = %product.seller_id, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, seller_id, name, unit, price_cents, stock_quantity,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.seller_id)
        .bind(product.name.trim())
        .bind(product.unit.trim())
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Current ledger quantity, `None` if the product doesn't exist.
    pub async fn stock(&self, id: &str) -> DbResult<Option<i64>> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(stock)
    }

    /// Sets the ledger quantity outright (restock).
    pub async fn set_stock(&self, id: &str, quantity: i64) -> DbResult<()> {
        validate_stock_quantity(quantity).map_err(CoreError::from)?;

        let result = sqlx::query(
            "UPDATE products SET stock_quantity = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts products (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Decrements stock by `quantity` only if at least that much is available.
///
/// Runs on the caller's connection so it joins the caller's transaction.
///
/// ## Returns
/// * `Ok(())` - Exactly one row was decremented
/// * `Err(DbError::StockConflict)` - Not enough stock (or product gone)
pub async fn decrement_stock_if_available(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET
            stock_quantity = stock_quantity - ?2,
            updated_at = ?3
        WHERE id = ?1 AND stock_quantity >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(product_id = %product_id, quantity, "Conditional stock decrement matched no row");
        return Err(DbError::StockConflict {
            product_id: product_id.to_string(),
        });
    }

    Ok(())
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
