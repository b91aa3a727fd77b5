//! # Checkout Service
//!
//! Drives one checkout from cart to orders.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout(shopper)                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Validating ── no cart / no lines ────────────────► Failed(EmptyCart)   │
//! │       │       product gone ──────────────────────► Failed(NotFound)    │
//! │       │       [all_or_nothing] any line short ───► Failed(Insufficient)│
//! │       ▼                                                                 │
//! │  Splitting  (groups by seller, first appearance order)                 │
//! │       │       any group total overflows ─────────► Failed(Overflow)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Committing(s1) ─► Committing(s2) ─► ...   one transaction per seller  │
//! │       │  [per_seller] validate group first                             │
//! │       │  failure: stop, keep committed sellers                         │
//! │       ▼                                                                 │
//! │  Clearing   (only committed sellers' lines)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Done   or   Failed(first error) with partial orders                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Deadline
//! Every store call before clearing races the request deadline. A seller
//! transaction cut off by the deadline is dropped and rolls back; orders that
//! already committed stay. Clearing gets its own budget so committed sellers'
//! lines are still removed after a timeout.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::{CheckoutError, StoreError};
use crate::store::{CheckoutStore, StoredCart};
use bazaar_core::checkout::{
    split_by_seller, validate_stock, CheckoutLine, CheckoutPolicy, CheckoutRun, CheckoutStage,
    OrderDraft,
};
use bazaar_core::PlacedOrder;

/// Default request-level checkout timeout.
pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Configuration
// =============================================================================

/// Checkout behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    pub policy: CheckoutPolicy,
    pub timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            policy: CheckoutPolicy::AllOrNothing,
            timeout: DEFAULT_CHECKOUT_TIMEOUT,
        }
    }
}

impl CheckoutConfig {
    pub fn policy(mut self, policy: CheckoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// The report of one checkout.
///
/// ```text
/// full success:     orders = [..],  failed_seller_id = None,  error = None
/// partial success:  orders = [..],  failed_seller_id = Some,  error = Some
/// rejected:         orders = [],    failed_seller_id = ?,     error = Some
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOutcome {
    pub shopper_id: String,
    /// Orders committed by this checkout, in seller order.
    pub orders: Vec<PlacedOrder>,
    /// The seller whose commit failed, if any.
    pub failed_seller_id: Option<String>,
    /// The first error encountered.
    pub error: Option<CheckoutError>,
    pub final_stage: CheckoutStage,
}

impl CheckoutOutcome {
    /// Every line was purchased.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Some sellers committed, then a later one failed.
    pub fn is_partial(&self) -> bool {
        self.error.is_some() && !self.orders.is_empty()
    }

    /// Nothing was committed.
    pub fn is_rejected(&self) -> bool {
        self.error.is_some() && self.orders.is_empty()
    }

    /// Σ order totals in cents.
    pub fn total_cents(&self) -> i64 {
        self.orders.iter().map(|o| o.order.total_cents).sum()
    }
}

// =============================================================================
// Service
// =============================================================================

/// Checkout orchestrator over a [`CheckoutStore`].
///
/// ## Usage
/// ```rust,ignore
/// let service = CheckoutService::new(db.clone(), CheckoutConfig::default());
/// let outcome = service.checkout(&shopper_id).await;
/// if outcome.is_complete() { ... }
/// ```
#[derive(Debug, Clone)]
pub struct CheckoutService<S> {
    store: S,
    config: CheckoutConfig,
}

/// Accumulated progress of one run.
struct Progress {
    run: CheckoutRun,
    orders: Vec<PlacedOrder>,
    purchased: Vec<String>,
    failed_seller_id: Option<String>,
    error: Option<CheckoutError>,
}

impl<S: CheckoutStore> CheckoutService<S> {
    pub fn new(store: S, config: CheckoutConfig) -> Self {
        CheckoutService { store, config }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Checks out the shopper's whole cart.
    ///
    /// Never panics and never returns early without a report: every failure
    /// ends up in [`CheckoutOutcome::error`].
    pub async fn checkout(&self, shopper_id: &str) -> CheckoutOutcome {
        let deadline = Instant::now() + self.config.timeout;
        let mut progress = Progress {
            run: CheckoutRun::new(),
            orders: Vec::new(),
            purchased: Vec::new(),
            failed_seller_id: None,
            error: None,
        };

        info!(shopper_id = %shopper_id, policy = %self.config.policy, "Checkout started");

        let cart_id = match self.prepare(shopper_id, deadline, &mut progress).await {
            Ok((cart_id, lines)) => {
                self.commit_all(shopper_id, lines, deadline, &mut progress).await;
                Some(cart_id)
            }
            Err(err) => {
                progress.error = Some(err);
                None
            }
        };

        if let Some(cart_id) = cart_id {
            self.clear(shopper_id, &cart_id, &mut progress).await;
        }

        self.finish(shopper_id, progress)
    }

    /// Idle → Validating → Splitting. Loads and checks the cart.
    async fn prepare(
        &self,
        shopper_id: &str,
        deadline: Instant,
        progress: &mut Progress,
    ) -> Result<(String, Vec<CheckoutLine>), CheckoutError> {
        self.advance(progress, CheckoutStage::Validating)?;

        let cart: StoredCart = self
            .within(deadline, self.store.cart_lines(shopper_id))
            .await?
            .map_err(CheckoutError::storage)?
            .filter(|cart| !cart.lines.is_empty())
            .ok_or(CheckoutError::EmptyCart)?;

        let mut lines = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let product = self
                .within(deadline, self.store.product(&line.product_id))
                .await?
                .map_err(CheckoutError::storage)?
                .ok_or_else(|| CheckoutError::ProductNotFound {
                    product_id: line.product_id.clone(),
                })?;
            lines.push(CheckoutLine::new(product, line.quantity));
        }

        if self.config.policy == CheckoutPolicy::AllOrNothing {
            validate_stock(&lines)?;
        }

        self.advance(progress, CheckoutStage::Splitting)?;
        Ok((cart.cart_id, lines))
    }

    /// Splitting → Committing(..)*. Stops at the first failing seller.
    async fn commit_all(
        &self,
        shopper_id: &str,
        lines: Vec<CheckoutLine>,
        deadline: Instant,
        progress: &mut Progress,
    ) {
        let groups = split_by_seller(lines);
        debug!(shopper_id = %shopper_id, sellers = groups.len(), "Cart split by seller");

        // Price every group before the first commit so an unpriceable seller
        // never leaves earlier sellers committed.
        let mut drafts = Vec::with_capacity(groups.len());
        for group in &groups {
            match OrderDraft::from_group(shopper_id, group) {
                Ok(draft) => drafts.push(draft),
                Err(err) => {
                    warn!(shopper_id = %shopper_id, seller_id = %group.seller_id, error = %err, "Order total overflow");
                    progress.failed_seller_id = Some(group.seller_id.clone());
                    progress.error = Some(err.into());
                    return;
                }
            }
        }

        for (group, draft) in groups.into_iter().zip(drafts) {
            let seller_id = group.seller_id.clone();
            if let Err(err) = self.advance(
                progress,
                CheckoutStage::Committing {
                    seller_id: seller_id.clone(),
                },
            ) {
                progress.error = Some(err);
                return;
            }

            if self.config.policy == CheckoutPolicy::PerSeller {
                if let Err(err) = validate_stock(&group.lines) {
                    progress.failed_seller_id = Some(seller_id);
                    progress.error = Some(err.into());
                    return;
                }
            }

            let placed = match self.within(deadline, self.store.place_order(&draft)).await {
                Ok(result) => result.map_err(|e: StoreError| CheckoutError::commit(&seller_id, e)),
                Err(timeout) => Err(timeout),
            };

            match placed {
                Ok(order) => {
                    info!(
                        shopper_id = %shopper_id,
                        seller_id = %seller_id,
                        order_id = %order.order.id,
                        total = %order.order.total(),
                        "Seller order committed"
                    );
                    progress.purchased.extend(draft.product_ids());
                    progress.orders.push(order);
                }
                Err(err) => {
                    warn!(
                        shopper_id = %shopper_id,
                        seller_id = %seller_id,
                        error = %err,
                        committed = progress.orders.len(),
                        "Seller order failed"
                    );
                    progress.failed_seller_id = Some(seller_id);
                    progress.error = Some(err);
                    return;
                }
            }
        }
    }

    /// Committing → Clearing. Removes only the purchased lines.
    async fn clear(&self, shopper_id: &str, cart_id: &str, progress: &mut Progress) {
        if progress.purchased.is_empty() {
            return;
        }
        if let Err(err) = self.advance(progress, CheckoutStage::Clearing) {
            progress.error.get_or_insert(err);
            return;
        }

        let clear_deadline = Instant::now() + self.config.timeout;
        let cleared = self
            .within(
                clear_deadline,
                self.store.delete_cart_lines(cart_id, &progress.purchased),
            )
            .await
            .and_then(|r| r.map_err(CheckoutError::storage));

        match cleared {
            Ok(removed) => {
                debug!(shopper_id = %shopper_id, removed, "Purchased cart lines cleared");
            }
            Err(err) => {
                warn!(shopper_id = %shopper_id, error = %err, "Clearing purchased cart lines failed");
                progress.error.get_or_insert(err);
            }
        }
    }

    /// Clearing → Done, or → Failed(first error).
    fn finish(&self, shopper_id: &str, mut progress: Progress) -> CheckoutOutcome {
        match progress.error.as_ref().map(CheckoutError::code) {
            None => {
                if let Err(err) = progress.run.advance(CheckoutStage::Done) {
                    progress.run.fail(err.to_string());
                    progress.error = Some(err.into());
                }
            }
            Some(code) => progress.run.fail(code),
        }

        let outcome = CheckoutOutcome {
            shopper_id: shopper_id.to_string(),
            orders: progress.orders,
            failed_seller_id: progress.failed_seller_id,
            error: progress.error,
            final_stage: progress.run.into_stage(),
        };

        match &outcome.error {
            None => info!(
                shopper_id = %shopper_id,
                orders = outcome.orders.len(),
                total_cents = outcome.total_cents(),
                "Checkout complete"
            ),
            Some(err) if outcome.is_partial() => warn!(
                shopper_id = %shopper_id,
                orders = outcome.orders.len(),
                failed_seller_id = ?outcome.failed_seller_id,
                error = %err,
                "Checkout partially completed"
            ),
            Some(err) => info!(shopper_id = %shopper_id, error = %err, "Checkout rejected"),
        }

        outcome
    }

    fn advance(&self, progress: &mut Progress, next: CheckoutStage) -> Result<(), CheckoutError> {
        debug!(from = %progress.run.stage(), to = %next, "Checkout stage");
        progress.run.advance(next).map_err(CheckoutError::from)
    }

    /// Runs `step` unless `deadline` passes first.
    async fn within<T>(
        &self,
        deadline: Instant,
        step: impl Future<Output = T>,
    ) -> Result<T, CheckoutError> {
        timeout_at(deadline, step)
            .await
            .map_err(|_| CheckoutError::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreResult;
    use async_trait::async_trait;
    use bazaar_core::{OrderStatus, Product};
    use bazaar_db::{generate_product_id, Database, DbConfig};
    use chrono::Utc;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed(db: &Database, seller: &str, name: &str, price: i64, stock: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            seller_id: seller.to_string(),
            name: name.to_string(),
            unit: "each".to_string(),
            price_cents: price,
            stock_quantity: stock,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        product
    }

    async fn stock(db: &Database, product: &Product) -> i64 {
        db.products().stock(&product.id).await.unwrap().unwrap()
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn cart_products(db: &Database, shopper: &str) -> Vec<String> {
        match db.carts().lines_for_shopper(shopper).await.unwrap() {
            Some((_, lines)) => lines.into_iter().map(|l| l.product_id).collect(),
            None => Vec::new(),
        }
    }

    fn service<S: CheckoutStore>(store: S, policy: CheckoutPolicy) -> CheckoutService<S> {
        CheckoutService::new(store, CheckoutConfig::default().policy(policy))
    }

    /// Fails `place_order` for one seller.
    struct FailingStore {
        inner: Database,
        fail_seller: String,
    }

    #[async_trait]
    impl CheckoutStore for FailingStore {
        async fn cart_lines(&self, shopper_id: &str) -> StoreResult<Option<StoredCart>> {
            self.inner.cart_lines(shopper_id).await
        }
        async fn product(&self, product_id: &str) -> StoreResult<Option<Product>> {
            self.inner.product(product_id).await
        }
        async fn place_order(&self, draft: &OrderDraft) -> StoreResult<PlacedOrder> {
            if draft.seller_id == self.fail_seller {
                return Err(StoreError::Backend("disk I/O error".to_string()));
            }
            self.inner.place_order(draft).await
        }
        async fn delete_cart_lines(&self, cart_id: &str, ids: &[String]) -> StoreResult<u64> {
            self.inner.delete_cart_lines(cart_id, ids).await
        }
    }

    /// Stalls `place_order` for one seller.
    struct SlowStore {
        inner: Database,
        slow_seller: String,
    }

    #[async_trait]
    impl CheckoutStore for SlowStore {
        async fn cart_lines(&self, shopper_id: &str) -> StoreResult<Option<StoredCart>> {
            self.inner.cart_lines(shopper_id).await
        }
        async fn product(&self, product_id: &str) -> StoreResult<Option<Product>> {
            self.inner.product(product_id).await
        }
        async fn place_order(&self, draft: &OrderDraft) -> StoreResult<PlacedOrder> {
            if draft.seller_id == self.slow_seller {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.inner.place_order(draft).await
        }
        async fn delete_cart_lines(&self, cart_id: &str, ids: &[String]) -> StoreResult<u64> {
            self.inner.delete_cart_lines(cart_id, ids).await
        }
    }

    /// Reports one seller's products at a price no order total can hold.
    struct InflatedPriceStore {
        inner: Database,
        inflate_seller: String,
    }

    #[async_trait]
    impl CheckoutStore for InflatedPriceStore {
        async fn cart_lines(&self, shopper_id: &str) -> StoreResult<Option<StoredCart>> {
            self.inner.cart_lines(shopper_id).await
        }
        async fn product(&self, product_id: &str) -> StoreResult<Option<Product>> {
            let product = self.inner.product(product_id).await?;
            Ok(product.map(|mut p| {
                if p.seller_id == self.inflate_seller {
                    p.price_cents = i64::MAX / 2;
                }
                p
            }))
        }
        async fn place_order(&self, draft: &OrderDraft) -> StoreResult<PlacedOrder> {
            self.inner.place_order(draft).await
        }
        async fn delete_cart_lines(&self, cart_id: &str, ids: &[String]) -> StoreResult<u64> {
            self.inner.delete_cart_lines(cart_id, ids).await
        }
    }

    #[tokio::test]
    async fn test_full_success_one_order_per_seller() {
        let db = db().await;
        let honey = seed(&db, "s1", "Honey", 200, 5).await;
        let bread = seed(&db, "s2", "Bread", 450, 3).await;
        let wax = seed(&db, "s1", "Beeswax", 500, 1).await;

        db.carts().add_line("buyer", &honey.id, 2).await.unwrap();
        db.carts().add_line("buyer", &bread.id, 1).await.unwrap();
        db.carts().add_line("buyer", &wax.id, 1).await.unwrap();

        let outcome = service(db.clone(), CheckoutPolicy::AllOrNothing)
            .checkout("buyer")
            .await;

        assert!(outcome.is_complete(), "{:?}", outcome.error);
        assert_eq!(outcome.final_stage, CheckoutStage::Done);
        assert_eq!(outcome.orders.len(), 2);
        assert_eq!(outcome.orders[0].order.seller_id, "s1");
        assert_eq!(outcome.orders[0].order.total_cents, 900);
        assert_eq!(outcome.orders[0].order.status, OrderStatus::Pending);
        assert_eq!(outcome.orders[1].order.seller_id, "s2");
        for placed in &outcome.orders {
            let recomputed: i64 = placed
                .lines
                .iter()
                .map(|l| l.unit_price_cents * l.quantity)
                .sum();
            assert_eq!(recomputed, placed.order.total_cents);
        }

        assert_eq!(stock(&db, &honey).await, 3);
        assert_eq!(stock(&db, &bread).await, 2);
        assert_eq!(stock(&db, &wax).await, 0);
        assert!(cart_products(&db, "buyer").await.is_empty());
    }

    #[tokio::test]
    async fn test_same_seller_two_lines_total() {
        let db = db().await;
        let a = seed(&db, "s1", "Honey", 200, 10).await;
        let c = seed(&db, "s1", "Beeswax", 500, 10).await;
        db.carts().add_line("buyer", &a.id, 3).await.unwrap();
        db.carts().add_line("buyer", &c.id, 1).await.unwrap();

        let outcome = service(db.clone(), CheckoutPolicy::AllOrNothing)
            .checkout("buyer")
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.orders.len(), 1);
        assert_eq!(outcome.orders[0].order.total_cents, 1100);
        assert_eq!(outcome.orders[0].lines.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let db = db().await;
        let honey = seed(&db, "s1", "Honey", 200, 5).await;
        let svc = service(db.clone(), CheckoutPolicy::AllOrNothing);

        // no cart at all
        let outcome = svc.checkout("buyer").await;
        assert_eq!(outcome.error, Some(CheckoutError::EmptyCart));
        assert!(matches!(outcome.final_stage, CheckoutStage::Failed { .. }));

        // cart exists but has no lines
        db.carts().add_line("buyer", &honey.id, 1).await.unwrap();
        db.carts().clear("buyer").await.unwrap();
        let outcome = svc.checkout("buyer").await;
        assert_eq!(outcome.error, Some(CheckoutError::EmptyCart));
        assert_eq!(count(&db, "orders").await, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_everything() {
        let db = db().await;
        let a = seed(&db, "s1", "Honey", 200, 5).await;
        let b = seed(&db, "s2", "Bread", 450, 0).await;
        db.carts().add_line("buyer", &a.id, 2).await.unwrap();
        db.carts().add_line("buyer", &b.id, 1).await.unwrap();

        let outcome = service(db.clone(), CheckoutPolicy::AllOrNothing)
            .checkout("buyer")
            .await;

        assert!(outcome.is_rejected());
        assert_eq!(
            outcome.error,
            Some(CheckoutError::InsufficientStock {
                product: "Bread".to_string(),
                available: 0,
                requested: 1,
            })
        );
        assert_eq!(count(&db, "orders").await, 0);
        assert_eq!(stock(&db, &a).await, 5);
        assert_eq!(cart_products(&db, "buyer").await.len(), 2);
    }

    #[tokio::test]
    async fn test_per_seller_policy_partial_success() {
        let db = db().await;
        let a = seed(&db, "s1", "Honey", 200, 5).await;
        let b = seed(&db, "s2", "Bread", 450, 0).await;
        db.carts().add_line("buyer", &a.id, 2).await.unwrap();
        db.carts().add_line("buyer", &b.id, 1).await.unwrap();

        let outcome = service(db.clone(), CheckoutPolicy::PerSeller)
            .checkout("buyer")
            .await;

        assert!(outcome.is_partial());
        assert_eq!(outcome.orders.len(), 1);
        assert_eq!(outcome.orders[0].order.seller_id, "s1");
        assert_eq!(outcome.failed_seller_id.as_deref(), Some("s2"));
        assert!(matches!(
            outcome.error,
            Some(CheckoutError::InsufficientStock { .. })
        ));

        assert_eq!(stock(&db, &a).await, 3);
        assert_eq!(cart_products(&db, "buyer").await, vec![b.id.clone()]);
    }

    #[tokio::test]
    async fn test_product_removed_from_catalog() {
        let db = db().await;
        let a = seed(&db, "s1", "Honey", 200, 5).await;
        db.carts().add_line("buyer", &a.id, 1).await.unwrap();
        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(&a.id)
            .execute(db.pool())
            .await
            .unwrap();

        let outcome = service(db.clone(), CheckoutPolicy::AllOrNothing)
            .checkout("buyer")
            .await;
        assert_eq!(
            outcome.error,
            Some(CheckoutError::ProductNotFound { product_id: a.id.clone() })
        );
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_earlier_seller() {
        let db = db().await;
        let a = seed(&db, "s1", "Honey", 200, 5).await;
        let b = seed(&db, "s2", "Bread", 450, 5).await;
        db.carts().add_line("buyer", &a.id, 1).await.unwrap();
        db.carts().add_line("buyer", &b.id, 1).await.unwrap();

        let store = FailingStore {
            inner: db.clone(),
            fail_seller: "s2".to_string(),
        };
        let outcome = service(store, CheckoutPolicy::AllOrNothing)
            .checkout("buyer")
            .await;

        assert!(outcome.is_partial());
        assert_eq!(outcome.failed_seller_id.as_deref(), Some("s2"));
        assert!(matches!(
            outcome.error,
            Some(CheckoutError::OrderPersistenceFailure { .. })
        ));
        assert_eq!(count(&db, "orders").await, 1);
        assert_eq!(stock(&db, &a).await, 4);
        assert_eq!(stock(&db, &b).await, 5);
        assert_eq!(cart_products(&db, "buyer").await, vec![b.id.clone()]);
    }

    #[tokio::test]
    async fn test_timeout_leaves_committed_orders() {
        let db = db().await;
        let a = seed(&db, "s1", "Honey", 200, 5).await;
        let b = seed(&db, "s2", "Bread", 450, 5).await;
        db.carts().add_line("buyer", &a.id, 1).await.unwrap();
        db.carts().add_line("buyer", &b.id, 1).await.unwrap();

        let store = SlowStore {
            inner: db.clone(),
            slow_seller: "s2".to_string(),
        };
        let svc = CheckoutService::new(
            store,
            CheckoutConfig::default().timeout(Duration::from_millis(300)),
        );
        let outcome = svc.checkout("buyer").await;

        assert_eq!(outcome.error, Some(CheckoutError::Timeout { timeout_ms: 300 }));
        assert_eq!(outcome.orders.len(), 1);
        assert_eq!(outcome.failed_seller_id.as_deref(), Some("s2"));
        assert_eq!(count(&db, "orders").await, 1);
        assert_eq!(stock(&db, &b).await, 5);
        assert_eq!(cart_products(&db, "buyer").await, vec![b.id.clone()]);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_never_oversell() {
        let db = db().await;
        let honey = seed(&db, "s1", "Honey", 200, 5).await;
        db.carts().add_line("alice", &honey.id, 3).await.unwrap();
        db.carts().add_line("bob", &honey.id, 4).await.unwrap();

        let svc = service(db.clone(), CheckoutPolicy::AllOrNothing);
        let (alice, bob) = tokio::join!(svc.checkout("alice"), svc.checkout("bob"));

        let winners: Vec<&CheckoutOutcome> =
            [&alice, &bob].into_iter().filter(|o| o.is_complete()).collect();
        assert_eq!(winners.len(), 1);

        let loser = if alice.is_complete() { &bob } else { &alice };
        assert!(matches!(
            loser.error,
            Some(CheckoutError::InsufficientStock { .. }) | Some(CheckoutError::StockRaceLost { .. })
        ));
        assert!(loser.orders.is_empty());

        let sold = winners[0].orders[0].lines[0].quantity;
        let left = stock(&db, &honey).await;
        assert_eq!(left, 5 - sold);
        assert!(left >= 0);
        assert_eq!(count(&db, "orders").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_checkouts_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("bazaar.db")).max_connections(8))
            .await
            .unwrap();
        let honey = seed(&db, "s1", "Honey", 200, 5).await;

        let shoppers: Vec<String> = (0..8).map(|i| format!("shopper-{i}")).collect();
        for shopper in &shoppers {
            db.carts().add_line(shopper, &honey.id, 3).await.unwrap();
        }

        let svc = service(db.clone(), CheckoutPolicy::AllOrNothing);
        let handles: Vec<_> = shoppers
            .iter()
            .cloned()
            .map(|shopper| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.checkout(&shopper).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        // 5 in stock, 3 per cart
        let winners = outcomes.iter().filter(|o| o.is_complete()).count();
        assert_eq!(winners, 1);
        for loser in outcomes.iter().filter(|o| !o.is_complete()) {
            assert!(
                matches!(
                    loser.error,
                    Some(CheckoutError::InsufficientStock { .. })
                        | Some(CheckoutError::StockRaceLost { .. })
                ),
                "{:?}",
                loser.error
            );
            assert!(loser.orders.is_empty());
        }

        assert_eq!(stock(&db, &honey).await, 2);
        assert_eq!(count(&db, "orders").await, 1);
        assert_eq!(count(&db, "order_lines").await, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_total_overflow_is_reported() {
        let db = db().await;
        let a = seed(&db, "s1", "Honey", 200, 5).await;
        let b = seed(&db, "s2", "Gold", 1_000, 5).await;
        db.carts().add_line("buyer", &a.id, 1).await.unwrap();
        db.carts().add_line("buyer", &b.id, 3).await.unwrap();

        let store = InflatedPriceStore {
            inner: db.clone(),
            inflate_seller: "s2".to_string(),
        };
        let outcome = service(store, CheckoutPolicy::PerSeller).checkout("buyer").await;

        assert!(outcome.is_rejected());
        assert_eq!(
            outcome.error,
            Some(CheckoutError::TotalOverflow {
                seller_id: "s2".to_string()
            })
        );
        assert_eq!(outcome.failed_seller_id.as_deref(), Some("s2"));
        assert!(matches!(outcome.final_stage, CheckoutStage::Failed { .. }));

        // s1 priced fine but nothing commits once any seller cannot be priced
        assert_eq!(count(&db, "orders").await, 0);
        assert_eq!(stock(&db, &a).await, 5);
        assert_eq!(stock(&db, &b).await, 5);
        assert_eq!(cart_products(&db, "buyer").await.len(), 2);
    }

    #[tokio::test]
    async fn test_history_recorded_on_both_sides() {
        let db = db().await;
        let a = seed(&db, "s1", "Honey", 200, 5).await;
        let b = seed(&db, "s2", "Bread", 450, 5).await;
        db.carts().add_line("buyer", &a.id, 1).await.unwrap();
        db.carts().add_line("buyer", &b.id, 2).await.unwrap();

        let outcome = service(db.clone(), CheckoutPolicy::AllOrNothing)
            .checkout("buyer")
            .await;
        assert!(outcome.is_complete());

        assert_eq!(db.history().buyer_orders("buyer").await.unwrap().len(), 2);
        assert_eq!(db.history().seller_orders("s1").await.unwrap().len(), 1);
        assert_eq!(db.history().seller_orders("s2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_checkout_sees_empty_cart() {
        let db = db().await;
        let a = seed(&db, "s1", "Honey", 200, 5).await;
        db.carts().add_line("buyer", &a.id, 1).await.unwrap();

        let svc = service(db.clone(), CheckoutPolicy::AllOrNothing);
        assert!(svc.checkout("buyer").await.is_complete());

        let again = svc.checkout("buyer").await;
        assert_eq!(again.error, Some(CheckoutError::EmptyCart));
        assert_eq!(stock(&db, &a).await, 4);
    }
}
