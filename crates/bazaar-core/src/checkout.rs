//! # Checkout Logic
//!
//! The pure half of checkout: stock validation, splitting a cart into one
//! group per seller, drafting orders with their totals, and the stage
//! machine the orchestrator is driven through.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Checkout Stages                                 │
//! │                                                                         │
//! │  Idle ──► Validating ──► Splitting ──► Committing(s1) ──► ...           │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                                    Committing(sN) ──► Clearing ──► Done │
//! │                                                                         │
//! │  Any non-terminal stage ──► Failed(reason)                              │
//! │                                                                         │
//! │  Pure pieces (this module)          Side effects (bazaar-checkout)      │
//! │  ─────────────────────────          ──────────────────────────────      │
//! │  validate_stock                     load cart + products                │
//! │  split_by_seller                    place_order (one tx per seller)     │
//! │  OrderDraft::from_group             delete purchased cart lines         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Product;

// =============================================================================
// Checkout Lines
// =============================================================================

/// A cart line joined with the product as it reads right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub product: Product,
    pub quantity: i64,
}

impl CheckoutLine {
    pub fn new(product: Product, quantity: i64) -> Self {
        Self { product, quantity }
    }

    #[inline]
    pub fn seller_id(&self) -> &str {
        &self.product.seller_id
    }

    /// Current price × quantity, `None` if it overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.product.price().checked_mul_quantity(self.quantity)
    }
}

// =============================================================================
// Stock Validator
// =============================================================================

/// Checks every line against the ledger quantity read with it.
///
/// Fails on the first line (in cart order) whose requested quantity exceeds
/// the available stock. No side effects; the Stock Decrementer repeats the
/// check atomically at commit time.
///
/// ## Example
/// ```text
/// [Honey Jar ×5 (stock 3)] ──► InsufficientStock { "Honey Jar", 3, 5 }
/// [Honey Jar ×3 (stock 3)] ──► Ok(())
/// ```
pub fn validate_stock(lines: &[CheckoutLine]) -> CoreResult<()> {
    for line in lines {
        if !line.product.has_stock(line.quantity) {
            return Err(CoreError::InsufficientStock {
                product: line.product.name.clone(),
                available: line.product.stock_quantity,
                requested: line.quantity,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Order Splitter
// =============================================================================

/// The lines of one seller, in cart order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerGroup {
    pub seller_id: String,
    pub lines: Vec<CheckoutLine>,
}

impl SellerGroup {
    pub fn product_ids(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.product.id.clone()).collect()
    }
}

/// Partitions lines by owning seller.
///
/// Groups are ordered by the seller's first appearance in the cart and each
/// group keeps the cart order of its lines, so the same cart always splits
/// the same way.
pub fn split_by_seller(lines: Vec<CheckoutLine>) -> Vec<SellerGroup> {
    group_in_first_seen_order(lines, |line| line.seller_id().to_string())
        .into_iter()
        .map(|(seller_id, lines)| SellerGroup { seller_id, lines })
        .collect()
}

/// Stable grouping: keys ordered by first appearance, items keep their order.
pub(crate) fn group_in_first_seen_order<T, F>(items: Vec<T>, key: F) -> Vec<(String, Vec<T>)>
where
    F: Fn(&T) -> String,
{
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match groups.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, bucket)) => bucket.push(item),
            None => groups.push((k, vec![item])),
        }
    }
    groups
}

// =============================================================================
// Order Drafts
// =============================================================================

/// A priced order line before it is persisted.
///
/// Name, unit and unit price are snapshots of the product at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineDraft {
    pub product_id: String,
    pub name: String,
    pub unit: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

/// Everything needed to persist one seller's order in a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub buyer_id: String,
    pub seller_id: String,
    pub lines: Vec<OrderLineDraft>,
    /// Σ line totals.
    pub total_cents: i64,
}

impl OrderDraft {
    /// Prices a seller group for `buyer_id`.
    ///
    /// Fails with `TotalOverflow` if a line total or the order total does
    /// not fit in i64 cents.
    pub fn from_group(buyer_id: &str, group: &SellerGroup) -> CoreResult<Self> {
        let overflow = || CoreError::TotalOverflow {
            seller_id: group.seller_id.clone(),
        };

        let mut lines = Vec::with_capacity(group.lines.len());
        let mut total = Money::zero();
        for line in &group.lines {
            let line_total = line.line_total().ok_or_else(overflow)?;
            total = total.checked_add(line_total).ok_or_else(overflow)?;
            lines.push(OrderLineDraft {
                product_id: line.product.id.clone(),
                name: line.product.name.clone(),
                unit: line.product.unit.clone(),
                unit_price_cents: line.product.price_cents,
                quantity: line.quantity,
                line_total_cents: line_total.cents(),
            });
        }

        Ok(OrderDraft {
            buyer_id: buyer_id.to_string(),
            seller_id: group.seller_id.clone(),
            total_cents: total.cents(),
            lines,
        })
    }

    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn product_ids(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.product_id.clone()).collect()
    }
}

// =============================================================================
// Checkout Policy
// =============================================================================

/// How stock validation is scoped across sellers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPolicy {
    /// Validate the whole cart before committing anything.
    AllOrNothing,
    /// Validate each seller's lines right before that seller commits.
    PerSeller,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        CheckoutPolicy::AllOrNothing
    }
}

impl CheckoutPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CheckoutPolicy::AllOrNothing => "all_or_nothing",
            CheckoutPolicy::PerSeller => "per_seller",
        }
    }
}

impl fmt::Display for CheckoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckoutPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all_or_nothing" => Ok(CheckoutPolicy::AllOrNothing),
            "per_seller" => Ok(CheckoutPolicy::PerSeller),
            _ => Err(ValidationError::NotAllowed {
                field: "checkout policy".to_string(),
                allowed: vec!["all_or_nothing".to_string(), "per_seller".to_string()],
            }),
        }
    }
}

// =============================================================================
// Checkout Stage Machine
// =============================================================================

/// Where a single checkout currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum CheckoutStage {
    Idle,
    Validating,
    Splitting,
    Committing { seller_id: String },
    Clearing,
    Done,
    Failed { reason: String },
}

impl CheckoutStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutStage::Done | CheckoutStage::Failed { .. })
    }

    /// Whether the machine may move from `self` to `next`.
    ///
    /// `Committing → Clearing` is also taken after a mid-loop failure so the
    /// sellers already committed get their lines cleared before `Failed`.
    pub fn can_transition_to(&self, next: &CheckoutStage) -> bool {
        use CheckoutStage::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed { .. })
                | (Idle, Validating)
                | (Validating, Splitting)
                | (Splitting, Committing { .. })
                | (Committing { .. }, Committing { .. })
                | (Committing { .. }, Clearing)
                | (Clearing, Done)
        )
    }
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutStage::Idle => f.write_str("idle"),
            CheckoutStage::Validating => f.write_str("validating"),
            CheckoutStage::Splitting => f.write_str("splitting"),
            CheckoutStage::Committing { seller_id } => write!(f, "committing({seller_id})"),
            CheckoutStage::Clearing => f.write_str("clearing"),
            CheckoutStage::Done => f.write_str("done"),
            CheckoutStage::Failed { reason } => write!(f, "failed({reason})"),
        }
    }
}

/// Tracks the stage of one checkout and rejects illegal transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRun {
    stage: CheckoutStage,
}

impl Default for CheckoutRun {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutRun {
    pub fn new() -> Self {
        Self {
            stage: CheckoutStage::Idle,
        }
    }

    pub fn stage(&self) -> &CheckoutStage {
        &self.stage
    }

    /// Moves to `next`, or fails with `IllegalTransition` leaving the stage
    /// unchanged.
    pub fn advance(&mut self, next: CheckoutStage) -> CoreResult<()> {
        if !self.stage.can_transition_to(&next) {
            return Err(CoreError::IllegalTransition {
                from: self.stage.clone(),
                to: next,
            });
        }
        self.stage = next;
        Ok(())
    }

    /// Moves to `Failed`. A no-op when already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.stage.is_terminal() {
            self.stage = CheckoutStage::Failed {
                reason: reason.into(),
            };
        }
    }

    pub fn into_stage(self) -> CheckoutStage {
        self.stage
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, seller: &str, price: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            seller_id: seller.to_string(),
            name: format!("Product {id}"),
            unit: "each".to_string(),
            price_cents: price,
            stock_quantity: stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_stock_passes_when_covered() {
        let lines = vec![
            CheckoutLine::new(product("a", "s1", 200, 5), 5),
            CheckoutLine::new(product("b", "s2", 100, 1), 1),
        ];
        assert!(validate_stock(&lines).is_ok());
    }

    #[test]
    fn test_validate_stock_reports_first_short_line() {
        let lines = vec![
            CheckoutLine::new(product("a", "s1", 200, 5), 2),
            CheckoutLine::new(product("b", "s2", 100, 0), 1),
            CheckoutLine::new(product("c", "s2", 100, 0), 4),
        ];
        let err = validate_stock(&lines).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product: "Product b".to_string(),
                available: 0,
                requested: 1,
            }
        );
    }

    #[test]
    fn test_split_preserves_first_appearance_and_line_order() {
        let lines = vec![
            CheckoutLine::new(product("a", "s2", 100, 9), 1),
            CheckoutLine::new(product("b", "s1", 100, 9), 1),
            CheckoutLine::new(product("c", "s2", 100, 9), 1),
            CheckoutLine::new(product("d", "s3", 100, 9), 1),
        ];
        let groups = split_by_seller(lines);

        let sellers: Vec<&str> = groups.iter().map(|g| g.seller_id.as_str()).collect();
        assert_eq!(sellers, vec!["s2", "s1", "s3"]);
        assert_eq!(groups[0].product_ids(), vec!["a", "c"]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let make = || {
            vec![
                CheckoutLine::new(product("a", "s2", 100, 9), 1),
                CheckoutLine::new(product("b", "s1", 100, 9), 1),
            ]
        };
        assert_eq!(split_by_seller(make()), split_by_seller(make()));
    }

    #[test]
    fn test_draft_total_two_lines_same_seller() {
        // 3 × $2.00 + 1 × $5.00 = $11.00
        let groups = split_by_seller(vec![
            CheckoutLine::new(product("a", "s1", 200, 10), 3),
            CheckoutLine::new(product("c", "s1", 500, 10), 1),
        ]);
        assert_eq!(groups.len(), 1);

        let draft = OrderDraft::from_group("buyer", &groups[0]).unwrap();
        assert_eq!(draft.total_cents, 1100);
        assert_eq!(draft.total().to_string(), "$11.00");
        assert_eq!(draft.lines.len(), 2);
        assert_eq!(draft.lines[0].line_total_cents, 600);
        assert_eq!(draft.lines[0].name, "Product a");
        assert_eq!(draft.seller_id, "s1");
        assert_eq!(draft.buyer_id, "buyer");
    }

    #[test]
    fn test_draft_reports_overflow() {
        let groups = split_by_seller(vec![CheckoutLine::new(product("a", "s1", i64::MAX / 2, 10), 3)]);
        assert_eq!(
            OrderDraft::from_group("buyer", &groups[0]),
            Err(CoreError::TotalOverflow {
                seller_id: "s1".to_string()
            })
        );

        // each line fits, the sum does not
        let groups = split_by_seller(vec![
            CheckoutLine::new(product("a", "s1", i64::MAX / 2, 10), 1),
            CheckoutLine::new(product("b", "s1", i64::MAX / 2, 10), 1),
            CheckoutLine::new(product("c", "s1", i64::MAX / 2, 10), 1),
        ]);
        assert!(matches!(
            OrderDraft::from_group("buyer", &groups[0]),
            Err(CoreError::TotalOverflow { .. })
        ));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(CheckoutPolicy::default(), CheckoutPolicy::AllOrNothing);
        assert_eq!("per-seller".parse::<CheckoutPolicy>().unwrap(), CheckoutPolicy::PerSeller);
        assert_eq!(
            "ALL_OR_NOTHING".parse::<CheckoutPolicy>().unwrap(),
            CheckoutPolicy::AllOrNothing
        );
        assert!("yolo".parse::<CheckoutPolicy>().is_err());
    }

    #[test]
    fn test_run_happy_path() {
        let mut run = CheckoutRun::new();
        run.advance(CheckoutStage::Validating).unwrap();
        run.advance(CheckoutStage::Splitting).unwrap();
        run.advance(CheckoutStage::Committing { seller_id: "s1".into() }).unwrap();
        run.advance(CheckoutStage::Committing { seller_id: "s2".into() }).unwrap();
        run.advance(CheckoutStage::Clearing).unwrap();
        run.advance(CheckoutStage::Done).unwrap();
        assert_eq!(run.stage(), &CheckoutStage::Done);
    }

    #[test]
    fn test_run_rejects_illegal_transitions() {
        let mut run = CheckoutRun::new();
        let err = run.advance(CheckoutStage::Clearing).unwrap_err();
        assert!(matches!(err, CoreError::IllegalTransition { .. }));
        assert_eq!(run.stage(), &CheckoutStage::Idle);

        run.advance(CheckoutStage::Validating).unwrap();
        assert!(run.advance(CheckoutStage::Committing { seller_id: "s".into() }).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut run = CheckoutRun::new();
        run.advance(CheckoutStage::Validating).unwrap();
        run.fail("empty cart");
        assert_eq!(
            run.stage(),
            &CheckoutStage::Failed { reason: "empty cart".into() }
        );

        assert!(run.advance(CheckoutStage::Splitting).is_err());
        run.fail("again");
        assert_eq!(run.stage().to_string(), "failed(empty cart)");
    }
}
