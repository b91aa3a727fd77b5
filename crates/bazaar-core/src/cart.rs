//! # Cart View
//!
//! Read model of a shopper's cart, grouped by seller the same way checkout
//! will split it into orders.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartView (shopper 7f3c…)                                               │
//! │                                                                         │
//! │  ┌─ seller A ──────────────────────────────┐                           │
//! │  │  3 × Honey Jar     $2.00   = $6.00      │                           │
//! │  │  1 × Beeswax       $5.00   = $5.00      │  subtotal $11.00          │
//! │  └─────────────────────────────────────────┘                           │
//! │  ┌─ seller B ──────────────────────────────┐                           │
//! │  │  2 × Sourdough     $4.50   = $9.00      │  subtotal  $9.00          │
//! │  └─────────────────────────────────────────┘                           │
//! │                                               total    $20.00          │
//! │  unavailable: 1 × <product removed from catalog>                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::checkout::group_in_first_seen_order;
use crate::money::Money;

/// One cart line joined with its product, as the shopper sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartViewLine {
    pub product_id: String,
    pub seller_id: String,
    pub name: String,
    pub unit: String,
    pub price_cents: i64,
    pub quantity: i64,
    pub stock_quantity: i64,
}

impl CartViewLine {
    /// Whether the ledger currently covers the requested quantity.
    pub fn in_stock(&self) -> bool {
        self.stock_quantity >= self.quantity
    }

    pub fn line_total(&self) -> Money {
        Money::from_cents(self.price_cents).saturating_mul_quantity(self.quantity)
    }
}

/// A cart line whose product no longer exists.
///
/// Kept visible so the shopper can remove it; checkout rejects the cart
/// while it is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnavailableCartLine {
    pub product_id: String,
    pub quantity: i64,
}

/// The lines of one seller inside a cart view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SellerCartGroup {
    pub seller_id: String,
    pub lines: Vec<CartViewLine>,
    pub subtotal_cents: i64,
    pub item_count: i64,
    /// False if any line asks for more than the ledger holds.
    pub all_in_stock: bool,
}

/// A shopper's cart grouped by seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartView {
    pub shopper_id: String,
    /// None when the shopper never added anything.
    pub cart_id: Option<String>,
    pub sellers: Vec<SellerCartGroup>,
    /// Sum over available lines only.
    pub total_cents: i64,
    pub item_count: i64,
    /// Lines pointing at products that were removed, in cart order.
    pub unavailable: Vec<UnavailableCartLine>,
}

impl CartView {
    /// Builds the view from lines in cart (insertion) order.
    pub fn build(
        shopper_id: &str,
        cart_id: Option<String>,
        lines: Vec<CartViewLine>,
        unavailable: Vec<UnavailableCartLine>,
    ) -> Self {
        let sellers: Vec<SellerCartGroup> =
            group_in_first_seen_order(lines, |line| line.seller_id.clone())
                .into_iter()
                .map(|(seller_id, lines)| {
                    let subtotal: Money = lines.iter().map(CartViewLine::line_total).sum();
                    SellerCartGroup {
                        seller_id,
                        subtotal_cents: subtotal.cents(),
                        item_count: lines.iter().map(|l| l.quantity).sum(),
                        all_in_stock: lines.iter().all(CartViewLine::in_stock),
                        lines,
                    }
                })
                .collect();

        let total: Money = sellers
            .iter()
            .map(|s| Money::from_cents(s.subtotal_cents))
            .sum();

        CartView {
            shopper_id: shopper_id.to_string(),
            cart_id,
            total_cents: total.cents(),
            item_count: sellers.iter().map(|s| s.item_count).sum(),
            sellers,
            unavailable,
        }
    }

    /// An empty view for a shopper without a cart.
    pub fn empty(shopper_id: &str) -> Self {
        Self::build(shopper_id, None, Vec::new(), Vec::new())
    }

    /// No lines at all, available or not.
    pub fn is_empty(&self) -> bool {
        self.sellers.is_empty() && self.unavailable.is_empty()
    }

    /// Whether some line points at a removed product.
    pub fn has_unavailable(&self) -> bool {
        !self.unavailable.is_empty()
    }

    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}
