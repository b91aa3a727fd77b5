//! # Repository Module
//!
//! Database repository implementations for Bazaar.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler / CheckoutStore                                           │
//! │       │                                                                 │
//! │       │  db.carts().add_line(shopper, product, 2)                       │
//! │       ▼                                                                 │
//! │  ┌───────────────────┐ ┌───────────────────┐ ┌───────────────────┐     │
//! │  │ ProductRepository │ │  CartRepository   │ │  OrderRepository  │     │
//! │  │  stock ledger     │ │  lines, view      │ │  place_order (tx) │     │
//! │  │  cond. decrement  │ │  clear, delete    │ │  update_status    │     │
//! │  └───────────────────┘ └───────────────────┘ └───────────────────┘     │
//! │                        ┌───────────────────┐                           │
//! │                        │ HistoryRepository │                           │
//! │                        │  buyer / seller   │                           │
//! │                        └───────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products and stock
//! - [`CartRepository`](cart::CartRepository) - Carts and cart lines
//! - [`OrderRepository`](order::OrderRepository) - Order placement and status
//! - [`HistoryRepository`](history::HistoryRepository) - Buyer/seller history

pub mod cart;
pub mod history;
pub mod order;
pub mod product;
