//! # kirana-core: Pure Business Logic for Kirana POS
//!
//! This crate is the **heart** of the Kirana POS ledger. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Kirana POS Architecture                        │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │              Request Layer (external to workspace)          │   │
//! │  │    auth / routing resolves an employee id + role, then      │   │
//! │  │    calls into the ledger in-process                         │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │               ★ kirana-core (THIS CRATE) ★                  │   │
//! │  │                                                             │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────────────┐    │   │
//! │  │  │  types  │ │  money  │ │ sequence │ │   discount   │    │   │
//! │  │  │ Product │ │  Money  │ │ bill_no  │ │ rule matching│    │   │
//! │  │  │  Bill   │ │  paise  │ │ order_no │ │    quote     │    │   │
//! │  │  └─────────┘ └─────────┘ └──────────┘ └──────────────┘    │   │
//! │  │                                                             │   │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS        │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │                 kirana-db (Database Layer)                  │   │
//! │  │        SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Bill, CustomerOrder, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`sequence`] - Human-readable sequence identifier formats
//! - [`discount`] - Discount rule matching and quotes
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in paise (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod money;
pub mod sequence;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use discount::DiscountQuote;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;
pub use validation::{
    validate_amount, validate_mobile, validate_name, validate_percent_bps, validate_quantity,
};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single bill or order.
///
/// ## Business Reason
/// Prevents runaway carts and keeps a single sale transaction bounded.
pub const MAX_LINE_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// How many times a sale transaction is retried when the generated bill
/// number collides with a concurrently committed one. After this many
/// attempts the failure surfaces as a conflict to the caller.
pub const MAX_SEQUENCE_RETRIES: u32 = 3;
