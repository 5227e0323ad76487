//! # Domain Types
//!
//! Core domain types used throughout Kirana POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐   ┌──────────────────┐      │
//! │  │   Product     │   │     Bill      │   │  CustomerOrder   │      │
//! │  │ ───────────── │   │ ───────────── │   │ ──────────────── │      │
//! │  │ id (i64)      │   │ id (i64)      │   │ id (i64)         │      │
//! │  │ current_stock │   │ bill_no (str) │   │ order_no (str)   │      │
//! │  │ unit_price    │   │ net_payable   │   │ status           │      │
//! │  └───────┬───────┘   └───────┬───────┘   └────────┬─────────┘      │
//! │          │                   │                    │                 │
//! │    StockEntry            BillItem             OrderItem             │
//! │    (audit rows)       (frozen prices)      (no frozen price)        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Ledger entities have:
//! - `id`: surrogate i64 - immutable, used for database relations
//! - Business ID (`bill_no`, `order_no`, `employee_code`) - human-readable,
//!   generated from a per-namespace sequence, unique for all time
//!
//! ## Percentages
//! All percentages are basis points (1 bps = 0.01%, so 1000 = 10%).
//! Integer bps avoids float comparison issues in the discount tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Role
// =============================================================================

/// Employee role resolved by the external auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Inventory,
    Biller,
}

impl Role {
    /// Prefix used when generating this role's employee codes
    /// (`ADM001`, `MGR002`, ...).
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Role::Admin => "ADM",
            Role::Manager => "MGR",
            Role::Inventory => "INV",
            Role::Biller => "BIL",
        }
    }
}

// =============================================================================
// Payment Mode
// =============================================================================

/// How a bill was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMode {
    Cash,
    Online,
    Card,
}

impl Default for PaymentMode {
    fn default() -> Self {
        PaymentMode::Cash
    }
}

// =============================================================================
// Bill Status
// =============================================================================

/// Status of a bill. Bills are immutable once created except for the
/// transition PAID → CANCELLED (no stock reversal is performed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum BillStatus {
    Paid,
    Cancelled,
}

// =============================================================================
// Order Status
// =============================================================================

/// Status of a provisional customer order.
///
/// Allowed transitions: PENDING → COMPLETED, PENDING → CANCELLED.
/// A COMPLETED or CANCELLED order is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Whether a transition from `self` to `next` is permitted.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale. One stock pool per product.
///
/// `current_stock` is a materialized counter: opening stock plus all
/// stock-entry additions minus quantities sold on non-cancelled bills.
/// It is mutated only by the stock ledger, inside transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Unit price in paise.
    pub unit_price_paise: i64,
    /// Materialized stock counter, never negative.
    pub current_stock: i64,
    /// Alert threshold for the low-stock snapshot query.
    pub low_stock_threshold: i64,
    pub barcode: Option<String>,
    /// Soft-delete flag; bills keep referencing deactivated products.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_paise(self.unit_price_paise)
    }

    /// Whether the stock level is at or below the alert threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.low_stock_threshold
    }
}

// =============================================================================
// Stock Entry
// =============================================================================

/// Immutable audit record of a stock-increasing operation.
///
/// Created once per replenishment (including a product's opening stock);
/// never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockEntry {
    pub id: i64,
    pub product_id: i64,
    /// Quantity added, always positive.
    pub quantity_added: i64,
    /// Employee (surrogate id) who performed the addition.
    pub added_by: i64,
    pub entry_date: DateTime<Utc>,
}

// =============================================================================
// Customer
// =============================================================================

/// A retail customer, keyed naturally by mobile number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: i64,
    pub name: String,
    /// Natural key; unique across customers.
    pub mobile: String,
    pub address: Option<String>,
    pub whatsapp_opt_in: bool,
    /// Flat per-customer discount in basis points, set by staff.
    pub discount_bps: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Employee
// =============================================================================

/// An employee record. Password hashing and token issuance live outside
/// this workspace; `password_hash` is stored opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Employee {
    pub id: i64,
    /// Human-readable code generated per role (`BIL001`).
    pub employee_code: String,
    pub username: String,
    pub mobile: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub inactive_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Bill
// =============================================================================

/// A finalized, immutable purchase record.
///
/// Totals are frozen at creation; they are never recomputed from current
/// product prices. `net_payable = total - discount + gst`, always >= 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Bill {
    pub id: i64,
    /// Unique human-readable number, `B-YYYYMMDD-NNNNN`.
    pub bill_no: String,
    /// Optional back-reference to the customer order this bill settles.
    pub order_no: Option<String>,
    pub bill_date: DateTime<Utc>,
    pub customer_id: Option<i64>,
    /// Employee (surrogate id) who issued the bill.
    pub billed_by: i64,
    pub total_paise: i64,
    pub discount_paise: i64,
    pub gst_paise: i64,
    pub net_payable_paise: i64,
    pub payment_mode: PaymentMode,
    pub status: BillStatus,
}

impl Bill {
    #[inline]
    pub fn net_payable(&self) -> Money {
        Money::from_paise(self.net_payable_paise)
    }
}

// =============================================================================
// Bill Item
// =============================================================================

/// A line item in a bill. Uses the snapshot pattern: unit price and line
/// total are frozen at the time of sale, independent of later price
/// changes on the product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BillItem {
    pub id: i64,
    pub bill_id: i64,
    pub product_id: i64,
    /// Quantity sold, always positive.
    pub quantity: i64,
    /// Unit price in paise at time of sale (frozen).
    pub unit_price_paise: i64,
    /// Line total in paise (unit_price × quantity, frozen).
    pub total_paise: i64,
}

impl BillItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_paise(self.unit_price_paise)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }
}

// =============================================================================
// Customer Order
// =============================================================================

/// A provisional, pre-sale customer request. Never touches stock; staff
/// later convert it into a bill (or cancel it).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CustomerOrder {
    pub id: i64,
    /// Unique human-readable number, `ORD-YYYYMMDD-NNNNN`.
    pub order_no: String,
    pub customer_id: i64,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    /// Estimated from current product prices at submission (not frozen).
    pub total_estimated_paise: i64,
}

/// A line item on a customer order: product and requested quantity only.
/// No frozen price - no sale has occurred yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
}

// =============================================================================
// Discounts
// =============================================================================

/// A global percentage discount setting. Only one row may be active at a
/// time; activating a new one deactivates all prior active rows within
/// the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Discount {
    pub id: i64,
    pub name: String,
    pub percent_bps: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A tiered percentage discount keyed by cart total range
/// `[min_amount, max_amount)`, with `max_amount = 0` meaning unbounded.
/// Independently active/inactive; not mutually exclusive with the
/// global discount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DiscountRule {
    pub id: i64,
    pub min_amount_paise: i64,
    /// 0 means no upper bound.
    pub max_amount_paise: i64,
    pub percent_bps: i64,
    pub is_active: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================
