//! # Sequence Identifiers
//!
//! Formatting for the human-readable identifiers that name bills,
//! customer orders, and employees.
//!
//! ## Identifier Formats
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Entity      Namespace          Format            Example           │
//! │  ─────────   ───────────────    ───────────────   ───────────────   │
//! │  Bill        bill:YYYYMMDD      B-YYYYMMDD-NNNNN  B-20260830-00042  │
//! │  Order       order:YYYYMMDD     ORD-YYYYMMDD-NNNNN ORD-20260830-00007│
//! │  Employee    emp:<prefix>       <prefix>NNN       BIL003            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module is pure: it turns a date / role and a counter value into
//! an identifier string. The counter itself lives in the database
//! (`sequences` table, one row per namespace, incremented atomically
//! in its own committed statement). The UNIQUE constraint on each
//! identifier column is the final safety net against collisions; the
//! sale coordinator retries bounded times on a uniqueness violation.

use chrono::NaiveDate;

use crate::types::Role;

/// Prefix for bill numbers.
pub const BILL_PREFIX: &str = "B";

/// Prefix for customer order numbers.
pub const ORDER_PREFIX: &str = "ORD";

/// Zero-padding width of the numeric suffix on bills and orders.
pub const DATED_SEQ_WIDTH: usize = 5;

/// Zero-padding width of the numeric suffix on employee codes.
pub const EMPLOYEE_SEQ_WIDTH: usize = 3;

// =============================================================================
// Namespaces
// =============================================================================

/// Counter namespace for bills issued on `date`. Bill numbering restarts
/// each day because the date is embedded in the identifier.
pub fn bill_namespace(date: NaiveDate) -> String {
    format!("bill:{}", date.format("%Y%m%d"))
}

/// Counter namespace for orders placed on `date`.
pub fn order_namespace(date: NaiveDate) -> String {
    format!("order:{}", date.format("%Y%m%d"))
}

/// Counter namespace for employee codes of a role. Not dated; employee
/// numbering is monotonic for all time within a role.
pub fn employee_namespace(role: Role) -> String {
    format!("emp:{}", role.code_prefix())
}

// =============================================================================
// Formatting
// =============================================================================

/// Formats a bill number: `B-YYYYMMDD-NNNNN`.
pub fn format_bill_no(date: NaiveDate, seq: i64) -> String {
    format!(
        "{}-{}-{:0width$}",
        BILL_PREFIX,
        date.format("%Y%m%d"),
        seq,
        width = DATED_SEQ_WIDTH
    )
}

/// Formats an order number: `ORD-YYYYMMDD-NNNNN`.
pub fn format_order_no(date: NaiveDate, seq: i64) -> String {
    format!(
        "{}-{}-{:0width$}",
        ORDER_PREFIX,
        date.format("%Y%m%d"),
        seq,
        width = DATED_SEQ_WIDTH
    )
}

/// Formats an employee code: role prefix + 3-digit counter (`BIL001`).
pub fn format_employee_code(role: Role, seq: i64) -> String {
    format!(
        "{}{:0width$}",
        role.code_prefix(),
        seq,
        width = EMPLOYEE_SEQ_WIDTH
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 30).unwrap()
    }

    #[test]
    fn test_bill_no_format() {
        assert_eq!(format_bill_no(date(), 1), "B-20260830-00001");
        assert_eq!(format_bill_no(date(), 42), "B-20260830-00042");
        // Counter outgrowing the pad width stays unique, just wider
        assert_eq!(format_bill_no(date(), 123_456), "B-20260830-123456");
    }

    #[test]
    fn test_order_no_format() {
        assert_eq!(format_order_no(date(), 7), "ORD-20260830-00007");
    }

    #[test]
    fn test_employee_code_format() {
        assert_eq!(format_employee_code(Role::Biller, 1), "BIL001");
        assert_eq!(format_employee_code(Role::Admin, 12), "ADM012");
        assert_eq!(format_employee_code(Role::Manager, 345), "MGR345");
    }

    #[test]
    fn test_namespaces_are_disjoint() {
        assert_eq!(bill_namespace(date()), "bill:20260830");
        assert_eq!(order_namespace(date()), "order:20260830");
        assert_eq!(employee_namespace(Role::Inventory), "emp:INV");
        assert_ne!(bill_namespace(date()), order_namespace(date()));
    }
}
