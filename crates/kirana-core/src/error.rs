//! # Error Types
//!
//! Domain-specific error types for kirana-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  kirana-core errors (this file)                                     │
//! │  ├── CoreError        - Ledger rule violations                      │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  kirana-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                 │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → surfaced by the request layer  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product name, bill no, etc.)
//! 3. Errors are enum variants, never String
//! 4. Failures inside a multi-step sale are all-or-nothing; the variant
//!    tells the caller which item or field caused the abort

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations surfaced to callers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced product is absent (or soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// A referenced customer is absent.
    #[error("Customer not found: {0}")]
    CustomerNotFound(i64),

    /// A referenced bill is absent.
    #[error("Bill not found: {0}")]
    BillNotFound(String),

    /// A referenced order is absent.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Requested quantity exceeds current stock at deduction time.
    ///
    /// Carries enough detail to identify the offending line item. The
    /// enclosing sale transaction has already been rolled back when this
    /// reaches the caller.
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        name: String,
        available: i64,
        requested: i64,
    },

    /// A generated sequence identifier collided on insert.
    ///
    /// Recovered locally by the sale coordinator via bounded retry;
    /// never surfaced unless the retries are exhausted (in which case
    /// the caller sees [`CoreError::Conflict`]).
    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// Concurrent modification detected (or retries exhausted).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A status transition that the entity's state machine forbids.
    #[error("{entity} {id} is {current}, cannot transition to {requested}")]
    InvalidStatusTransition {
        entity: &'static str,
        id: String,
        current: String,
        requested: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Underlying storage failure (connection, migration, unexpected
    /// query error). The persistence layer converts its own error type
    /// into this variant at the crate boundary.
    #[error("Storage error: {0}")]
    Storage(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input does not meet requirements; they are
/// raised before any write happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Invalid format (e.g., malformed mobile number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A supplied line total does not equal unit price × quantity.
    #[error("line total mismatch for product {product_id}: expected {expected}, got {got}")]
    LineTotalMismatch {
        product_id: i64,
        expected: i64,
        got: i64,
    },

    /// Duplicate value on a unique field (e.g., customer mobile).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
