//! # kirana-db: Database Layer for Kirana POS
//!
//! This crate provides persistence for the Kirana POS ledger. It uses
//! SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Kirana POS Data Flow                           │
//! │                                                                     │
//! │  Request layer (external): auth resolves employee id + role         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │                   kirana-db (THIS CRATE)                    │   │
//! │  │                                                             │   │
//! │  │  ┌─────────────┐   ┌────────────────┐   ┌──────────────┐  │   │
//! │  │  │  Database   │   │  Repositories  │   │  Migrations  │  │   │
//! │  │  │  (pool.rs)  │   │                │   │  (embedded)  │  │   │
//! │  │  │             │   │ BillRepository │   │              │  │   │
//! │  │  │ SqlitePool  │◄──│ StockLedger    │   │ 001_init.sql │  │   │
//! │  │  │ WAL mode    │   │ OrderRepository│   │              │  │   │
//! │  │  └─────────────┘   └────────────────┘   └──────────────┘  │   │
//! │  │                                                             │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! │       │                                                             │
//! │       ▼                                                             │
//! │                       SQLite Database                               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Model
//!
//! Workers share nothing in-process except the pool; every correctness
//! guarantee comes from the store's transaction mechanism:
//!
//! - A sale is one transaction: bill row, per-item stock deduction, and
//!   frozen-price line items commit together or not at all.
//! - Stock deduction is a conditional single-row update, so concurrent
//!   sales of the same product serialize on the row instead of both
//!   reading stale stock.
//! - Sequence counters are incremented with a conditional upsert that
//!   commits on its own, ahead of the transaction that consumes the
//!   number; an aborted consumer leaves a gap, and the UNIQUE
//!   constraint plus a bounded retry covers out-of-band rows.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`sequence`] - Atomic per-namespace identifier counters
//! - [`repository`] - Repository implementations (bill, stock, order, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kirana_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/kirana.db")).await?;
//!
//! let bill = db.bills().create_bill(new_bill).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod sequence;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::DbError;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::bill::{BillRepository, BillTotals, NewBill, NewBillItem};
pub use repository::customer::{CustomerRepository, NewCustomer};
pub use repository::discount::DiscountRepository;
pub use repository::employee::{EmployeeRepository, NewEmployee};
pub use repository::order::{OrderItemRequest, OrderRepository, OrderRequest};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::stock::StockLedger;
