//! # Repository Module
//!
//! Database repository implementations for Kirana POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                     │
//! │                                                                     │
//! │  The Repository pattern abstracts database access behind a clean    │
//! │  API. The request layer never writes SQL.                           │
//! │                                                                     │
//! │  Caller                                                             │
//! │     │  db.bills().create_bill(new_bill)                             │
//! │     ▼                                                               │
//! │  BillRepository                                                     │
//! │  ├── create_bill(&self, new_bill)   ← one transaction, all-or-     │
//! │  ├── get(&self, bill_no)              nothing, bounded retry        │
//! │  ├── cancel(&self, bill_no)                                         │
//! │  └── list(&self, page, limit)                                       │
//! │     │  SQL                                                          │
//! │     ▼                                                               │
//! │  SQLite Database                                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD and low-stock snapshots
//! - [`stock::StockLedger`] - Atomic stock deduction/replenishment + audit
//! - [`customer::CustomerRepository`] - Customers keyed by mobile
//! - [`discount::DiscountRepository`] - Global/tiered/per-customer discounts
//! - [`bill::BillRepository`] - The sale transaction coordinator
//! - [`order::OrderRepository`] - Public order intake (no stock effect)
//! - [`employee::EmployeeRepository`] - Employee records with role codes

pub mod bill;
pub mod customer;
pub mod discount;
pub mod employee;
pub mod order;
pub mod product;
pub mod stock;
