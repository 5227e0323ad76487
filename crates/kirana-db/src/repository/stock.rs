//! # Stock Ledger
//!
//! Stock movements for the product catalog. Every change to
//! `products.current_stock` goes through this module so the quantity can
//! never observe an intermediate negative state.
//!
//! Deduction is a single conditional UPDATE: the `current_stock >= ?`
//! predicate makes check-and-deduct one atomic statement, so two sales
//! racing for the last unit cannot both win. Replenishment additionally
//! records a `stock_entries` audit row naming who added what, when.

use kirana_core::{CoreError, CoreResult, StockEntry};
use sqlx::{SqlitePool, SqliteConnection};
use tracing::{debug, info};

use crate::error::DbError;

// ============================================================================
// Stock Ledger
// ============================================================================

/// Stock ledger over the shared connection pool.
///
/// `deduct` is an associated function taking `&mut SqliteConnection` so the
/// sale coordinator can run it inside its own transaction. The instance
/// methods open their own transactions.
#[derive(Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Deduction (runs on the caller's transaction)
    // ========================================================================

    /// Deduct `quantity` units from a product, returning the remaining stock.
    ///
    /// The conditional UPDATE only matches when the product is active and has
    /// at least `quantity` units. When no row matches, a follow-up read
    /// distinguishes a missing/inactive product from insufficient stock so
    /// the caller can report which one it was.
    pub async fn deduct(
        conn: &mut SqliteConnection,
        product_id: i64,
        quantity: i64,
    ) -> CoreResult<i64> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET current_stock = current_stock - ?2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?1 AND is_active = 1 AND current_stock >= ?2
            RETURNING current_stock
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from)?;

        match remaining {
            Some(stock) => {
                debug!(product_id, quantity, remaining = stock, "stock deducted");
                Ok(stock)
            }
            None => {
                // Find out which precondition failed.
                let row: Option<(String, i64)> = sqlx::query_as(
                    "SELECT name, current_stock FROM products WHERE id = ?1 AND is_active = 1",
                )
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(DbError::from)?;

                match row {
                    Some((name, available)) => Err(CoreError::InsufficientStock {
                        product_id,
                        name,
                        available,
                        requested: quantity,
                    }),
                    None => Err(CoreError::ProductNotFound(product_id)),
                }
            }
        }
    }

    // ========================================================================
    // Replenishment
    // ========================================================================

    /// Add stock to a product and record the audit entry, atomically.
    ///
    /// Returns the stock level after the addition.
    pub async fn replenish(
        &self,
        product_id: i64,
        quantity: i64,
        added_by: i64,
    ) -> CoreResult<i64> {
        kirana_core::validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET current_stock = current_stock + ?2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?1 AND is_active = 1
            RETURNING current_stock
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let new_stock = match updated {
            Some(stock) => stock,
            None => return Err(CoreError::ProductNotFound(product_id)),
        };

        sqlx::query(
            r#"
            INSERT INTO stock_entries (product_id, quantity_added, added_by, entry_date)
            VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(added_by)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        info!(product_id, quantity, added_by, new_stock, "stock replenished");
        Ok(new_stock)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current stock level of a product, active or not.
    pub async fn current_stock(&self, product_id: i64) -> CoreResult<i64> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT current_stock FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;

        stock.ok_or_else(|| CoreError::ProductNotFound(product_id))
    }

    /// Active products at or below their alert threshold, most depleted
    /// first. A snapshot read outside any sale transaction.
    pub async fn low_stock(&self, limit: i64) -> CoreResult<Vec<kirana_core::Product>> {
        let products = sqlx::query_as::<_, kirana_core::Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1 AND current_stock <= low_stock_threshold
            ORDER BY current_stock ASC, name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(products)
    }

    /// Audit trail for a product, newest first.
    pub async fn entries(&self, product_id: i64) -> CoreResult<Vec<StockEntry>> {
        let entries = sqlx::query_as::<_, StockEntry>(
            r#"
            SELECT id, product_id, quantity_added, added_by, entry_date
            FROM stock_entries
            WHERE product_id = ?1
            ORDER BY entry_date DESC, id DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(entries)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::employee::NewEmployee;
    use crate::repository::product::NewProduct;
    use kirana_core::{Money, Role};

    /// Fresh in-memory database with one employee (id 1) to satisfy the
    /// stock-entry audit foreign key.
    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.employees()
            .create(NewEmployee {
                username: "asha".into(),
                mobile: None,
                password_hash: "hash".into(),
                role: Role::Inventory,
            })
            .await
            .unwrap();
        db
    }

    async fn seed_product(db: &Database, stock: i64) -> i64 {
        db.products()
            .create(NewProduct {
                name: "Basmati Rice 5kg".into(),
                brand: "India Gate".into(),
                category: Some("Grocery".into()),
                description: None,
                unit_price: Money::from_paise(64_900),
                opening_stock: stock,
                low_stock_threshold: 5,
                barcode: None,
                created_by: 1,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn deduct_reduces_stock() {
        let db = setup().await;
        let id = seed_product(&db, 10).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let remaining = StockLedger::deduct(&mut conn, id, 4).await.unwrap();
        drop(conn);
        assert_eq!(remaining, 6);
        assert_eq!(db.stock().current_stock(id).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn deduct_rejects_insufficient_stock() {
        let db = setup().await;
        let id = seed_product(&db, 3).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let err = StockLedger::deduct(&mut conn, id, 5).await.unwrap_err();
        match err {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        // Failed deduction leaves stock untouched.
        drop(conn);
        assert_eq!(db.stock().current_stock(id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn deduct_unknown_product_is_not_found() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let err = StockLedger::deduct(&mut conn, 9999, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn exact_stock_deducts_to_zero_then_fails() {
        let db = setup().await;
        let id = seed_product(&db, 5).await;

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(StockLedger::deduct(&mut conn, id, 5).await.unwrap(), 0);
        let err = StockLedger::deduct(&mut conn, id, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
    }

    #[tokio::test]
    async fn replenish_adds_stock_and_audit_entry() {
        let db = setup().await;
        let id = seed_product(&db, 2).await;

        let after = db.stock().replenish(id, 8, 1).await.unwrap();
        assert_eq!(after, 10);

        let entries = db.stock().entries(id).await.unwrap();
        // Opening stock wrote one entry, replenish another.
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].quantity_added, 8);
        assert_eq!(entries[0].added_by, 1);
    }

    #[tokio::test]
    async fn low_stock_snapshot_orders_by_depletion() {
        let db = setup().await;
        seed_product(&db, 50).await;
        let dal = seed_product(&db, 3).await;
        let ghee = seed_product(&db, 1).await;

        // Threshold is 5; the 50-stock product stays out.
        let low = db.stock().low_stock(10).await.unwrap();
        assert_eq!(low.len(), 2);
        assert_eq!(low[0].id, ghee);
        assert_eq!(low[1].id, dal);

        let capped = db.stock().low_stock(1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn replenish_rejects_non_positive_quantity() {
        let db = setup().await;
        let id = seed_product(&db, 2).await;

        assert!(db.stock().replenish(id, 0, 1).await.is_err());
        assert!(db.stock().replenish(id, -3, 1).await.is_err());
        assert_eq!(db.stock().current_stock(id).await.unwrap(), 2);
    }
}
