//! # Bill Repository (Sale Transaction Coordinator)
//!
//! The multi-step sale is the one place where several tables must move
//! together: the bill header, one stock deduction per line item, and one
//! bill-item row per line item. All of it runs inside a single SQLite
//! transaction; any failure (insufficient stock, unknown product, bad
//! line totals) rolls the whole sale back.
//!
//! ## Sale Flow
//! ```text
//! validate input (pure, before any write)
//!    │
//!    ▼
//! next bill sequence (own committed statement)
//!    │
//!    ▼
//! BEGIN ──► INSERT bill header
//!    │            │ UNIQUE collision?
//!    │            ├── yes: ROLLBACK, retry with a fresh number (≤3)
//!    │            ▼
//!    │   for each line item:
//!    │      deduct stock (conditional UPDATE)
//!    │      INSERT bill_item (frozen price)
//!    │            │ any failure?
//!    │            ├── yes: ROLLBACK, surface error
//!    ▼            ▼
//! COMMIT ◄────────┘
//! ```
//!
//! The sequence advance deliberately commits outside the sale
//! transaction: a rolled-back sale leaves a gap in the numbering, and a
//! retry always draws a fresh number instead of regenerating the one
//! that just collided.
//!
//! Header totals (total, discount, gst, net payable) are computed by the
//! billing call site and stored verbatim; this module checks their shape
//! (non-negative, line totals consistent) but does not re-derive the
//! discount choice.

use chrono::{DateTime, Utc};
use kirana_core::{
    sequence, Bill, BillItem, CoreError, CoreResult, PaymentMode, ValidationError,
    MAX_LINE_ITEMS, MAX_SEQUENCE_RETRIES,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbError;
use crate::repository::stock::StockLedger;
use crate::sequence::next_in_namespace;

// ============================================================================
// Input Types
// ============================================================================

/// One line of a sale. Unit price and line total are what the counter
/// quoted at sale time; they become the frozen snapshot on the bill item.
#[derive(Debug, Clone)]
pub struct NewBillItem {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_paise: i64,
    pub total_paise: i64,
}

/// Header totals as computed by the billing call site.
#[derive(Debug, Clone, Copy)]
pub struct BillTotals {
    pub total_paise: i64,
    pub discount_paise: i64,
    pub gst_paise: i64,
    pub net_payable_paise: i64,
}

/// Input for creating a bill.
#[derive(Debug, Clone)]
pub struct NewBill {
    pub customer_id: Option<i64>,
    /// Employee issuing the bill.
    pub billed_by: i64,
    /// Optional back-reference to the customer order this bill settles.
    pub order_no: Option<String>,
    pub payment_mode: PaymentMode,
    pub items: Vec<NewBillItem>,
    pub totals: BillTotals,
}

// ============================================================================
// Bill Repository
// ============================================================================

#[derive(Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Sale Transaction
    // ========================================================================

    /// Execute a sale: insert the bill, deduct stock for every line item
    /// and freeze line prices, all-or-nothing.
    ///
    /// Retries up to [`MAX_SEQUENCE_RETRIES`] times when the generated
    /// bill number collides with a concurrently committed bill, then
    /// surfaces [`CoreError::Conflict`].
    pub async fn create_bill(&self, new: NewBill) -> CoreResult<Bill> {
        Self::validate(&new)?;

        for attempt in 1..=MAX_SEQUENCE_RETRIES {
            match self.try_create(&new).await {
                Ok(bill) => {
                    info!(
                        bill_no = %bill.bill_no,
                        items = new.items.len(),
                        net_payable_paise = bill.net_payable_paise,
                        "bill created"
                    );
                    return Ok(bill);
                }
                Err(CoreError::DuplicateIdentifier(bill_no)) => {
                    warn!(attempt, bill_no = %bill_no, "bill number collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::Conflict(
            "bill number generation kept colliding".into(),
        ))
    }

    /// Pure input checks, run before any write.
    fn validate(new: &NewBill) -> CoreResult<()> {
        if new.items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".into(),
            }
            .into());
        }
        if new.items.len() > MAX_LINE_ITEMS {
            return Err(ValidationError::OutOfRange {
                field: "items".into(),
                min: 1,
                max: MAX_LINE_ITEMS as i64,
            }
            .into());
        }

        for item in &new.items {
            kirana_core::validate_quantity(item.quantity)?;
            kirana_core::validate_amount("unit_price", item.unit_price_paise)?;
            let expected = item.unit_price_paise.saturating_mul(item.quantity);
            if item.total_paise != expected {
                return Err(ValidationError::LineTotalMismatch {
                    product_id: item.product_id,
                    expected,
                    got: item.total_paise,
                }
                .into());
            }
        }

        kirana_core::validate_amount("total_amount", new.totals.total_paise)?;
        kirana_core::validate_amount("discount_amount", new.totals.discount_paise)?;
        kirana_core::validate_amount("gst_amount", new.totals.gst_paise)?;
        kirana_core::validate_amount("net_payable", new.totals.net_payable_paise)?;
        Ok(())
    }

    async fn try_create(&self, new: &NewBill) -> CoreResult<Bill> {
        let now = Utc::now();
        let today = now.date_naive();

        // The counter advance commits on its own connection before the
        // sale transaction begins; rolling the sale back must not rewind
        // the counter, or a retry would regenerate the colliding number.
        let seq = {
            let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
            next_in_namespace(&mut conn, &sequence::bill_namespace(today)).await?
        };
        let bill_no = sequence::format_bill_no(today, seq);

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let inserted = sqlx::query_as::<_, Bill>(
            r#"
            INSERT INTO bills
                (bill_no, order_no, bill_date, customer_id, billed_by,
                 total_paise, discount_paise, gst_paise, net_payable_paise,
                 payment_mode, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'PAID')
            RETURNING *
            "#,
        )
        .bind(&bill_no)
        .bind(&new.order_no)
        .bind(now)
        .bind(new.customer_id)
        .bind(new.billed_by)
        .bind(new.totals.total_paise)
        .bind(new.totals.discount_paise)
        .bind(new.totals.gst_paise)
        .bind(new.totals.net_payable_paise)
        .bind(new.payment_mode)
        .fetch_one(&mut *tx)
        .await;

        let bill = match inserted {
            Ok(bill) => bill,
            Err(e) => {
                let db_err = DbError::from(e);
                tx.rollback().await.ok();
                return if db_err.is_unique_violation() {
                    Err(CoreError::DuplicateIdentifier(bill_no))
                } else {
                    Err(db_err.into())
                };
            }
        };

        for item in &new.items {
            // Conditional deduction; failure aborts the whole sale.
            if let Err(e) = StockLedger::deduct(&mut *tx, item.product_id, item.quantity).await {
                tx.rollback().await.ok();
                return Err(e);
            }

            let result = sqlx::query(
                r#"
                INSERT INTO bill_items (bill_id, product_id, quantity, unit_price_paise, total_paise)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(bill.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_paise)
            .bind(item.total_paise)
            .execute(&mut *tx)
            .await;

            if let Err(e) = result {
                let db_err = DbError::from(e);
                tx.rollback().await.ok();
                return Err(db_err.into());
            }
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(bill)
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Transition a bill PAID -> CANCELLED. Stock is NOT restored; any
    /// physical return is handled as a separate stock addition.
    pub async fn cancel(&self, bill_no: &str) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE bills SET status = 'CANCELLED' WHERE bill_no = ?1 AND status = 'PAID'",
        )
        .bind(bill_no)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT status FROM bills WHERE bill_no = ?1")
                    .bind(bill_no)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(DbError::from)?;

            return match exists {
                Some(current) => Err(CoreError::InvalidStatusTransition {
                    entity: "bill",
                    id: bill_no.to_string(),
                    current,
                    requested: "CANCELLED".to_string(),
                }),
                None => Err(CoreError::BillNotFound(bill_no.to_string())),
            };
        }
        info!(bill_no, "bill cancelled");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, bill_no: &str) -> CoreResult<Bill> {
        let bill = sqlx::query_as::<_, Bill>("SELECT * FROM bills WHERE bill_no = ?1")
            .bind(bill_no)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;

        bill.ok_or_else(|| CoreError::BillNotFound(bill_no.to_string()))
    }

    /// Line items of a bill, in insertion order.
    pub async fn items(&self, bill_id: i64) -> CoreResult<Vec<BillItem>> {
        let items = sqlx::query_as::<_, BillItem>(
            "SELECT * FROM bill_items WHERE bill_id = ?1 ORDER BY id",
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(items)
    }

    /// Pages through bills, newest first. `page` starts at 1.
    pub async fn list(&self, page: i64, limit: i64) -> CoreResult<Vec<Bill>> {
        let offset = (page.max(1) - 1) * limit;
        let bills = sqlx::query_as::<_, Bill>(
            "SELECT * FROM bills ORDER BY bill_date DESC, id DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(bills)
    }

    /// Sum of net payables over PAID bills in `[from, to)`. Cancelled
    /// bills are excluded; a pure read, safe to repeat.
    pub async fn revenue_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<i64> {
        let revenue: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(net_payable_paise), 0)
            FROM bills
            WHERE status = 'PAID' AND bill_date >= ?1 AND bill_date < ?2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(revenue)
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
    use chrono::Duration;
    use kirana_core::{BillStatus, Money, Role};

    async fn setup() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let emp = db
            .employees()
            .create(NewEmployee {
                username: "asha".into(),
                mobile: None,
                password_hash: "hash".into(),
                role: Role::Biller,
            })
            .await
            .unwrap();
        (db, emp.id)
    }

    async fn seed_product(db: &Database, name: &str, price: i64, stock: i64) -> i64 {
        db.products()
            .create(NewProduct {
                name: name.into(),
                brand: "Tata".into(),
                category: None,
                description: None,
                unit_price: Money::from_paise(price),
                opening_stock: stock,
                low_stock_threshold: 2,
                barcode: None,
                created_by: 1,
            })
            .await
            .unwrap()
            .id
    }

    fn line(product_id: i64, quantity: i64, unit_price: i64) -> NewBillItem {
        NewBillItem {
            product_id,
            quantity,
            unit_price_paise: unit_price,
            total_paise: unit_price * quantity,
        }
    }

    fn simple_bill(billed_by: i64, items: Vec<NewBillItem>) -> NewBill {
        let total: i64 = items.iter().map(|i| i.total_paise).sum();
        NewBill {
            customer_id: None,
            billed_by,
            order_no: None,
            payment_mode: PaymentMode::Cash,
            totals: BillTotals {
                total_paise: total,
                discount_paise: 0,
                gst_paise: 0,
                net_payable_paise: total,
            },
            items,
        }
    }

    #[tokio::test]
    async fn sale_deducts_stock_and_numbers_bills_sequentially() {
        let (db, emp) = setup().await;
        let rice = seed_product(&db, "Rice 5kg", 64_900, 10).await;

        let first = db
            .bills()
            .create_bill(simple_bill(emp, vec![line(rice, 2, 64_900)]))
            .await
            .unwrap();
        let second = db
            .bills()
            .create_bill(simple_bill(emp, vec![line(rice, 1, 64_900)]))
            .await
            .unwrap();

        let today = Utc::now().date_naive().format("%Y%m%d").to_string();
        assert_eq!(first.bill_no, format!("B-{today}-00001"));
        assert_eq!(second.bill_no, format!("B-{today}-00002"));
        assert_eq!(db.stock().current_stock(rice).await.unwrap(), 7);
        assert_eq!(first.status, BillStatus::Paid);
    }

    #[tokio::test]
    async fn failed_second_item_rolls_back_whole_sale() {
        let (db, emp) = setup().await;
        let rice = seed_product(&db, "Rice 5kg", 64_900, 10).await;
        let oil = seed_product(&db, "Oil 1L", 18_000, 1).await;

        let err = db
            .bills()
            .create_bill(simple_bill(
                emp,
                vec![line(rice, 2, 64_900), line(oil, 5, 18_000)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InsufficientStock { .. }));
        // First item's deduction was rolled back with everything else.
        assert_eq!(db.stock().current_stock(rice).await.unwrap(), 10);
        assert_eq!(db.stock().current_stock(oil).await.unwrap(), 1);
        assert!(db.bills().list(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sequential_sales_cannot_oversell() {
        // 5 in stock; selling 3 then 3 must fail the second sale.
        let (db, emp) = setup().await;
        let ghee = seed_product(&db, "Ghee 500g", 52_000, 5).await;

        db.bills()
            .create_bill(simple_bill(emp, vec![line(ghee, 3, 52_000)]))
            .await
            .unwrap();
        let err = db
            .bills()
            .create_bill(simple_bill(emp, vec![line(ghee, 3, 52_000)]))
            .await
            .unwrap_err();

        match err {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(db.stock().current_stock(ghee).await.unwrap(), 2);
    }

    /// Plants a bill row directly, bypassing the sequence counter, the
    /// way a manual insert or restored backup would.
    async fn block_bill_no(db: &Database, emp: i64, bill_no: &str) {
        sqlx::query(
            r#"
            INSERT INTO bills (bill_no, bill_date, billed_by, total_paise, net_payable_paise)
            VALUES (?1, ?2, ?3, 0, 0)
            "#,
        )
        .bind(bill_no)
        .bind(Utc::now())
        .bind(emp)
        .execute(db.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn out_of_band_bill_row_is_skipped_on_retry() {
        let (db, emp) = setup().await;
        let rice = seed_product(&db, "Rice 5kg", 64_900, 10).await;
        let today = Utc::now().date_naive().format("%Y%m%d").to_string();

        // A row squats on the first number without having advanced the
        // counter. The first attempt collides; the retry must draw the
        // next number instead of regenerating the same one.
        block_bill_no(&db, emp, &format!("B-{today}-00001")).await;

        let bill = db
            .bills()
            .create_bill(simple_bill(emp, vec![line(rice, 1, 64_900)]))
            .await
            .unwrap();

        assert_eq!(bill.bill_no, format!("B-{today}-00002"));
        assert_eq!(db.stock().current_stock(rice).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn exhausted_number_collisions_surface_as_conflict() {
        let (db, emp) = setup().await;
        let rice = seed_product(&db, "Rice 5kg", 64_900, 10).await;
        let today = Utc::now().date_naive().format("%Y%m%d").to_string();

        for n in 1..=MAX_SEQUENCE_RETRIES {
            block_bill_no(&db, emp, &format!("B-{today}-0000{n}")).await;
        }

        let err = db
            .bills()
            .create_bill(simple_bill(emp, vec![line(rice, 1, 64_900)]))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Conflict(_)));
        // Every attempt aborted before the deduction could run.
        assert_eq!(db.stock().current_stock(rice).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn concurrent_sales_get_distinct_bill_numbers() {
        let (db, emp) = setup().await;
        let rice = seed_product(&db, "Rice 5kg", 64_900, 100).await;

        let bills = db.bills();
        let (a, b) = tokio::join!(
            bills.create_bill(simple_bill(emp, vec![line(rice, 1, 64_900)])),
            bills.create_bill(simple_bill(emp, vec![line(rice, 1, 64_900)])),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.bill_no, b.bill_no);
        assert_eq!(db.stock().current_stock(rice).await.unwrap(), 98);
    }

    #[tokio::test]
    async fn bill_items_keep_frozen_prices() {
        let (db, emp) = setup().await;
        let rice = seed_product(&db, "Rice 5kg", 64_900, 10).await;

        let bill = db
            .bills()
            .create_bill(simple_bill(emp, vec![line(rice, 2, 64_900)]))
            .await
            .unwrap();

        db.products()
            .update_price(rice, Money::from_paise(70_000))
            .await
            .unwrap();

        let items = db.bills().items(bill.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price_paise, 64_900);
        assert_eq!(items[0].total_paise, 129_800);
    }

    #[tokio::test]
    async fn cancel_keeps_stock_and_is_terminal() {
        let (db, emp) = setup().await;
        let rice = seed_product(&db, "Rice 5kg", 64_900, 10).await;

        let bill = db
            .bills()
            .create_bill(simple_bill(emp, vec![line(rice, 4, 64_900)]))
            .await
            .unwrap();
        db.bills().cancel(&bill.bill_no).await.unwrap();

        // No stock reversal on cancellation.
        assert_eq!(db.stock().current_stock(rice).await.unwrap(), 6);
        assert_eq!(
            db.bills().get(&bill.bill_no).await.unwrap().status,
            BillStatus::Cancelled
        );
        // Cancelling again is an invalid transition.
        let err = db.bills().cancel(&bill.bill_no).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatusTransition { .. }));
        // Unknown bill is its own error.
        let err = db.bills().cancel("B-20200101-00001").await.unwrap_err();
        assert!(matches!(err, CoreError::BillNotFound(_)));
    }

    #[tokio::test]
    async fn empty_and_mismatched_input_is_rejected_before_writes() {
        let (db, emp) = setup().await;
        let rice = seed_product(&db, "Rice 5kg", 64_900, 10).await;

        let err = db.bills().create_bill(simple_bill(emp, vec![])).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let mut bad = simple_bill(emp, vec![line(rice, 2, 64_900)]);
        bad.items[0].total_paise = 1; // does not equal price * qty
        let err = db.bills().create_bill(bad).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::LineTotalMismatch { .. })
        ));
        assert_eq!(db.stock().current_stock(rice).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn revenue_excludes_cancelled_bills_and_repeats_cleanly() {
        let (db, emp) = setup().await;
        let rice = seed_product(&db, "Rice 5kg", 10_000, 20).await;

        let keep = db
            .bills()
            .create_bill(simple_bill(emp, vec![line(rice, 2, 10_000)]))
            .await
            .unwrap();
        let gone = db
            .bills()
            .create_bill(simple_bill(emp, vec![line(rice, 3, 10_000)]))
            .await
            .unwrap();
        db.bills().cancel(&gone.bill_no).await.unwrap();

        let from = Utc::now() - Duration::hours(1);
        let to = Utc::now() + Duration::hours(1);
        let revenue = db.bills().revenue_between(from, to).await.unwrap();
        assert_eq!(revenue, keep.net_payable_paise);
        // Reads do not mutate; a repeat sees the same number.
        assert_eq!(db.bills().revenue_between(from, to).await.unwrap(), revenue);
    }
}
