//! # Order Repository (Public Order Intake)
//!
//! Provisional orders from the public storefront. An order captures who
//! wants what; it reserves nothing and deducts nothing. Stock moves only
//! when staff later ring the order up as a bill.
//!
//! The customer record is upserted by mobile number, the order number
//! comes from the dated `order:` sequence namespace, and the estimated
//! total is computed from current catalog prices at submission time
//! (deliberately not frozen; the bill freezes prices later).

use chrono::Utc;
use kirana_core::{
    sequence, CoreError, CoreResult, CustomerOrder, OrderItem, OrderStatus, ValidationError,
    MAX_LINE_ITEMS, MAX_SEQUENCE_RETRIES,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbError;
use crate::repository::customer::{CustomerRepository, NewCustomer};
use crate::sequence::next_in_namespace;

// ============================================================================
// Input Types
// ============================================================================

/// One requested line: product and quantity, nothing else. Prices are
/// not part of an order request.
#[derive(Debug, Clone)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

/// A public order submission.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub customer: NewCustomer,
    pub items: Vec<OrderItemRequest>,
}

// ============================================================================
// Order Repository
// ============================================================================

#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Accept a public order: upsert the customer, generate the order
    /// number, snapshot an estimated total from current prices, store
    /// the requested lines. Stock is untouched.
    pub async fn submit(&self, req: OrderRequest) -> CoreResult<CustomerOrder> {
        if req.items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".into(),
            }
            .into());
        }
        if req.items.len() > MAX_LINE_ITEMS {
            return Err(ValidationError::OutOfRange {
                field: "items".into(),
                min: 1,
                max: MAX_LINE_ITEMS as i64,
            }
            .into());
        }
        for item in &req.items {
            kirana_core::validate_quantity(item.quantity)?;
        }

        let customer = CustomerRepository::new(self.pool.clone())
            .find_or_create(req.customer.clone())
            .await?;

        for attempt in 1..=MAX_SEQUENCE_RETRIES {
            match self.try_submit(customer.id, &req.items).await {
                Ok(order) => {
                    info!(
                        order_no = %order.order_no,
                        customer_id = customer.id,
                        items = req.items.len(),
                        "order submitted"
                    );
                    return Ok(order);
                }
                Err(CoreError::DuplicateIdentifier(order_no)) => {
                    warn!(attempt, order_no = %order_no, "order number collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::Conflict(
            "order number generation kept colliding".into(),
        ))
    }

    async fn try_submit(
        &self,
        customer_id: i64,
        items: &[OrderItemRequest],
    ) -> CoreResult<CustomerOrder> {
        let now = Utc::now();
        let today = now.date_naive();

        // Counter advance commits on its own connection so a rolled-back
        // submission cannot rewind it; a retry draws a fresh number.
        let seq = {
            let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
            next_in_namespace(&mut conn, &sequence::order_namespace(today)).await?
        };
        let order_no = sequence::format_order_no(today, seq);

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // Estimate from current catalog prices. An unknown or inactive
        // product rejects the whole submission.
        let mut estimated: i64 = 0;
        for item in items {
            let price: Option<i64> = sqlx::query_scalar(
                "SELECT unit_price_paise FROM products WHERE id = ?1 AND is_active = 1",
            )
            .bind(item.product_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DbError::from)?;

            match price {
                Some(p) => estimated += p.saturating_mul(item.quantity),
                None => {
                    tx.rollback().await.ok();
                    return Err(CoreError::ProductNotFound(item.product_id));
                }
            }
        }

        let inserted = sqlx::query_as::<_, CustomerOrder>(
            r#"
            INSERT INTO customer_orders
                (order_no, customer_id, order_date, status, total_estimated_paise)
            VALUES (?1, ?2, ?3, 'PENDING', ?4)
            RETURNING *
            "#,
        )
        .bind(&order_no)
        .bind(customer_id)
        .bind(now)
        .bind(estimated)
        .fetch_one(&mut *tx)
        .await;

        let order = match inserted {
            Ok(order) => order,
            Err(e) => {
                let db_err = DbError::from(e);
                tx.rollback().await.ok();
                return if db_err.is_unique_violation() {
                    Err(CoreError::DuplicateIdentifier(order_no))
                } else {
                    Err(db_err.into())
                };
            }
        };

        for item in items {
            sqlx::query("INSERT INTO order_items (order_id, product_id, quantity) VALUES (?1, ?2, ?3)")
                .bind(order.id)
                .bind(item.product_id)
                .bind(item.quantity)
                .execute(&mut *tx)
                .await
                .map_err(DbError::from)?;
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(order)
    }

    // ========================================================================
    // Status Transitions
    // ========================================================================

    /// Move an order through its state machine. Only PENDING orders can
    /// move, to COMPLETED or CANCELLED; anything else is rejected.
    ///
    /// The write is a single conditional UPDATE keyed on the PENDING
    /// status, so a racing transition cannot overwrite a terminal state.
    pub async fn update_status(&self, order_no: &str, next: OrderStatus) -> CoreResult<()> {
        if !OrderStatus::Pending.can_transition_to(next) {
            // No state permits this target; report against the stored row.
            let current = self.get(order_no).await?.status;
            return Err(CoreError::InvalidStatusTransition {
                entity: "order",
                id: order_no.to_string(),
                current: format!("{current:?}").to_uppercase(),
                requested: format!("{next:?}").to_uppercase(),
            });
        }

        let result = sqlx::query(
            "UPDATE customer_orders SET status = ?2 WHERE order_no = ?1 AND status = 'PENDING'",
        )
        .bind(order_no)
        .bind(next)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM customer_orders WHERE order_no = ?1")
                    .bind(order_no)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(DbError::from)?;

            return match current {
                Some(current) => Err(CoreError::InvalidStatusTransition {
                    entity: "order",
                    id: order_no.to_string(),
                    current,
                    requested: format!("{next:?}").to_uppercase(),
                }),
                None => Err(CoreError::OrderNotFound(order_no.to_string())),
            };
        }

        info!(order_no, status = ?next, "order status updated");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, order_no: &str) -> CoreResult<CustomerOrder> {
        let order =
            sqlx::query_as::<_, CustomerOrder>("SELECT * FROM customer_orders WHERE order_no = ?1")
                .bind(order_no)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::from)?;

        order.ok_or_else(|| CoreError::OrderNotFound(order_no.to_string()))
    }

    pub async fn items(&self, order_id: i64) -> CoreResult<Vec<OrderItem>> {
        let items =
            sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ?1 ORDER BY id")
                .bind(order_id)
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::from)?;

        Ok(items)
    }

    /// Orders in a given status, oldest first so staff work the queue
    /// in arrival order.
    pub async fn list_by_status(&self, status: OrderStatus) -> CoreResult<Vec<CustomerOrder>> {
        let orders = sqlx::query_as::<_, CustomerOrder>(
            "SELECT * FROM customer_orders WHERE status = ?1 ORDER BY order_date ASC, id ASC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(orders)
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

    async fn seed_product(db: &Database, name: &str, price: i64, stock: i64) -> i64 {
        db.products()
            .create(NewProduct {
                name: name.into(),
                brand: "Amul".into(),
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

    fn walk_in() -> NewCustomer {
        NewCustomer {
            name: "Meena Iyer".into(),
            mobile: "9000011122".into(),
            address: Some("7 Temple Street".into()),
            whatsapp_opt_in: false,
        }
    }

    #[tokio::test]
    async fn submit_creates_order_without_touching_stock() {
        let db = setup().await;
        let butter = seed_product(&db, "Butter 500g", 28_500, 8).await;

        let order = db
            .orders()
            .submit(OrderRequest {
                customer: walk_in(),
                items: vec![OrderItemRequest {
                    product_id: butter,
                    quantity: 3,
                }],
            })
            .await
            .unwrap();

        let today = Utc::now().date_naive().format("%Y%m%d").to_string();
        assert_eq!(order.order_no, format!("ORD-{today}-00001"));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_estimated_paise, 3 * 28_500);
        // No stock effect.
        assert_eq!(db.stock().current_stock(butter).await.unwrap(), 8);

        let items = db.orders().items(order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
    }

    #[tokio::test]
    async fn repeat_customer_is_reused_by_mobile() {
        let db = setup().await;
        let butter = seed_product(&db, "Butter 500g", 28_500, 8).await;
        let request = |qty| OrderRequest {
            customer: walk_in(),
            items: vec![OrderItemRequest {
                product_id: butter,
                quantity: qty,
            }],
        };

        let first = db.orders().submit(request(1)).await.unwrap();
        let second = db.orders().submit(request(2)).await.unwrap();

        assert_eq!(first.customer_id, second.customer_id);
        assert_ne!(first.order_no, second.order_no);
    }

    #[tokio::test]
    async fn order_for_unknown_product_is_rejected() {
        let db = setup().await;
        let err = db
            .orders()
            .submit(OrderRequest {
                customer: walk_in(),
                items: vec![OrderItemRequest {
                    product_id: 777,
                    quantity: 1,
                }],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ProductNotFound(777)));
    }

    #[tokio::test]
    async fn empty_order_is_rejected() {
        let db = setup().await;
        let err = db
            .orders()
            .submit(OrderRequest {
                customer: walk_in(),
                items: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn status_machine_allows_only_pending_transitions() {
        let db = setup().await;
        let butter = seed_product(&db, "Butter 500g", 28_500, 8).await;
        let order = db
            .orders()
            .submit(OrderRequest {
                customer: walk_in(),
                items: vec![OrderItemRequest {
                    product_id: butter,
                    quantity: 1,
                }],
            })
            .await
            .unwrap();

        db.orders()
            .update_status(&order.order_no, OrderStatus::Completed)
            .await
            .unwrap();

        // Terminal; cannot move again.
        let err = db
            .orders()
            .update_status(&order.order_no, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatusTransition { .. }));

        let err = db
            .orders()
            .update_status("ORD-20200101-00001", OrderStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn out_of_band_order_row_is_skipped_on_retry() {
        let db = setup().await;
        let butter = seed_product(&db, "Butter 500g", 28_500, 8).await;
        let today = Utc::now().date_naive().format("%Y%m%d").to_string();

        // A row squatting on the first number without having advanced
        // the counter must cost one retry, not brick the day's numbering.
        let squatter = db.customers().find_or_create(walk_in()).await.unwrap();
        sqlx::query(
            r#"
            INSERT INTO customer_orders (order_no, customer_id, order_date, total_estimated_paise)
            VALUES (?1, ?2, ?3, 0)
            "#,
        )
        .bind(format!("ORD-{today}-00001"))
        .bind(squatter.id)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();

        let order = db
            .orders()
            .submit(OrderRequest {
                customer: walk_in(),
                items: vec![OrderItemRequest {
                    product_id: butter,
                    quantity: 1,
                }],
            })
            .await
            .unwrap();

        assert_eq!(order.order_no, format!("ORD-{today}-00002"));
    }

    #[tokio::test]
    async fn rejected_transition_never_overwrites_terminal_status() {
        let db = setup().await;
        let butter = seed_product(&db, "Butter 500g", 28_500, 8).await;
        let order = db
            .orders()
            .submit(OrderRequest {
                customer: walk_in(),
                items: vec![OrderItemRequest {
                    product_id: butter,
                    quantity: 1,
                }],
            })
            .await
            .unwrap();

        db.orders()
            .update_status(&order.order_no, OrderStatus::Completed)
            .await
            .unwrap();

        // The late cancel loses the race and the stored row keeps its
        // terminal state; the error reports what is actually stored.
        let err = db
            .orders()
            .update_status(&order.order_no, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        match err {
            CoreError::InvalidStatusTransition { current, .. } => assert_eq!(current, "COMPLETED"),
            other => panic!("expected InvalidStatusTransition, got {other:?}"),
        }
        assert_eq!(
            db.orders().get(&order.order_no).await.unwrap().status,
            OrderStatus::Completed
        );
    }

    #[tokio::test]
    async fn pending_queue_lists_in_arrival_order() {
        let db = setup().await;
        let butter = seed_product(&db, "Butter 500g", 28_500, 8).await;
        let request = |mobile: &str| OrderRequest {
            customer: NewCustomer {
                mobile: mobile.into(),
                ..walk_in()
            },
            items: vec![OrderItemRequest {
                product_id: butter,
                quantity: 1,
            }],
        };

        let a = db.orders().submit(request("9000011122")).await.unwrap();
        let b = db.orders().submit(request("9000033344")).await.unwrap();
        db.orders()
            .update_status(&a.order_no, OrderStatus::Cancelled)
            .await
            .unwrap();

        let pending = db.orders().list_by_status(OrderStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].order_no, b.order_no);
    }
}
