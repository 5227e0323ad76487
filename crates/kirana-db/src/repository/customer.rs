//! # Customer Repository
//!
//! Customers are keyed naturally by mobile number; `find_or_create`
//! backs the public order intake, where the same person may order many
//! times with the same mobile but a fresher name or address.

use chrono::Utc;
use kirana_core::{CoreError, CoreResult, Customer, ValidationError};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbError;

// ============================================================================
// Input Types
// ============================================================================

/// Input for creating (or upserting) a customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub mobile: String,
    pub address: Option<String>,
    pub whatsapp_opt_in: bool,
}

// ============================================================================
// Customer Repository
// ============================================================================

#[derive(Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a customer. Fails with a duplicate-mobile validation error
    /// when the mobile is already registered.
    pub async fn create(&self, new: NewCustomer) -> CoreResult<Customer> {
        kirana_core::validate_name("name", &new.name)?;
        kirana_core::validate_mobile(&new.mobile)?;

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (name, mobile, address, whatsapp_opt_in, discount_bps, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            RETURNING *
            "#,
        )
        .bind(new.name.trim())
        .bind(new.mobile.trim())
        .bind(&new.address)
        .bind(new.whatsapp_opt_in)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let db_err = DbError::from(e);
            if db_err.is_unique_violation() {
                CoreError::Validation(ValidationError::Duplicate {
                    field: "mobile".into(),
                    value: new.mobile.trim().to_string(),
                })
            } else {
                db_err.into()
            }
        })?;

        info!(customer_id = customer.id, mobile = %customer.mobile, "customer created");
        Ok(customer)
    }

    /// Upsert a customer by mobile: refresh name and address when the
    /// mobile is already registered, create the record otherwise.
    ///
    /// A single conflict-target upsert, so two first-time submissions
    /// racing on the same mobile both land on the same row instead of
    /// one losing to the UNIQUE constraint.
    pub async fn find_or_create(&self, new: NewCustomer) -> CoreResult<Customer> {
        kirana_core::validate_name("name", &new.name)?;
        kirana_core::validate_mobile(&new.mobile)?;

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (name, mobile, address, whatsapp_opt_in, discount_bps, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            ON CONFLICT (mobile) DO UPDATE SET
                name = excluded.name,
                address = COALESCE(excluded.address, customers.address),
                whatsapp_opt_in = excluded.whatsapp_opt_in
            RETURNING *
            "#,
        )
        .bind(new.name.trim())
        .bind(new.mobile.trim())
        .bind(&new.address)
        .bind(new.whatsapp_opt_in)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        debug!(customer_id = customer.id, mobile = %customer.mobile, "customer upserted");
        Ok(customer)
    }

    pub async fn get_by_id(&self, id: i64) -> CoreResult<Customer> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;

        customer.ok_or(CoreError::CustomerNotFound(id))
    }

    pub async fn find_by_mobile(&self, mobile: &str) -> CoreResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE mobile = ?1")
            .bind(mobile)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(customer)
    }

    /// Substring search over name and mobile, for the billing counter.
    pub async fn search(&self, query: &str, limit: i64) -> CoreResult<Vec<Customer>> {
        let pattern = format!("%{}%", query.trim());
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE name LIKE ?1 OR mobile LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(customers)
    }

    /// Set the flat per-customer discount, in basis points.
    pub async fn set_discount_bps(&self, id: i64, bps: i64) -> CoreResult<()> {
        kirana_core::validate_percent_bps("discount", bps)?;

        let result = sqlx::query("UPDATE customers SET discount_bps = ?2 WHERE id = ?1")
            .bind(id)
            .bind(bps)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::CustomerNotFound(id));
        }
        info!(customer_id = id, discount_bps = bps, "customer discount set");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
