//! # Discount Repository
//!
//! Persistence for the three discount sources and the resolver that
//! turns them into a [`DiscountQuote`].
//!
//! Activating a global discount deactivates every prior active row and
//! inserts the new one inside a single transaction, so no reader ever
//! observes two active globals or a window with none when one was meant
//! to replace another.

use chrono::Utc;
use kirana_core::{discount, CoreError, CoreResult, Discount, DiscountQuote, DiscountRule};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbError;

// ============================================================================
// Discount Repository
// ============================================================================

#[derive(Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Global Discount
    // ========================================================================

    /// Replace the active global discount: deactivate all currently
    /// active rows, then insert the new active one, atomically.
    pub async fn set_global(&self, name: &str, percent_bps: i64) -> CoreResult<Discount> {
        kirana_core::validate_name("name", name)?;
        kirana_core::validate_percent_bps("percentage", percent_bps)?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        sqlx::query("UPDATE discounts SET is_active = 0 WHERE is_active = 1")
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

        let discount = sqlx::query_as::<_, Discount>(
            r#"
            INSERT INTO discounts (name, percent_bps, is_active, created_at)
            VALUES (?1, ?2, 1, ?3)
            RETURNING *
            "#,
        )
        .bind(name.trim())
        .bind(percent_bps)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        info!(discount_id = discount.id, percent_bps, "global discount set");
        Ok(discount)
    }

    /// Turn off the global discount entirely.
    pub async fn clear_global(&self) -> CoreResult<()> {
        sqlx::query("UPDATE discounts SET is_active = 0 WHERE is_active = 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        info!("global discount cleared");
        Ok(())
    }

    /// The single active global discount, if any.
    pub async fn active_global(&self) -> CoreResult<Option<Discount>> {
        let discount = sqlx::query_as::<_, Discount>(
            "SELECT * FROM discounts WHERE is_active = 1 ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(discount)
    }

    // ========================================================================
    // Tier Rules
    // ========================================================================

    /// Add a tier rule over the half-open range `[min, max)` in paise,
    /// `max = 0` meaning unbounded.
    pub async fn add_rule(
        &self,
        min_amount_paise: i64,
        max_amount_paise: i64,
        percent_bps: i64,
    ) -> CoreResult<DiscountRule> {
        kirana_core::validate_amount("min_amount", min_amount_paise)?;
        kirana_core::validate_amount("max_amount", max_amount_paise)?;
        kirana_core::validate_percent_bps("percentage", percent_bps)?;
        if max_amount_paise != 0 && max_amount_paise <= min_amount_paise {
            return Err(kirana_core::ValidationError::OutOfRange {
                field: "max_amount".into(),
                min: min_amount_paise + 1,
                max: i64::MAX,
            }
            .into());
        }

        let rule = sqlx::query_as::<_, DiscountRule>(
            r#"
            INSERT INTO discount_rules (min_amount_paise, max_amount_paise, percent_bps, is_active)
            VALUES (?1, ?2, ?3, 1)
            RETURNING *
            "#,
        )
        .bind(min_amount_paise)
        .bind(max_amount_paise)
        .bind(percent_bps)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        info!(rule_id = rule.id, min_amount_paise, max_amount_paise, percent_bps, "discount rule added");
        Ok(rule)
    }

    pub async fn set_rule_active(&self, id: i64, active: bool) -> CoreResult<()> {
        let result = sqlx::query("UPDATE discount_rules SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!("discount rule {id} not found")));
        }
        Ok(())
    }

    pub async fn active_rules(&self) -> CoreResult<Vec<DiscountRule>> {
        let rules = sqlx::query_as::<_, DiscountRule>(
            "SELECT * FROM discount_rules WHERE is_active = 1 ORDER BY min_amount_paise",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(rules)
    }

    // ========================================================================
    // Resolver
    // ========================================================================

    /// Resolve all three candidate discounts for a cart.
    ///
    /// The three sources stay independent in the returned quote; the
    /// billing call site decides which (if any) applies. An unknown
    /// `customer_id` contributes 0 rather than failing the quote.
    pub async fn quote(
        &self,
        customer_id: Option<i64>,
        cart_total: kirana_core::Money,
    ) -> CoreResult<DiscountQuote> {
        let global_bps = self
            .active_global()
            .await?
            .map(|d| d.percent_bps)
            .unwrap_or(0);

        let rules = self.active_rules().await?;
        let rule_bps = discount::best_rule_bps(&rules, cart_total);

        let customer_bps = match customer_id {
            Some(id) => {
                sqlx::query_scalar::<_, i64>("SELECT discount_bps FROM customers WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(DbError::from)?
                    .unwrap_or(0)
            }
            None => 0,
        };

        let quote = DiscountQuote {
            global_bps,
            rule_bps,
            customer_bps,
        };
        debug!(?quote, cart_total = cart_total.paise(), "discount quote resolved");
        Ok(quote)
    }
}

// ============================================================================
// Tests
// ============================================================================
