//! # Product Repository
//!
//! Catalog CRUD. Creation seeds the opening stock and writes the matching
//! audit entry in one transaction; deletion is a soft-delete so existing
//! bills keep a valid product reference.

use chrono::Utc;
use kirana_core::{CoreError, CoreResult, Money, Product};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbError;

// ============================================================================
// Input Types
// ============================================================================

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub brand: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub unit_price: Money,
    /// Initial stock; recorded as the product's first stock entry when
    /// positive.
    pub opening_stock: i64,
    pub low_stock_threshold: i64,
    pub barcode: Option<String>,
    /// Employee performing the creation, credited for the opening stock.
    pub created_by: i64,
}

// ============================================================================
// Product Repository
// ============================================================================

#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a product. When `opening_stock > 0` the matching stock-entry
    /// audit row is written in the same transaction.
    pub async fn create(&self, new: NewProduct) -> CoreResult<Product> {
        kirana_core::validate_name("name", &new.name)?;
        kirana_core::validate_name("brand", &new.brand)?;
        kirana_core::validate_amount("unit_price", new.unit_price.paise())?;
        if new.opening_stock < 0 {
            return Err(kirana_core::ValidationError::MustBeNonNegative {
                field: "opening_stock".into(),
            }
            .into());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products
                (name, brand, category, description, unit_price_paise,
                 current_stock, low_stock_threshold, barcode, is_active,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)
            RETURNING *
            "#,
        )
        .bind(&new.name)
        .bind(&new.brand)
        .bind(&new.category)
        .bind(&new.description)
        .bind(new.unit_price.paise())
        .bind(new.opening_stock)
        .bind(new.low_stock_threshold)
        .bind(&new.barcode)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if new.opening_stock > 0 {
            sqlx::query(
                r#"
                INSERT INTO stock_entries (product_id, quantity_added, added_by, entry_date)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(product.id)
            .bind(new.opening_stock)
            .bind(new.created_by)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            product_id = product.id,
            name = %product.name,
            opening_stock = new.opening_stock,
            "product created"
        );
        Ok(product)
    }

    pub async fn get_by_id(&self, id: i64) -> CoreResult<Product> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;

        product.ok_or_else(|| CoreError::ProductNotFound(id))
    }

    pub async fn find_by_barcode(&self, barcode: &str) -> CoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE barcode = ?1 AND is_active = 1",
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(product)
    }

    /// Active catalog, alphabetical.
    pub async fn list_active(&self) -> CoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(products)
    }

    /// Change the catalog price. Existing bill items keep their frozen
    /// prices; only future sales see the new one.
    pub async fn update_price(&self, id: i64, unit_price: Money) -> CoreResult<()> {
        kirana_core::validate_amount("unit_price", unit_price.paise())?;

        let result = sqlx::query(
            r#"
            UPDATE products
            SET unit_price_paise = ?2, updated_at = ?3
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(unit_price.paise())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id));
        }
        debug!(product_id = id, new_price = unit_price.paise(), "price updated");
        Ok(())
    }

    /// Soft-delete. The row stays so bill items keep a valid reference,
    /// but the product disappears from the active catalog and can no
    /// longer be sold or restocked.
    pub async fn soft_delete(&self, id: i64) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id));
        }
        info!(product_id = id, "product deactivated");
        Ok(())
    }

    pub async fn count_active(&self) -> CoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(count)
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
    use kirana_core::Role;

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

    fn sample(name: &str, stock: i64) -> NewProduct {
        NewProduct {
            name: name.into(),
            brand: "Tata".into(),
            category: Some("Grocery".into()),
            description: None,
            unit_price: Money::from_paise(12_500),
            opening_stock: stock,
            low_stock_threshold: 10,
            barcode: None,
            created_by: 1,
        }
    }

    #[tokio::test]
    async fn create_seeds_opening_stock_entry() {
        let db = setup().await;
        let product = db.products().create(sample("Salt 1kg", 25)).await.unwrap();

        assert_eq!(product.current_stock, 25);
        let entries = db.stock().entries(product.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity_added, 25);
    }

    #[tokio::test]
    async fn create_with_zero_stock_writes_no_entry() {
        let db = setup().await;
        let product = db.products().create(sample("Sugar 1kg", 0)).await.unwrap();

        assert_eq!(product.current_stock, 0);
        assert!(db.stock().entries(product.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_empty_name() {
        let db = setup().await;
        assert!(db.products().create(sample("", 5)).await.is_err());
    }

    #[tokio::test]
    async fn soft_delete_hides_from_active_list() {
        let db = setup().await;
        let product = db.products().create(sample("Tea 250g", 5)).await.unwrap();

        db.products().soft_delete(product.id).await.unwrap();
        assert!(db.products().list_active().await.unwrap().is_empty());
        // Row itself survives.
        let fetched = db.products().get_by_id(product.id).await.unwrap();
        assert!(!fetched.is_active);
        // Second delete reports not found.
        assert!(db.products().soft_delete(product.id).await.is_err());
    }

    #[tokio::test]
    async fn update_price_leaves_stock_alone() {
        let db = setup().await;
        let product = db.products().create(sample("Atta 5kg", 12)).await.unwrap();

        db.products()
            .update_price(product.id, Money::from_paise(27_500))
            .await
            .unwrap();

        let fetched = db.products().get_by_id(product.id).await.unwrap();
        assert_eq!(fetched.unit_price_paise, 27_500);
        assert_eq!(fetched.current_stock, 12);
    }

}
