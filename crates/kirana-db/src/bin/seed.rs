//! Seeds a fresh Kirana POS database with an admin employee and a small
//! demo catalog.
//!
//! ```bash
//! KIRANA_DB=./kirana.db cargo run -p kirana-db --bin seed
//! ```

use kirana_core::{Money, Role};
use kirana_db::{Database, DbConfig, NewCustomer, NewEmployee, NewProduct};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::var("KIRANA_DB").unwrap_or_else(|_| "kirana.db".to_string());
    info!(path = %path, "seeding database");

    let db = Database::new(DbConfig::new(&path)).await?;

    let admin = db
        .employees()
        .create(NewEmployee {
            username: "admin".into(),
            mobile: None,
            password_hash: "CHANGE-ME-ON-FIRST-LOGIN".into(),
            role: Role::Admin,
        })
        .await?;
    info!(employee_code = %admin.employee_code, "admin created");

    let catalog: &[(&str, &str, &str, i64, i64)] = &[
        ("Basmati Rice 5kg", "India Gate", "Grocery", 64_900, 40),
        ("Toor Dal 1kg", "Tata Sampann", "Grocery", 18_500, 60),
        ("Sunflower Oil 1L", "Fortune", "Grocery", 16_000, 50),
        ("Butter 500g", "Amul", "Dairy", 28_500, 25),
        ("Ghee 500g", "Amul", "Dairy", 52_000, 15),
        ("Tea 250g", "Red Label", "Beverages", 17_000, 30),
        ("Salt 1kg", "Tata", "Grocery", 2_800, 100),
    ];

    for (name, brand, category, price, stock) in catalog {
        let product = db
            .products()
            .create(NewProduct {
                name: (*name).into(),
                brand: (*brand).into(),
                category: Some((*category).into()),
                description: None,
                unit_price: Money::from_paise(*price),
                opening_stock: *stock,
                low_stock_threshold: 10,
                barcode: None,
                created_by: admin.id,
            })
            .await?;
        info!(product_id = product.id, name = %product.name, "product seeded");
    }

    db.customers()
        .create(NewCustomer {
            name: "Walk-in Demo Customer".into(),
            mobile: "9876543210".into(),
            address: None,
            whatsapp_opt_in: false,
        })
        .await?;

    db.discounts().add_rule(100_000, 0, 500).await?;
    info!("seed complete");

    db.close().await;
    Ok(())
}
