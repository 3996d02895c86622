//! # Seed Data Generator
//!
//! Populates a database with a demo flower catalogue, the attribute
//! vocabularies the product form offers, and an admin login.
//!
//! ## Usage
//! ```bash
//! # Seed ./petal_dev.db with the default admin
//! cargo run -p petal-db --bin seed
//!
//! # Specify database path and admin credentials
//! cargo run -p petal-db --bin seed -- --db ./data/petal.db \
//!     --admin-email owner@petal.vn --admin-password hoahong
//! ```

use std::env;

use petal_core::validation::{validate_password, validate_product_input};
use petal_core::{AttributeKind, ProductInput, Role};
use petal_db::{hash_password, Database, DbConfig};

/// (name, color, size, unit, sell price, cost price, max discount per unit)
const CATALOGUE: &[(&str, &str, &str, &str, i64, i64, Option<i64>)] = &[
    ("Rose", "red", "60cm", "stem", 15_000, 8_000, Some(2_000)),
    ("Rose", "white", "60cm", "stem", 15_000, 8_000, Some(2_000)),
    ("Rose", "pink", "40cm", "stem", 12_000, 6_000, Some(1_500)),
    ("Lily", "white", "70cm", "stem", 35_000, 20_000, Some(5_000)),
    ("Lily", "yellow", "70cm", "stem", 35_000, 20_000, None),
    ("Tulip", "purple", "40cm", "stem", 25_000, 15_000, Some(3_000)),
    ("Sunflower", "yellow", "80cm", "stem", 20_000, 11_000, None),
    ("Orchid", "white", "pot", "pot", 450_000, 300_000, Some(50_000)),
    ("Baby's breath", "white", "bunch", "bunch", 60_000, 35_000, Some(10_000)),
    ("Hydrangea", "blue", "head", "stem", 40_000, 25_000, None),
];

const QUALITIES: &[&str] = &["A", "B", "premium"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./petal_dev.db");
    let mut admin_email = String::from("admin@petal.local");
    let mut admin_password = String::from("petal-admin");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-email" => {
                if i + 1 < args.len() {
                    admin_email = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-password" => {
                if i + 1 < args.len() {
                    admin_password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Petal Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>             Database file path (default: ./petal_dev.db)");
                println!("      --admin-email <EMAIL>   Admin login (default: admin@petal.local)");
                println!("      --admin-password <PW>   Admin password (default: petal-admin)");
                println!("  -h, --help                  Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }
    validate_password(&admin_password)?;

    println!("🌱 Petal Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().list().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} products", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Adding attribute options...");
    let mut options = 0;
    for (name, color, size, unit, ..) in CATALOGUE {
        for (kind, value) in [
            (AttributeKind::Name, *name),
            (AttributeKind::Color, *color),
            (AttributeKind::Size, *size),
            (AttributeKind::Unit, *unit),
        ] {
            // repeated values across the catalogue are expected
            if db.options().add(kind, value).await.is_ok() {
                options += 1;
            }
        }
    }
    for quality in QUALITIES {
        if db.options().add(AttributeKind::Quality, quality).await.is_ok() {
            options += 1;
        }
    }
    println!("  ✓ {} options", options);

    println!("Adding products...");
    for (idx, (name, color, size, unit, sell, cost, cap)) in CATALOGUE.iter().enumerate() {
        let input = ProductInput {
            name: name.to_string(),
            color: color.to_string(),
            quality: QUALITIES[idx % 2].to_string(),
            size: size.to_string(),
            unit: unit.to_string(),
            quantity: ((idx * 37) % 120) as i64,
            sell_price: *sell,
            cost_price: *cost,
            max_discount_per_unit: *cap,
            image_url: None,
        };
        let input = validate_product_input(&input)?;

        match db.products().insert(&input).await {
            Ok(product) => println!("  ✓ {} × {}", product.label(), product.quantity),
            Err(e) => eprintln!("  ✗ {}: {}", name, e),
        }
    }

    println!();
    if db.identities().exists_by_email(&admin_email).await? {
        println!("⚠ Admin {} already exists", admin_email);
    } else {
        let hash = hash_password(&admin_password)?;
        let admin = db
            .identities()
            .create(&admin_email, &hash, Role::Admin, "Admin")
            .await?;
        println!("✓ Admin login {} ({})", admin.email, admin.id);
    }

    let roses = db.products().search("rose", 10).await?;
    println!("  Search 'rose': {} results", roses.len());

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
