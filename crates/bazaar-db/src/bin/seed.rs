//! # Seed Data Generator
//!
//! Populates a development database with sellers' products and, optionally,
//! a demo shopper cart spanning several sellers.
//!
//! ## Usage
//! ```bash
//! # 6 sellers (default)
//! cargo run -p bazaar-db --bin seed
//!
//! # Custom database and a demo cart
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db --cart
//! ```
//!
//! ## Generated Data
//! Each seller is a local business with a handful of products:
//! - Unique seller id (UUID)
//! - Product price: $1.50 - $12.49
//! - Stock: 0 - 40 (some products sold out on purpose)

use chrono::Utc;
use std::env;
use uuid::Uuid;

use bazaar_core::{Money, Product};
use bazaar_db::{generate_product_id, Database, DbConfig};

/// Local businesses and what they sell: (business, [(product, unit)]).
const SELLERS: &[(&str, &[(&str, &str)])] = &[
    (
        "Hillside Apiary",
        &[
            ("Wildflower Honey", "jar"),
            ("Clover Honey", "jar"),
            ("Beeswax Candle", "each"),
            ("Honeycomb", "box"),
        ],
    ),
    (
        "Rye & Rise Bakery",
        &[
            ("Sourdough Loaf", "loaf"),
            ("Seeded Rye", "loaf"),
            ("Cinnamon Buns", "pack of 4"),
            ("Baguette", "each"),
        ],
    ),
    (
        "Green Acre Farm",
        &[
            ("Heirloom Tomatoes", "kg"),
            ("Free-Range Eggs", "dozen"),
            ("Rainbow Chard", "bunch"),
            ("New Potatoes", "kg"),
            ("Garlic", "bulb"),
        ],
    ),
    (
        "Curd Nerds Creamery",
        &[
            ("Aged Cheddar", "250 g"),
            ("Fresh Ricotta", "tub"),
            ("Goat Cheese", "log"),
        ],
    ),
    (
        "Orchard Row",
        &[
            ("Apple Cider", "bottle"),
            ("Pear Butter", "jar"),
            ("Honeycrisp Apples", "kg"),
        ],
    ),
    (
        "Spice Route Pantry",
        &[
            ("Smoked Paprika", "tin"),
            ("Garam Masala", "tin"),
            ("Chili Oil", "bottle"),
            ("Sea Salt Flakes", "jar"),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut seller_count: usize = SELLERS.len();
    let mut db_path = String::from("./bazaar_dev.db");
    let mut demo_cart = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sellers" | "-s" => {
                if i + 1 < args.len() {
                    seller_count = args[i + 1].parse().unwrap_or(SELLERS.len());
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--cart" | "-c" => demo_cart = true,
            "--help" | "-h" => {
                println!("Bazaar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!(
                    "  -s, --sellers <N>  Number of sellers to generate (default: {}, max: {})",
                    SELLERS.len(),
                    SELLERS.len()
                );
                println!("  -d, --db <PATH>    Database file path (default: ./bazaar_dev.db)");
                println!("  -c, --cart         Also fill a demo shopper cart across sellers");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let seller_count = seller_count.min(SELLERS.len());

    println!("🌱 Bazaar Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Sellers:  {}", seller_count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut generated: Vec<Product> = Vec::new();
    for (seller_idx, (business, products)) in SELLERS.iter().take(seller_count).enumerate() {
        let seller_id = Uuid::new_v4().to_string();
        println!("  {} ({})", business, seller_id);

        for (product_idx, (name, unit)) in products.iter().enumerate() {
            let product = generate_product(&seller_id, name, unit, seller_idx * 10 + product_idx);

            if let Err(e) = db.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.name, e);
                continue;
            }

            println!(
                "    {:<20} {:>8} / {:<10} stock {}",
                product.name,
                Money::from_cents(product.price_cents).to_string(),
                product.unit,
                product.stock_quantity
            );
            generated.push(product);
        }
    }

    println!();
    println!("✓ Generated {} products", generated.len());

    if demo_cart {
        let shopper_id = Uuid::new_v4().to_string();
        let mut added = 0;
        // first in-stock product of each seller
        let mut seen_sellers: Vec<&str> = Vec::new();
        for product in &generated {
            if product.stock_quantity == 0 || seen_sellers.contains(&product.seller_id.as_str()) {
                continue;
            }
            seen_sellers.push(&product.seller_id);
            db.carts().add_line(&shopper_id, &product.id, 1).await?;
            added += 1;
        }

        let view = db.carts().view(&shopper_id).await?;
        println!();
        println!("✓ Demo cart for shopper {}", shopper_id);
        println!(
            "  {} lines from {} sellers, total {}",
            added,
            view.sellers.len(),
            view.total()
        );
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with deterministic pseudo-random price/stock.
fn generate_product(seller_id: &str, name: &str, unit: &str, seed: usize) -> Product {
    let now = Utc::now();

    // $1.50 - $12.49
    let price_cents = 150 + ((seed * 37) % 1100) as i64;

    // every seventh product is sold out
    let stock_quantity = if seed % 7 == 3 { 0 } else { (seed % 40) as i64 + 1 };

    Product {
        id: generate_product_id(),
        seller_id: seller_id.to_string(),
        name: name.to_string(),
        unit: unit.to_string(),
        price_cents,
        stock_quantity,
        created_at: now,
        updated_at: now,
    }
}
