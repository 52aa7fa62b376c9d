//! # Seed Data Generator
//!
//! Populates a database with a demo catalog and a few discount codes.
//!
//! ## Usage
//! ```bash
//! # Seed ./lustre_dev.db
//! cargo run -p lustre-db --bin seed
//!
//! # Specify database path
//! cargo run -p lustre-db --bin seed -- --db ./data/lustre.db
//! ```
//!
//! ## Generated Data
//! - One setting per (style, metal) pair, slug `{style}-{metal}`
//! - Graded stones across shapes and carat weights, SKU `STN-{shape}-{index}`
//! - Discount codes: `WELCOME10` (10%, once per customer), `FLAT250`
//!   (250.00 off, 100 uses), `VIP20` (20%, inactive)

use chrono::{Duration, Utc};
use lustre_core::{DiscountCode, SellableItem, SellableSetting};
use lustre_db::{Database, DbConfig};
use std::env;
use uuid::Uuid;

/// Setting styles with base price (cents) and features.
const STYLES: &[(&str, i64, &[&str])] = &[
    ("Classic Solitaire", 95_000, &["four-prong", "cathedral"]),
    ("Halo", 145_000, &["pave", "halo"]),
    ("Three Stone", 165_000, &["three-stone"]),
    ("Bezel", 110_000, &["bezel"]),
    ("Hidden Halo", 155_000, &["hidden-halo", "pave"]),
    ("Vintage Milgrain", 175_000, &["milgrain", "filigree"]),
];

/// Metals with price addon (cents).
const METALS: &[(&str, i64)] = &[
    ("14K White Gold", 0),
    ("18K Yellow Gold", 25_000),
    ("Platinum", 60_000),
];

const SHAPES: &[&str] = &["round", "oval", "cushion", "emerald", "pear", "princess"];

const CARATS: &[f64] = &[0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

const CLARITIES: &[&str] = &["VS2", "VS1", "VVS2", "VVS1"];

const COLORS: &[&str] = &["H", "G", "F", "E", "D"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./lustre_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Lustre Orders Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./lustre_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Lustre Orders Seed Data Generator");
    println!("====================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.settings().count().await? + db.items().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} catalog entries", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating settings...");
    let mut settings = 0;
    for (style_idx, (style, base_price, features)) in STYLES.iter().enumerate() {
        for (metal, addon) in METALS {
            let setting = generate_setting(style, *base_price, features, metal, *addon, style_idx);
            if let Err(e) = db.settings().insert(&setting).await {
                eprintln!("Failed to insert {}: {}", setting.slug, e);
                continue;
            }
            settings += 1;
        }
    }
    println!("  ✓ {} settings", settings);

    println!("Generating stones...");
    let mut stones = 0;
    for (shape_idx, shape) in SHAPES.iter().enumerate() {
        for (carat_idx, carat) in CARATS.iter().enumerate() {
            let seed = shape_idx * CARATS.len() + carat_idx;
            let stone = generate_stone(shape, *carat, seed);
            if let Err(e) = db.items().insert(&stone).await {
                eprintln!("Failed to insert {}: {}", stone.sku, e);
                continue;
            }
            stones += 1;
        }
    }
    println!("  ✓ {} stones", stones);

    println!("Generating discount codes...");
    for code in demo_codes() {
        match db.discount_codes().insert(&code).await {
            Ok(stored) => println!("  ✓ {} ({} {})", stored.code, stored.kind, stored.value),
            Err(e) => eprintln!("Failed to insert {}: {}", code.code, e),
        }
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates one setting for a style and metal.
fn generate_setting(
    style: &str,
    base_price: i64,
    features: &[&str],
    metal: &str,
    metal_addon: i64,
    seed: usize,
) -> SellableSetting {
    let now = Utc::now();
    let title = format!("{} in {}", style, metal);
    let slug = format!("{}-{}", style, metal).to_lowercase().replace(' ', "-");

    SellableSetting {
        id: Uuid::new_v4().to_string(),
        title,
        slug: slug.clone(),
        description: Some(format!("{} setting, hand finished.", style)),
        price_cents: base_price + metal_addon,
        metal_options: vec![metal.to_string()],
        available_shapes: SHAPES.iter().map(|s| s.to_string()).collect(),
        features: features.iter().map(|f| f.to_string()).collect(),
        images: vec![format!("/images/settings/{}.jpg", slug)],
        // 2 - 11 units
        stock: 2 + (seed % 10) as i64,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

/// Generates one graded stone. Stones are one of a kind.
fn generate_stone(shape: &str, carat: f64, seed: usize) -> SellableItem {
    let now = Utc::now();
    let lab_grown = seed % 3 == 0;

    // ~ 4,500.00 per carat mined, a third of that lab grown
    let per_carat = if lab_grown { 150_000.0 } else { 450_000.0 };
    let price_cents = (per_carat * carat * carat.max(1.0)).round() as i64;

    SellableItem {
        id: Uuid::new_v4().to_string(),
        sku: format!("STN-{}-{:03}", shape.to_uppercase(), seed),
        shape: Some(shape.to_string()),
        carat: Some(carat),
        cut: Some(if seed % 2 == 0 { "Ideal" } else { "Excellent" }.to_string()),
        clarity: Some(CLARITIES[seed % CLARITIES.len()].to_string()),
        color: Some(COLORS[seed % COLORS.len()].to_string()),
        lab_grown,
        certificate: Some(format!("{} {:08}", if lab_grown { "IGI" } else { "GIA" }, 22_000_000 + seed)),
        price_cents,
        stock: 1,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

fn demo_codes() -> Vec<DiscountCode> {
    let now = Utc::now();
    let code = |code: &str, kind: &str, value: i64| DiscountCode {
        id: Uuid::new_v4().to_string(),
        code: code.to_string(),
        kind: kind.to_string(),
        value,
        global_limit: 0,
        used_count: 0,
        per_customer_limit: 0,
        expires_at: None,
        active: true,
        version: 0,
        created_at: now,
        updated_at: now,
    };

    vec![
        DiscountCode {
            per_customer_limit: 1,
            expires_at: Some(now + Duration::days(90)),
            ..code("WELCOME10", "percentage", 1_000)
        },
        DiscountCode {
            global_limit: 100,
            ..code("FLAT250", "fixed", 25_000)
        },
        DiscountCode {
            active: false,
            ..code("VIP20", "percentage", 2_000)
        },
    ]
}
