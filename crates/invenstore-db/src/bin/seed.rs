//! # Seed Data Generator
//!
//! Populates an empty database with a platform account and a demo store.
//!
//! ## Usage
//! ```bash
//! # Seed ./invenstore.db
//! cargo run -p invenstore-db --bin seed
//!
//! # Specify database path and super admin password
//! cargo run -p invenstore-db --bin seed -- --db ./data/invenstore.db --password s3cret!
//! ```
//!
//! ## What Gets Created
//! ```text
//! InvenStore Platform (tenant)
//! └── superadmin            super_admin
//!
//! Abarrotes Don Pepe (registered through an invitation code)
//! ├── admin / gerente / cajero
//! ├── 5 default categories
//! ├── products per category (a few under their minimum stock)
//! └── 3 customers
//! ```
//!
//! Demo store users share the password `demo123`.

use std::env;

use invenstore_core::{Role, DEFAULT_CATEGORIES};
use invenstore_db::{
    Database, DbConfig, NewCustomer, NewInvitation, NewProduct, NewUser, StoreRegistration,
};

const PLATFORM_TENANT: &str = "InvenStore Platform";
const DEMO_STORE: &str = "Abarrotes Don Pepe";
const DEMO_PASSWORD: &str = "demo123";

/// (name, barcode, cost cents, sale cents, stock) per default category, in
/// the same order as `DEFAULT_CATEGORIES`.
const PRODUCTS: &[&[(&str, &str, i64, i64, i64)]] = &[
    &[
        ("Coca-Cola 600ml", "7501055300075", 1_200, 1_800, 48),
        ("Agua Natural 1L", "7501086801046", 600, 1_200, 36),
        ("Jugo de Naranja 1L", "7501013191035", 1_800, 2_800, 3),
    ],
    &[
        ("Papas Fritas 45g", "7501011115309", 1_000, 1_700, 25),
        ("Cacahuates Japoneses", "7501011104815", 700, 1_300, 4),
    ],
    &[
        ("Chocolate con Leche", "7501000610720", 900, 1_500, 30),
        ("Paleta de Cajeta", "7501000113252", 300, 600, 60),
    ],
    &[
        ("Cloro 1L", "7501025403010", 1_400, 2_300, 12),
        ("Jabón de Trastes 750ml", "7501026005626", 2_100, 3_200, 2),
    ],
    &[
        ("Pasta Dental 100ml", "7501035911062", 2_300, 3_600, 15),
        ("Shampoo 400ml", "7501001303287", 4_200, 6_500, 8),
    ],
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("María López", "555-010-2030"),
    ("Juan Hernández", "555-020-3040"),
    ("Rosa Martínez", "555-030-4050"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./invenstore.db");
    let mut admin_password = String::from("admin123");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    admin_password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("InvenStore Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: ./invenstore.db)");
                println!("  -p, --password <PASS>    Super admin password (default: admin123)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 InvenStore Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let (_, existing) = db.tenants().list_with_counts(None, 1, 0).await?;
    if existing > 0 {
        println!("⚠ Database already has {} stores", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Platform account
    let platform = db
        .tenants()
        .create(PLATFORM_TENANT, Some("InvenStore"), None, None)
        .await?;
    db.users()
        .create(
            &platform.id,
            &NewUser {
                username: "superadmin".into(),
                password: admin_password,
                full_name: "Super Administrador".into(),
                role: Role::SuperAdmin,
            },
        )
        .await?;
    println!("✓ Created platform account (user: superadmin)");

    // Demo store, registered the same way a real store is
    let invitation = db
        .invitations()
        .create(&NewInvitation {
            store_name: DEMO_STORE.into(),
            owner_name: "José Pérez".into(),
            owner_phone: Some("555-000-1111".into()),
            owner_address: Some("Av. Juárez 12, Centro".into()),
            expires_in_days: None,
        })
        .await?;

    let (store, admin) = db
        .invitations()
        .register_store(&StoreRegistration {
            invitation_code: invitation.code.clone(),
            username: "admin".into(),
            password: DEMO_PASSWORD.into(),
            full_name: "José Pérez".into(),
            store_name: None,
            owner_name: None,
            owner_phone: None,
            owner_address: None,
        })
        .await?;
    println!("✓ Registered '{}' with code {} (user: {})", store.name, invitation.code, admin.username);

    for (username, full_name, role) in [
        ("gerente", "Laura Gómez", Role::Manager),
        ("cajero", "Pedro Ruiz", Role::Employee),
    ] {
        db.users()
            .create(
                &store.id,
                &NewUser {
                    username: username.into(),
                    password: DEMO_PASSWORD.into(),
                    full_name: full_name.into(),
                    role,
                },
            )
            .await?;
    }
    println!("✓ Created staff users (gerente, cajero)");

    // Products go into the default categories created at registration
    let categories = db.categories().list(&store.id).await?;
    let mut generated = 0;

    for (category_name, products) in DEFAULT_CATEGORIES.iter().zip(PRODUCTS) {
        let category_id = categories
            .iter()
            .find(|c| c.category.name == *category_name)
            .map(|c| c.category.id.clone());

        for (name, barcode, cost, price, stock) in products.iter() {
            let input = NewProduct {
                name: (*name).into(),
                barcode: Some((*barcode).into()),
                category_id: category_id.clone(),
                cost_price_cents: *cost,
                sale_price_cents: *price,
                stock: Some(*stock),
                ..Default::default()
            };

            if let Err(e) = db.products().create(&store.id, &input).await {
                eprintln!("Failed to insert {}: {}", name, e);
                continue;
            }
            generated += 1;
        }
    }
    println!("✓ Generated {} products", generated);

    for (name, phone) in CUSTOMERS {
        db.customers()
            .create(
                &store.id,
                &NewCustomer {
                    name: (*name).into(),
                    phone: Some((*phone).into()),
                    address: None,
                },
            )
            .await?;
    }
    println!("✓ Created {} customers", CUSTOMERS.len());

    let low = db.products().low_stock(&store.id).await?;
    println!("  Low stock: {} products", low.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
