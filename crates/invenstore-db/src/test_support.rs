//! Fixtures shared by the repository tests.

use invenstore_core::{Customer, Product, Role, Tenant, User};

use crate::repository::{NewCustomer, NewProduct, NewUser};
use crate::{Database, DbConfig};

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// File-backed database with a multi-connection pool, so transactions
/// really contend for SQLite's write lock. Keep the `TempDir` alive.
pub async fn file_db(max_connections: u32) -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("invenstore.db")).max_connections(max_connections);
    (Database::new(config).await.unwrap(), dir)
}

pub async fn seed_tenant(db: &Database, name: &str) -> Tenant {
    db.tenants()
        .create(name, Some("Dueño"), None, None)
        .await
        .unwrap()
}

pub async fn seed_user(db: &Database, tenant_id: &str, username: &str, role: Role) -> User {
    db.users()
        .create(
            tenant_id,
            &NewUser {
                username: username.to_string(),
                password: "secreto1".to_string(),
                full_name: format!("Usuario {}", username),
                role,
            },
        )
        .await
        .unwrap()
}

pub async fn seed_product(
    db: &Database,
    tenant_id: &str,
    name: &str,
    price_cents: i64,
    stock: i64,
) -> Product {
    db.products()
        .create(
            tenant_id,
            &NewProduct {
                name: name.to_string(),
                cost_price_cents: price_cents / 2,
                sale_price_cents: price_cents,
                stock: Some(stock),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

pub async fn seed_customer(db: &Database, tenant_id: &str, name: &str) -> Customer {
    db.customers()
        .create(
            tenant_id,
            &NewCustomer {
                name: name.to_string(),
                phone: None,
                address: None,
            },
        )
        .await
        .unwrap()
}

/// Tenant with one employee, ready to sell.
pub async fn store(db: &Database, name: &str) -> (Tenant, User) {
    let tenant = seed_tenant(db, name).await;
    let username = format!("cajero_{}", &tenant.id[..8]);
    let user = seed_user(db, &tenant.id, &username, Role::Employee).await;
    (tenant, user)
}
