//! Router-level tests: full middleware stack against an in-memory database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use invenstore_core::{Product, Role, SubscriptionStatus, Tenant, User};
use invenstore_db::{Database, DbConfig, NewProduct, NewUser};

use crate::{build_app, AppState, MemoryCache, ServerConfig};

const PASSWORD: &str = "secreto1";

struct TestApp {
    app: Router,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, Arc::new(MemoryCache::new()), ServerConfig::for_tests());
        TestApp {
            app: build_app(state.clone()),
            state,
        }
    }

    async fn store(&self, name: &str) -> Tenant {
        self.state.db.tenants().create(name, None, None, None).await.unwrap()
    }

    async fn user(&self, tenant: &Tenant, username: &str, role: Role) -> User {
        self.state
            .db
            .users()
            .create(
                &tenant.id,
                &NewUser {
                    username: username.into(),
                    password: PASSWORD.into(),
                    full_name: format!("Usuario {}", username),
                    role,
                },
            )
            .await
            .unwrap()
    }

    async fn product(&self, tenant: &Tenant, name: &str, price_cents: i64, stock: i64) -> Product {
        self.state
            .db
            .products()
            .create(
                &tenant.id,
                &NewProduct {
                    name: name.into(),
                    cost_price_cents: price_cents / 2,
                    sale_price_cents: price_cents,
                    stock: Some(stock),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    fn token(&self, user: &User) -> String {
        self.state.jwt.issue(user).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }
}

#[tokio::test]
async fn test_health() {
    let t = TestApp::new().await;

    let (status, body) = t.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = t.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_login() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    t.user(&store, "ana", Role::Admin).await;

    let (status, body) = t
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ana", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "ana");
    assert_eq!(body["store"]["name"], "Tienda Uno");

    let token = body["token"].as_str().unwrap().to_string();
    let (status, body) = t.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "admin");

    let (status, body) = t
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ana", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");

    let (status, body) = t
        .send(Method::POST, "/api/auth/login", None, Some(json!({ "username": "ana" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_token_required() {
    let t = TestApp::new().await;

    let (status, body) = t.send(Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NO_TOKEN");

    let (status, body) = t.send(Method::GET, "/api/products", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_sale_flow() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let cashier = t.user(&store, "cajero", Role::Employee).await;
    let token = t.token(&cashier);
    let soda = t.product(&store, "Refresco", 1_500, 5).await;

    let (status, receipt) = t
        .send(
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({
                "items": [{ "product_id": soda.id, "quantity": 2 }],
                "payment_type": "efectivo",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["total_cents"], 3_000);
    assert_eq!(receipt["cash_amount_cents"], 3_000);
    assert_eq!(receipt["credit_amount_cents"], 0);

    let uri = format!("/api/products/{}", soda.id);
    let (_, product) = t.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(product["stock"], 3);

    let (status, body) = t
        .send(
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({
                "items": [{ "product_id": soda.id, "quantity": 6 }],
                "payment_type": "cash",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (_, product) = t.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(product["stock"], 3);

    let sale_uri = format!("/api/sales/{}", receipt["sale_id"].as_str().unwrap());
    let (status, detail) = t.send(Method::GET, &sale_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["items"][0]["subtotal_cents"], 3_000);
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let token = t.token(&t.user(&store, "cajero", Role::Employee).await);

    let (status, body) = t
        .send(
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({ "items": "nope", "payment_type": "cash" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = t
        .send(
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({ "items": [], "payment_type": "cash" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_role_checks() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let employee = t.token(&t.user(&store, "cajero", Role::Employee).await);
    let manager = t.token(&t.user(&store, "gerente", Role::Manager).await);

    let uri = "/api/reports/profit?start_date=2024-01-01&end_date=2024-01-31";
    let (status, body) = t.send(Method::GET, uri, Some(&employee), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = t.send(Method::GET, uri, Some(&manager), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .send(
            Method::POST,
            "/api/products",
            Some(&employee),
            Some(json!({ "name": "Pan", "cost_price_cents": 100, "sale_price_cents": 200 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // managers may only create employees
    let (status, _) = t
        .send(
            Method::POST,
            "/api/users",
            Some(&manager),
            Some(json!({
                "username": "otro_admin",
                "password": PASSWORD,
                "full_name": "Otro",
                "role": "admin",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, user) = t
        .send(
            Method::POST,
            "/api/users",
            Some(&manager),
            Some(json!({
                "username": "nuevo",
                "password": PASSWORD,
                "full_name": "Nuevo",
                "role": "empleado",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["role"], "employee");

    let (status, _) = t
        .send(
            Method::GET,
            "/api/reports/profit?start_date=2024-02-01",
            Some(&manager),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_cannot_delete_self() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let admin = t.user(&store, "ana", Role::Admin).await;
    let token = t.token(&admin);

    let uri = format!("/api/users/{}", admin.id);
    let (status, body) = t.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let other = t.user(&store, "luis", Role::Employee).await;
    let uri = format!("/api/users/{}", other.id);
    let (status, _) = t.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_closing() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let token = t.token(&t.user(&store, "cajero", Role::Employee).await);

    let (status, closing) = t
        .send(
            Method::POST,
            "/api/cash-register/close",
            Some(&token),
            Some(json!({ "actual_cash_cents": 1_000, "notes": "sobra" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(closing["difference_cents"], 1_000);

    let (status, body) = t
        .send(
            Method::POST,
            "/api/cash-register/close",
            Some(&token),
            Some(json!({ "actual_cash_cents": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_CLOSING");

    let (_, summary) = t
        .send(Method::GET, "/api/cash-register/summary", Some(&token), None)
        .await;
    assert_eq!(summary["has_closing"], true);

    let uri = format!("/api/cash-register/export/{}", closing["id"].as_str().unwrap());
    let (status, export) = t.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["closing"]["actual_cash_cents"], 1_000);
    assert_eq!(export["store"]["name"], "Tienda Uno");
}

#[tokio::test]
async fn test_tenant_isolation() {
    let t = TestApp::new().await;
    let store_a = t.store("Tienda A").await;
    let store_b = t.store("Tienda B").await;
    let soda = t.product(&store_a, "Refresco", 1_500, 5).await;
    let token_b = t.token(&t.user(&store_b, "cajero_b", Role::Admin).await);

    let uri = format!("/api/products/{}", soda.id);
    let (status, _) = t.send(Method::GET, &uri, Some(&token_b), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .send(
            Method::POST,
            "/api/sales",
            Some(&token_b),
            Some(json!({
                "items": [{ "product_id": soda.id, "quantity": 1 }],
                "payment_type": "cash",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, products) = t.send(Method::GET, "/api/products", Some(&token_b), None).await;
    assert_eq!(products.as_array().map(Vec::len), Some(0));

    let stock = t.state.db.products().get(&store_a.id, &soda.id).await.unwrap().stock;
    assert_eq!(stock, 5);
}

#[tokio::test]
async fn test_inactive_store_is_rejected() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let user = t.user(&store, "ana", Role::Admin).await;
    let token = t.token(&user);

    t.state
        .db
        .tenants()
        .update_subscription(&store.id, SubscriptionStatus::Suspended)
        .await
        .unwrap();

    let (status, body) = t.send(Method::GET, "/api/products", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "TENANT_INACTIVE");

    let (status, body) = t
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ana", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "TENANT_INACTIVE");
}

#[tokio::test]
async fn test_dashboard_reflects_new_sales() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let token = t.token(&t.user(&store, "cajero", Role::Employee).await);
    let soda = t.product(&store, "Refresco", 1_500, 5).await;

    let (status, stats) = t.send(Method::GET, "/api/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["daily_sales_cents"], 0);

    t.send(
        Method::POST,
        "/api/sales",
        Some(&token),
        Some(json!({
            "items": [{ "product_id": soda.id, "quantity": 1 }],
            "payment_type": "cash",
        })),
    )
    .await;

    let (_, stats) = t.send(Method::GET, "/api/dashboard", Some(&token), None).await;
    assert_eq!(stats["daily_sales_cents"], 1_500);
}

#[tokio::test]
async fn test_registration_with_invitation() {
    let t = TestApp::new().await;
    let platform = t.store("InvenStore Platform").await;
    let root = t.token(&t.user(&platform, "superadmin", Role::SuperAdmin).await);

    let (status, invitation) = t
        .send(
            Method::POST,
            "/api/admin/invitation-codes",
            Some(&root),
            Some(json!({ "store_name": "Abarrotes Lupita", "owner_name": "Lupita" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let code = invitation["code"].as_str().unwrap().to_lowercase();

    let (status, info) = t
        .send(
            Method::POST,
            "/api/register/validate-code",
            None,
            Some(json!({ "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["store_name"], "Abarrotes Lupita");

    let (status, session) = t
        .send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({
                "invitation_code": code,
                "username": "lupita",
                "password": PASSWORD,
                "full_name": "Lupita Pérez",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["user"]["role"], "admin");

    let token = session["token"].as_str().unwrap().to_string();
    let (_, categories) = t.send(Method::GET, "/api/categories", Some(&token), None).await;
    assert_eq!(categories.as_array().map(Vec::len), Some(5));

    let (status, _) = t
        .send(
            Method::POST,
            "/api/register/validate-code",
            None,
            Some(json!({ "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send(Method::GET, "/api/admin/metrics", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_csv_export_with_query_token() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let token = t.token(&t.user(&store, "cajero", Role::Employee).await);

    let request = Request::builder()
        .uri(format!(
            "/api/export/sales-csv?start_date=2024-01-01&end_date=2024-01-31&token={}",
            token
        ))
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).starts_with("id,date,time"));
}

#[tokio::test]
async fn test_admin_store_detail() {
    let t = TestApp::new().await;
    let platform = t.store("InvenStore Platform").await;
    let root = t.token(&t.user(&platform, "superadmin", Role::SuperAdmin).await);

    let store = t.store("Tienda Uno").await;
    let cashier = t.user(&store, "cajero", Role::Employee).await;
    let product = t.product(&store, "Pan", 500, 10).await;
    t.send(
        Method::POST,
        "/api/sales",
        Some(&t.token(&cashier)),
        Some(json!({
            "items": [{ "product_id": product.id, "quantity": 3 }],
            "payment_type": "cash",
        })),
    )
    .await;

    let uri = format!("/api/admin/stores/{}", store.id);
    let (status, detail) = t.send(Method::GET, &uri, Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Tienda Uno");
    assert_eq!(detail["total_sales"], 1);
    assert_eq!(detail["total_revenue_cents"], 1_500);
    assert_eq!(detail["users"][0]["username"], "cajero");
    assert_eq!(detail["recent_sales"].as_array().map(Vec::len), Some(1));

    let (status, _) = t
        .send(Method::GET, "/api/admin/stores/missing", Some(&root), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send(Method::GET, &uri, Some(&t.token(&cashier)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_password_change() {
    let t = TestApp::new().await;
    let platform = t.store("InvenStore Platform").await;
    let root = t.token(&t.user(&platform, "superadmin", Role::SuperAdmin).await);
    let uri = "/api/admin/change-password";

    let (status, _) = t
        .send(Method::PUT, uri, Some(&root), Some(json!({ "new_password": "muy-segura-1" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            Method::PUT,
            uri,
            Some(&root),
            Some(json!({ "current_password": PASSWORD, "new_password": "corta1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            Method::PUT,
            uri,
            Some(&root),
            Some(json!({ "current_password": "equivocada", "new_password": "muy-segura-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            Method::PUT,
            uri,
            Some(&root),
            Some(json!({ "current_password": PASSWORD, "new_password": "muy-segura-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "superadmin", "password": "muy-segura-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_mixed_sale_with_extreme_cash_is_rejected() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let token = t.token(&t.user(&store, "cajero", Role::Employee).await);
    let product = t.product(&store, "Pan", 500, 5).await;
    let customer = t
        .state
        .db
        .customers()
        .create(
            &store.id,
            &invenstore_db::NewCustomer {
                name: "Beto".into(),
                phone: None,
                address: None,
            },
        )
        .await
        .unwrap();

    let (status, body) = t
        .send(
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({
                "items": [{ "product_id": product.id, "quantity": 1 }],
                "payment_type": "mixed",
                "customer_id": customer.id,
                "cash_amount_cents": i64::MIN,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, fetched) = t
        .send(Method::GET, &format!("/api/products/{}", product.id), Some(&token), None)
        .await;
    assert_eq!(fetched["stock"], 5);
}

#[tokio::test]
async fn test_cancel_of_returned_sale_conflicts() {
    let t = TestApp::new().await;
    let store = t.store("Tienda Uno").await;
    let token = t.token(&t.user(&store, "gerente", Role::Manager).await);
    let product = t.product(&store, "Pan", 500, 5).await;

    let (_, receipt) = t
        .send(
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({
                "items": [{ "product_id": product.id, "quantity": 2 }],
                "payment_type": "cash",
            })),
        )
        .await;
    let sale_id = receipt["sale_id"].as_str().unwrap().to_string();

    let (status, _) = t
        .send(
            Method::POST,
            "/api/returns",
            Some(&token),
            Some(json!({
                "sale_id": sale_id,
                "items": [{ "product_id": product.id, "quantity": 1, "unit_price_cents": 500 }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t
        .send(Method::DELETE, &format!("/api/sales/{}", sale_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, fetched) = t
        .send(Method::GET, &format!("/api/products/{}", product.id), Some(&token), None)
        .await;
    assert_eq!(fetched["stock"], 4);
}
