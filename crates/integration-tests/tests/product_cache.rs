//! Integration tests for the product catalog and its cache.

use axum::http::StatusCode;
use serde_json::{Value, json};

use cartwheel_integration_tests::TestApp;
use cartwheel_server::services::{ALL_PRODUCTS_KEY, product_key};

fn product_body(name: &str, price: &str) -> Value {
    json!({
        "name": name,
        "description": "Fresh",
        "price": price,
        "stock_quantity": 12,
    })
}

#[tokio::test]
async fn test_listing_is_cached_until_a_write() {
    let app = TestApp::new();
    let admin = app.admin();
    app.seed_product("Cherry", 400).await;

    let (status, listing) = app.get("/api/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert!(app.state.catalog().cache().has(ALL_PRODUCTS_KEY));

    let (status, created) = app
        .post("/api/products", Some(&admin), product_body("Peach", "3.75"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["price"], "3.75");
    assert!(!app.state.catalog().cache().has(ALL_PRODUCTS_KEY));

    let (_, listing) = app.get("/api/products", None).await;
    assert_eq!(listing.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_invalidates_product_entry() {
    let app = TestApp::new();
    let admin = app.admin();
    let id = app.seed_product("Melon", 900).await;
    let cache = app.state.catalog().cache();

    let (_, before) = app.get(&format!("/api/products/{id}"), None).await;
    assert_eq!(before["name"], "Melon");
    assert!(cache.has(&product_key(id)));

    let (status, updated) = app
        .put(
            &format!("/api/products/{id}"),
            Some(&admin),
            product_body("Honeydew", "9.50"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Honeydew");
    assert!(!cache.has(&product_key(id)));

    let (_, after) = app.get(&format!("/api/products/{id}"), None).await;
    assert_eq!(after["name"], "Honeydew");
    assert_eq!(after["price"], "9.50");
}

#[tokio::test]
async fn test_deleted_and_inactive_products_are_hidden() {
    let app = TestApp::new();
    let admin = app.admin();
    let kept = app.seed_product("Quince", 650).await;
    let doomed = app.seed_product("Durian", 1500).await;

    app.get(&format!("/api/products/{doomed}"), None).await;
    let (status, body) = app
        .delete(&format!("/api/products/{doomed}"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Product deleted");

    let (status, body) = app.get(&format!("/api/products/{doomed}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Product not found");

    let mut inactive = product_body("Quince", "6.50");
    inactive["status"] = json!("inactive");
    app.put(&format!("/api/products/{kept}"), Some(&admin), inactive)
        .await;

    let (status, _) = app.get(&format!("/api/products/{kept}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listing) = app.get("/api/products", None).await;
    assert!(listing.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_product_writes_report_not_found() {
    let app = TestApp::new();
    let admin = app.admin();

    let (status, _) = app
        .put("/api/products/404", Some(&admin), product_body("Ghost", "1.00"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete("/api/products/404", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_product_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/products", Some(&app.admin()), product_body("  ", "1.00"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "name must not be empty");
}

#[tokio::test]
async fn test_status_endpoint_reports_engine_sizes() {
    let app = TestApp::new();
    let token = app.customer(80);
    let product = app.seed_product("Olive", 220).await;

    app.post(
        "/api/cart/add",
        Some(&token),
        json!({ "product_id": product.as_i32() }),
    )
    .await;
    app.post("/api/orders/place", Some(&token), json!({})).await;
    app.get("/api/products", None).await;

    let (status, body) = app.get("/api/data-structures/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_action_stack"]["users"], 1);
    assert_eq!(body["user_action_stack"]["size"], 1);
    assert_eq!(body["order_processing_queue"]["size"], 1);
    assert_eq!(body["product_cache"]["has_all_products"], true);
}
