//! Integration tests for order placement and the processing queue.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{Value, json};

use cartwheel_integration_tests::{FaultyStore, TestApp};

async fn fill_cart(app: &TestApp, token: &str, cents: i64, quantity: i32) {
    let product = app.seed_product("Mango", cents).await;
    let (status, _) = app
        .post(
            "/api/cart/add",
            Some(token),
            json!({ "product_id": product.as_i32(), "quantity": quantity }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

async fn place(app: &TestApp, token: &str) -> Value {
    let (status, body) = app
        .post("/api/orders/place", Some(token), json!({ "payment_method": "card" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    body
}

// =============================================================================
// Placement
// =============================================================================

#[tokio::test]
async fn test_place_order_queues_job_and_clears_cart() {
    let app = TestApp::new();
    let token = app.customer(30);
    fill_cart(&app, &token, 1250, 2).await;

    let body = place(&app, &token).await;
    assert_eq!(body["total"], "25.00");
    assert_eq!(body["queue_position"], 1);
    assert!(app.cart_lines(&token).await.is_empty());

    let order_id = body["order_id"].as_i64().unwrap();
    let (status, details) = app
        .get(&format!("/api/orders/{order_id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["status"], "processing");
    assert_eq!(details["items"][0]["product_name"], "Mango");
    assert_eq!(details["payment"]["status"], "completed");
}

#[tokio::test]
async fn test_place_order_without_body_uses_default_method() {
    let app = TestApp::new();
    let token = app.customer(31);
    fill_cart(&app, &token, 100, 1).await;

    let (status, body) = app
        .send(axum::http::Method::POST, "/api/orders/place", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let order_id = body["order_id"].as_i64().unwrap();
    let (_, details) = app
        .get(&format!("/api/orders/{order_id}"), Some(&token))
        .await;
    assert_eq!(details["payment_method"], "card");
}

#[tokio::test]
async fn test_empty_cart_cannot_be_ordered() {
    let app = TestApp::new();
    let token = app.customer(32);

    let (status, body) = app
        .post("/api/orders/place", Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cart empty");

    let (_, queue) = app
        .get("/api/orders/queue-status", Some(&app.admin()))
        .await;
    assert_eq!(queue["queue_length"], 0);
}

// =============================================================================
// Queue status and processing
// =============================================================================

#[tokio::test]
async fn test_queue_is_processed_in_placement_order() {
    let app = TestApp::new();
    let admin = app.admin();
    let mut placed = Vec::new();
    for user in 40..43 {
        let token = app.customer(user);
        fill_cart(&app, &token, 500, 1).await;
        let body = place(&app, &token).await;
        assert_eq!(body["queue_position"], user - 39);
        placed.push(body["order_id"].as_i64().unwrap());
    }

    let (status, queue) = app.get("/api/orders/queue-status", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue["queue_length"], 3);
    let snapshot: Vec<(i64, i64)> = queue["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|job| (job["order_id"].as_i64().unwrap(), job["position"].as_i64().unwrap()))
        .collect();
    assert_eq!(
        snapshot,
        vec![(placed[0], 1), (placed[1], 2), (placed[2], 3)]
    );

    // Viewing the queue does not consume it
    let (_, again) = app.get("/api/orders/queue-status", Some(&admin)).await;
    assert_eq!(again["queue_length"], 3);

    for (index, order_id) in placed.iter().enumerate() {
        let (status, body) = app
            .post("/api/orders/process-next", Some(&admin), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["order_id"].as_i64().unwrap(), *order_id);
        assert_eq!(body["remaining_in_queue"], 2 - index);
    }

    let (status, body) = app
        .post("/api/orders/process-next", Some(&admin), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "No orders in queue" }));

    let (_, orders) = app.get("/api/orders", Some(&admin)).await;
    assert!(
        orders
            .as_array()
            .unwrap()
            .iter()
            .all(|order| order["status"] == "completed")
    );
}

#[tokio::test]
async fn test_failed_processing_requeues_at_front() {
    let store = Arc::new(FaultyStore::new());
    let app = TestApp::with_store(store.clone());
    let admin = app.admin();

    let mut placed = Vec::new();
    for user in 50..52 {
        let token = app.customer(user);
        fill_cart(&app, &token, 300, 1).await;
        placed.push(place(&app, &token).await["order_id"].as_i64().unwrap());
    }

    store.fail_status_update.store(true, Ordering::SeqCst);
    let (status, _) = app
        .post("/api/orders/process-next", Some(&admin), json!({}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, queue) = app.get("/api/orders/queue-status", Some(&admin)).await;
    assert_eq!(queue["queue_length"], 2);
    assert_eq!(queue["jobs"][0]["order_id"].as_i64().unwrap(), placed[0]);

    store.fail_status_update.store(false, Ordering::SeqCst);
    let (_, body) = app
        .post("/api/orders/process-next", Some(&admin), json!({}))
        .await;
    assert_eq!(body["order"]["order_id"].as_i64().unwrap(), placed[0]);
}

#[tokio::test]
async fn test_overlapping_drains_complete_orders_in_placement_order() {
    let store = Arc::new(FaultyStore::new());
    let app = TestApp::with_store(store.clone());
    let admin = app.admin();

    let mut placed = Vec::new();
    for user in 53..55 {
        let token = app.customer(user);
        fill_cart(&app, &token, 300, 1).await;
        placed.push(place(&app, &token).await["order_id"].as_i64().unwrap());
    }

    // The timer task picks up the first order and its write is slow
    store.stall_next_status_update(Duration::from_millis(200));
    let timer = app.state.worker().clone();
    let first = tokio::spawn(async move { timer.process_next().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The admin endpoint fires while that write is still in flight
    let (status, body) = app
        .post("/api/orders/process-next", Some(&admin), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["order_id"].as_i64().unwrap(), placed[1]);

    let (_, earlier) = app
        .get(&format!("/api/orders/{}", placed[0]), Some(&admin))
        .await;
    assert_eq!(earlier["status"], "completed");

    let job = first.await.unwrap().unwrap().unwrap();
    assert_eq!(i64::from(job.order_id.as_i32()), placed[0]);
    let (_, queue) = app.get("/api/orders/queue-status", Some(&admin)).await;
    assert_eq!(queue["queue_length"], 0);
}

// =============================================================================
// Order visibility
// =============================================================================

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let app = TestApp::new();
    let owner = app.customer(60);
    let other = app.customer(61);
    fill_cart(&app, &owner, 800, 1).await;
    let order_id = place(&app, &owner).await["order_id"].as_i64().unwrap();

    let (status, _) = app
        .get(&format!("/api/orders/{order_id}"), Some(&other))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .get(&format!("/api/orders/{order_id}"), Some(&app.admin()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, mine) = app.get("/api/orders/my", Some(&owner)).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, theirs) = app.get("/api/orders/my", Some(&other)).await;
    assert!(theirs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_queue_endpoints_require_admin() {
    let app = TestApp::new();
    let customer = app.customer(70);

    let (status, body) = app
        .post("/api/orders/process-next", Some(&customer), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin access required");

    let (status, _) = app.get("/api/orders/queue-status", Some(&customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/orders", Some(&customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
