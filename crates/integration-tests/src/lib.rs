//! Integration test harness for Cartwheel.
//!
//! Tests drive the full router in process with `tower::ServiceExt::oneshot`,
//! backed by the in-memory store. [`FaultyStore`] wraps that store to inject
//! failures and delays into individual operations.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwheel-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use cartwheel_core::{CartId, CategoryId, OrderId, OrderStatus, ProductId, Role, UserId};
use cartwheel_server::config::{AuthConfig, ServerConfig};
use cartwheel_server::db::{MemoryStore, RepositoryError, Store};
use cartwheel_server::models::{
    CartItem, CartLine, Category, CurrentUser, NewCategory, NewOrder, NewProduct, Order,
    OrderDetails, PlacedOrder, Product, ProductUpdate,
};
use cartwheel_server::state::AppState;

/// Signing secret shared by every test app.
pub const TEST_JWT_SECRET: &str = "kT9#vQ2!mZ7@pL4$wX8^rB1&nC6*yH3%";

/// Auth settings used by test apps.
#[must_use]
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: SecretString::from(TEST_JWT_SECRET),
        expires_in_minutes: 60,
        issuer: "cartwheel".to_string(),
    }
}

/// Server settings for tests: no database, no background worker.
#[must_use]
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::new(test_auth_config());
    config.worker_interval = None;
    config
}

/// A router plus the state behind it.
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    /// App over a fresh in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// App over `store` with the default test configuration.
    #[must_use]
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        Self::with_config(test_config(), store)
    }

    /// App over `store` with a custom configuration.
    #[must_use]
    pub fn with_config(config: ServerConfig, store: Arc<dyn Store>) -> Self {
        let state = AppState::new(config, store);
        let router = cartwheel_server::app(state.clone());
        Self { state, router }
    }

    /// A valid bearer token for `user_id` with `role`.
    #[must_use]
    pub fn token(&self, user_id: i32, role: Role) -> String {
        self.state
            .tokens()
            .issue(CurrentUser {
                id: UserId::new(user_id),
                role,
            })
            .unwrap()
    }

    /// Token for a customer.
    #[must_use]
    pub fn customer(&self, user_id: i32) -> String {
        self.token(user_id, Role::Customer)
    }

    /// Token for an admin.
    #[must_use]
    pub fn admin(&self) -> String {
        self.token(1, Role::Admin)
    }

    /// Send a request and return the status and JSON body (`Null` if empty or not JSON).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Create an active product directly through the catalog.
    pub async fn seed_product(&self, name: &str, cents: i64) -> ProductId {
        self.state
            .catalog()
            .create(NewProduct {
                name: name.to_string(),
                description: None,
                category_id: None,
                price: cartwheel_core::Money::from_cents(cents),
                stock_quantity: 100,
                image_url: None,
                status: cartwheel_core::ProductStatus::Active,
            })
            .await
            .unwrap()
            .product_id
    }

    /// `(product_id, quantity)` pairs of the user's cart, in cart order.
    pub async fn cart_lines(&self, token: &str) -> Vec<(i64, i64)> {
        let (status, body) = self.get("/api/cart", Some(token)).await;
        assert_eq!(status, StatusCode::OK);
        body.as_array()
            .unwrap()
            .iter()
            .map(|item| {
                (
                    item["product_id"].as_i64().unwrap(),
                    item["quantity"].as_i64().unwrap(),
                )
            })
            .collect()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Store wrapper that can fail or stall selected operations.
///
/// Every other call goes straight to the wrapped [`MemoryStore`].
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_replace_cart: AtomicBool,
    pub fail_status_update: AtomicBool,
    cart_read_delay_ms: AtomicU64,
    status_update_delay_ms: AtomicU64,
}

impl FaultyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `cart_items` call wait `delay` before answering.
    pub fn stall_cart_reads(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.cart_read_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Make the next `update_order_status` call wait `delay` before writing.
    ///
    /// Later calls run at full speed.
    pub fn stall_next_status_update(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.status_update_delay_ms.store(millis, Ordering::SeqCst);
    }

    fn injected(flag: &AtomicBool, what: &str) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            Err(RepositoryError::DataCorruption(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.inner.ping().await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        self.inner.list_categories().await
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, RepositoryError> {
        self.inner.create_category(category).await
    }

    async fn update_category(
        &self,
        id: CategoryId,
        update: NewCategory,
    ) -> Result<Option<Category>, RepositoryError> {
        self.inner.update_category(id, update).await
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        self.inner.delete_category(id).await
    }

    async fn list_active_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.inner.list_active_products().await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.inner.get_product(id).await
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        self.inner.create_product(product).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        self.inner.update_product(id, update).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        self.inner.delete_product(id).await
    }

    async fn cart_items(&self, user: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let delay_ms = self.cart_read_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        self.inner.cart_items(user).await
    }

    async fn add_to_cart(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartId, RepositoryError> {
        self.inner.add_to_cart(user, product, quantity).await
    }

    async fn update_cart_item(
        &self,
        user: UserId,
        cart_id: CartId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        self.inner.update_cart_item(user, cart_id, quantity).await
    }

    async fn remove_cart_item(
        &self,
        user: UserId,
        cart_id: CartId,
    ) -> Result<bool, RepositoryError> {
        self.inner.remove_cart_item(user, cart_id).await
    }

    async fn clear_cart(&self, user: UserId) -> Result<(), RepositoryError> {
        self.inner.clear_cart(user).await
    }

    async fn replace_cart_lines(
        &self,
        user: UserId,
        lines: &[CartLine],
    ) -> Result<(), RepositoryError> {
        Self::injected(&self.fail_replace_cart, "replace_cart_lines")?;
        self.inner.replace_cart_lines(user, lines).await
    }

    async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, RepositoryError> {
        self.inner.place_order(order).await
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        self.inner.orders_for_user(user).await
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        self.inner.all_orders().await
    }

    async fn order_details(&self, id: OrderId) -> Result<Option<OrderDetails>, RepositoryError> {
        self.inner.order_details(id).await
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        Self::injected(&self.fail_status_update, "update_order_status")?;
        let delay_ms = self.status_update_delay_ms.swap(0, Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        self.inner.update_order_status(id, status).await
    }
}
