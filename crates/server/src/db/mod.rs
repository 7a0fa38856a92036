//! Persistence collaborator.
//!
//! The durable store owns categories, products, cart rows, orders, order items and
//! payments. The server only talks to it through [`Store`], so handlers and
//! services run unchanged against [`PgStore`] in production and
//! [`MemoryStore`] in tests or when no database is configured.
//!
//! # Atomicity
//!
//! [`Store::replace_cart_lines`] and [`Store::place_order`] are multi-row
//! writes that implementations must apply all-or-nothing.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p cartwheel-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use cartwheel_core::{CartId, CategoryId, OrderId, OrderStatus, ProductId, UserId};

use crate::models::{
    CartItem, CartLine, Category, NewCategory, NewOrder, NewProduct, Order, OrderDetails,
    PlacedOrder, Product, ProductUpdate,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., cart line for a deleted product, or a
    /// duplicate category name).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Operations the server needs from the durable store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;

    // Categories

    /// All categories, ordered by id.
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    /// Insert a category. Fails with `Conflict` if the name is taken.
    async fn create_category(&self, category: NewCategory) -> Result<Category, RepositoryError>;

    /// Replace a category's fields. Returns `None` if it does not exist.
    async fn update_category(
        &self,
        id: CategoryId,
        update: NewCategory,
    ) -> Result<Option<Category>, RepositoryError>;

    /// Delete a category and detach its products. Returns whether a row was deleted.
    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError>;

    // Products

    /// All products with `active` status, ordered by id.
    async fn list_active_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// One product by id, regardless of status.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Insert a product and return it with its assigned id.
    ///
    /// An unknown `category_id` fails with `Conflict`.
    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Replace a product's fields. Returns `None` if it does not exist.
    ///
    /// An unknown `category_id` fails with `Conflict`.
    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Delete a product. Returns whether a row was deleted.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    // Cart

    /// The user's cart lines joined with product name and price, ordered by cart id.
    async fn cart_items(&self, user: UserId) -> Result<Vec<CartItem>, RepositoryError>;

    /// Add `quantity` of a product, incrementing an existing line for the same product.
    async fn add_to_cart(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartId, RepositoryError>;

    /// Set the quantity of one of the user's lines. Returns whether it existed.
    async fn update_cart_item(
        &self,
        user: UserId,
        cart_id: CartId,
        quantity: i32,
    ) -> Result<bool, RepositoryError>;

    /// Remove one of the user's lines. Returns whether it existed.
    async fn remove_cart_item(&self, user: UserId, cart_id: CartId)
    -> Result<bool, RepositoryError>;

    /// Remove all of the user's lines.
    async fn clear_cart(&self, user: UserId) -> Result<(), RepositoryError>;

    /// Atomically delete all of the user's lines and insert `lines` in order.
    async fn replace_cart_lines(
        &self,
        user: UserId,
        lines: &[CartLine],
    ) -> Result<(), RepositoryError>;

    // Orders

    /// Atomically write the payment, order and order item rows, link the
    /// payment to the order, and clear the user's cart.
    async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, RepositoryError>;

    /// The user's orders, newest first.
    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Every order, newest first.
    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError>;

    /// An order with its items and payment.
    async fn order_details(&self, id: OrderId) -> Result<Option<OrderDetails>, RepositoryError>;

    /// Set an order's status. Returns whether the order existed.
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
