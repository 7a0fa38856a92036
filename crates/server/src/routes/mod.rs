//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness check
//! GET    /health/ready                - Readiness check (store ping)
//!
//! # Categories
//! GET    /api/categories              - All categories
//! POST   /api/categories              - Create (admin)
//! PUT    /api/categories/{id}         - Update (admin)
//! DELETE /api/categories/{id}         - Delete, detaching products (admin)
//!
//! # Products
//! GET    /api/products                - Active products (cached)
//! GET    /api/products/{id}           - One product (cached)
//! POST   /api/products                - Create (admin)
//! PUT    /api/products/{id}           - Update (admin)
//! DELETE /api/products/{id}           - Delete (admin)
//!
//! # Cart (requires auth)
//! GET    /api/cart                    - Cart lines
//! POST   /api/cart/add                - Add a product
//! PUT    /api/cart/update             - Set a line's quantity
//! DELETE /api/cart/remove/{cart_id}   - Remove a line
//! DELETE /api/cart/clear              - Remove every line
//! POST   /api/cart/undo               - Revert the last cart mutation
//! GET    /api/cart/undo-info          - What undo would revert
//!
//! # Orders (requires auth)
//! POST   /api/orders/place            - Place an order from the cart
//! POST   /api/orders/process-next     - Complete the head of the queue (admin)
//! GET    /api/orders/queue-status     - Queue contents (admin)
//! GET    /api/orders/my               - Caller's orders
//! GET    /api/orders/{order_id}       - Order details (owner or admin)
//! GET    /api/orders                  - All orders (admin)
//!
//! # Diagnostics
//! GET    /api/data-structures/status  - Sizes of the in-memory engines
//! ```

pub mod cart;
pub mod categories;
pub mod health;
pub mod orders;
pub mod products;
pub mod status;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route("/{id}", put(categories::update).delete(categories::destroy))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::destroy),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", put(cart::update))
        .route("/remove/{cart_id}", delete(cart::remove))
        .route("/clear", delete(cart::clear))
        .route("/undo", post(cart::undo))
        .route("/undo-info", get(cart::undo_info))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/place", post(orders::place))
        .route("/process-next", post(orders::process_next))
        .route("/queue-status", get(orders::queue_status))
        .route("/my", get(orders::mine))
        .route("/{order_id}", get(orders::show))
}

/// Create all routes for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/categories", category_routes())
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .route("/api/data-structures/status", get(status::show))
}
