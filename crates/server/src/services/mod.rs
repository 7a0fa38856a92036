//! Business logic services.
//!
//! # Engines
//!
//! - `history` - Per-user undo stacks for cart mutations
//! - `order_queue` - FIFO queue of placed orders awaiting processing
//! - `cache` - Write-invalidated key-value cache
//!
//! # Services
//!
//! - `auth` - Bearer token issuing and verification
//! - `cart` - Cart mutations with undo
//! - `catalog` - Product reads through the cache, writes with invalidation
//! - `checkout` - Order placement
//! - `worker` - Order queue draining

pub mod auth;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod history;
pub mod order_queue;
pub mod worker;

pub use auth::{AuthError, Claims, TokenService};
pub use cache::{ALL_PRODUCTS_KEY, KeyedCache, product_key};
pub use cart::{CartAddition, CartService, UndoInfo, UndoOutcome};
pub use catalog::{CatalogEntry, CatalogService, ProductCache};
pub use checkout::{CheckoutService, DEFAULT_PAYMENT_METHOD, OrderReceipt};
pub use history::{ActionDetail, ActionHistory, ActionKind, ActionRecord, HistoryStats};
pub use order_queue::{OrderJob, OrderQueue, QueuedJob};
pub use worker::OrderWorker;
