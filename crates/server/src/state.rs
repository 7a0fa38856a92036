//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::services::{
    ActionHistory, CartService, CatalogService, CheckoutService, OrderQueue, OrderWorker,
    ProductCache, TokenService,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The three in-memory engines
/// (undo history, order queue, product cache) are created here once per
/// process and shared by every request.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn Store>,
    tokens: TokenService,
    history: Arc<ActionHistory>,
    queue: Arc<OrderQueue>,
    catalog: CatalogService,
    cart: CartService,
    checkout: CheckoutService,
    worker: OrderWorker,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `store` - Persistence collaborator
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<dyn Store>) -> Self {
        let tokens = TokenService::new(&config.auth);
        let history = Arc::new(ActionHistory::with_max_depth(config.history_max_depth));
        let queue = Arc::new(OrderQueue::new());
        let cache = Arc::new(ProductCache::with_capacity(config.product_cache_capacity));

        let catalog = CatalogService::new(Arc::clone(&store), cache);
        let cart = CartService::new(
            Arc::clone(&store),
            catalog.clone(),
            Arc::clone(&history),
            config.cart_lock_timeout,
        );
        let checkout = CheckoutService::new(Arc::clone(&store), cart.clone(), Arc::clone(&queue));
        let worker = OrderWorker::new(Arc::clone(&store), Arc::clone(&queue));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                history,
                queue,
                catalog,
                cart,
                checkout,
                worker,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the persistence collaborator.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Get a reference to the bearer token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get a reference to the undo history.
    #[must_use]
    pub fn history(&self) -> &ActionHistory {
        &self.inner.history
    }

    /// Get a reference to the order processing queue.
    #[must_use]
    pub fn queue(&self) -> &OrderQueue {
        &self.inner.queue
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    /// Get a reference to the order worker.
    #[must_use]
    pub fn worker(&self) -> &OrderWorker {
        &self.inner.worker
    }
}
