//! Order placement.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use cartwheel_core::{Money, OrderId, UserId};

use super::cart::CartService;
use super::order_queue::{OrderJob, OrderQueue};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{NewOrder, OrderLine};

/// Payment method used when the client does not name one.
pub const DEFAULT_PAYMENT_METHOD: &str = "card";

/// Result of placing an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub total: Money,
    pub queue_position: usize,
}

/// Turns carts into orders and queues them for processing.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    cart: CartService,
    queue: Arc<OrderQueue>,
}

impl CheckoutService {
    /// Create a checkout service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cart: CartService, queue: Arc<OrderQueue>) -> Self {
        Self { store, cart, queue }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// The payment, order, item rows and cart clear are one store
    /// transaction. The job is enqueued only after it commits, so a failed
    /// placement leaves neither rows nor a queued job behind.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for an empty cart, `Conflict` if the cart stays
    /// locked, and `Database` if the transaction fails.
    #[instrument(skip_all, fields(user_id = %user))]
    pub async fn place_order(&self, user: UserId, payment_method: &str) -> Result<OrderReceipt> {
        let _guard = self.cart.lock(user).await?;

        let items = self.store.cart_items(user).await?;
        if items.is_empty() {
            return Err(AppError::BadRequest("Cart empty".to_string()));
        }

        let total: Money = items.iter().map(|item| item.line_total()).sum();
        let lines: Vec<OrderLine> = items.iter().map(OrderLine::from).collect();

        let placed = self
            .store
            .place_order(NewOrder {
                user_id: user,
                payment_method: payment_method.to_string(),
                total,
                items,
            })
            .await?;

        let queue_position = self.queue.enqueue(OrderJob {
            order_id: placed.order_id,
            user_id: user,
            payment_id: placed.payment_id,
            total_amount: total,
            items: lines,
            enqueued_at: Utc::now(),
        });

        info!(
            order_id = %placed.order_id,
            total = %total,
            queue_position,
            "Order placed"
        );

        Ok(OrderReceipt {
            order_id: placed.order_id,
            total,
            queue_position,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use cartwheel_core::{OrderStatus, ProductStatus};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewProduct;
    use crate::services::catalog::{CatalogService, ProductCache};
    use crate::services::history::ActionHistory;

    #[tokio::test]
    async fn test_place_order_totals_and_enqueues() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let catalog = CatalogService::new(Arc::clone(&store), Arc::new(ProductCache::new()));
        let cart = CartService::new(
            Arc::clone(&store),
            catalog.clone(),
            Arc::new(ActionHistory::new()),
            Duration::from_millis(200),
        );
        let queue = Arc::new(OrderQueue::new());
        let checkout = CheckoutService::new(Arc::clone(&store), cart.clone(), Arc::clone(&queue));
        let user = UserId::new(3);

        assert!(matches!(
            checkout.place_order(user, DEFAULT_PAYMENT_METHOD).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(queue.is_empty());

        let product = catalog
            .create(NewProduct {
                name: "Lychee".to_string(),
                description: None,
                category_id: None,
                price: Money::from_cents(1250),
                stock_quantity: 8,
                image_url: None,
                status: ProductStatus::Active,
            })
            .await
            .unwrap();
        cart.add(user, product.product_id, 3).await.unwrap();

        let receipt = checkout.place_order(user, "paypal").await.unwrap();
        assert_eq!(receipt.total, Money::from_cents(3750));
        assert_eq!(receipt.queue_position, 1);

        let job = queue.peek_front().unwrap();
        assert_eq!(job.order_id, receipt.order_id);
        assert_eq!(job.items.len(), 1);
        assert_eq!(job.items[0].quantity, 3);

        assert!(cart.items(user).await.unwrap().is_empty());
        let details = store.order_details(receipt.order_id).await.unwrap().unwrap();
        assert_eq!(details.order.status, OrderStatus::Processing);
        assert_eq!(details.order.total, receipt.total);
    }
}
