//! Order, order item, and payment rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartwheel_core::{Money, OrderId, OrderStatus, PaymentId, PaymentStatus, ProductId, UserId};

use super::CartItem;

/// An order row, joined with its payment's method and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment_id: Option<PaymentId>,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub payment_method: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

/// An order item row with the product name at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_purchase: Money,
}

/// A payment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub order_id: Option<OrderId>,
    pub amount: Money,
    pub payment_method: String,
    pub status: PaymentStatus,
}

/// An order with its items and payment.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Option<Payment>,
}

/// One purchased line carried by a queued order job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i32,
    pub price: Money,
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name.clone(),
            quantity: item.quantity,
            price: item.price,
        }
    }
}

/// Everything the store needs to write an order in one transaction.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub payment_method: String,
    pub total: Money,
    pub items: Vec<CartItem>,
}

/// Row ids assigned by a successful order placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
}
