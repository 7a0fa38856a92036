//! Cart rows and the snapshots taken of them.

use cartwheel_core::{CartId, Money, ProductId};
use serde::{Deserialize, Serialize};

/// A cart row joined with its product's name and current price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub name: String,
    pub price: Money,
}

impl CartItem {
    /// Price of this line.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }
}

/// Snapshot of one cart line, as captured before a mutation.
///
/// Re-inserting a sequence of these in order reproduces the cart the
/// snapshot was taken from (modulo freshly assigned cart ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl From<&CartItem> for CartLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}
