//! Catalog product rows.

use cartwheel_core::{CategoryId, Money, ProductId, ProductStatus};
use serde::{Deserialize, Serialize};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub price: Money,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub status: ProductStatus,
}

impl Product {
    /// Whether the product is visible to shoppers.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

/// Fields for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub price: Money,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: ProductStatus,
}

/// Full replacement of a product's mutable fields.
pub type ProductUpdate = NewProduct;

impl NewProduct {
    /// Check field constraints before the write reaches the store.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_owned());
        }
        if self.price.is_negative() {
            return Err("price must not be negative".to_owned());
        }
        if self.stock_quantity < 0 {
            return Err("stock_quantity must not be negative".to_owned());
        }
        Ok(())
    }
}
