//! Product catalog with read-through caching.
//!
//! Reads go through [`KeyedCache`] under the keys `all_products` and
//! `product_<id>`. Every write invalidates both keys for the product it
//! touched before returning, so the next read after a successful write
//! always reaches the store.
//!
//! Categories are read straight from the store. Deleting one detaches its
//! products, so it clears the whole cache.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use cartwheel_core::{CategoryId, ProductId};

use super::cache::{ALL_PRODUCTS_KEY, KeyedCache, product_key};
use crate::db::{RepositoryError, Store};
use crate::models::{Category, NewCategory, NewProduct, Product, ProductUpdate};

/// Values held by the product cache.
#[derive(Debug, Clone)]
pub enum CatalogEntry {
    /// Every active product, under `all_products`.
    Listing(Arc<Vec<Product>>),
    /// One product, under `product_<id>`.
    Product(Arc<Product>),
}

/// Cache type used for products.
pub type ProductCache = KeyedCache<CatalogEntry>;

/// Product reads and writes.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    cache: Arc<ProductCache>,
}

impl CatalogService {
    /// Create a catalog over `store`, caching into `cache`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cache: Arc<ProductCache>) -> Self {
        Self { store, cache }
    }

    /// Every active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a cache miss cannot be filled from the store.
    pub async fn list_active(&self) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(CatalogEntry::Listing(products)) = self.cache.get(ALL_PRODUCTS_KEY) {
            debug!(key = ALL_PRODUCTS_KEY, "Cache hit");
            return Ok(products);
        }

        let epoch = self.cache.epoch();
        let products = Arc::new(self.store.list_active_products().await?);
        self.cache.set_if_current(
            ALL_PRODUCTS_KEY,
            CatalogEntry::Listing(Arc::clone(&products)),
            epoch,
        );
        debug!(key = ALL_PRODUCTS_KEY, count = products.len(), "Cache miss, loaded from store");
        Ok(products)
    }

    /// One product by id, regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a cache miss cannot be filled from the store.
    pub async fn get(&self, id: ProductId) -> Result<Option<Arc<Product>>, RepositoryError> {
        let key = product_key(id);
        if let Some(CatalogEntry::Product(product)) = self.cache.get(&key) {
            debug!(key = %key, "Cache hit");
            return Ok(Some(product));
        }

        let epoch = self.cache.epoch();
        let Some(product) = self.store.get_product(id).await? else {
            return Ok(None);
        };
        let product = Arc::new(product);
        self.cache
            .set_if_current(key, CatalogEntry::Product(Arc::clone(&product)), epoch);
        Ok(Some(product))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store rejects the insert.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let created = self.store.create_product(product).await?;
        self.invalidate(created.product_id);
        info!(product_id = %created.product_id, "Product created");
        Ok(created)
    }

    /// Replace a product's fields. Returns `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store rejects the update.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let updated = self.store.update_product(id, update).await;
        // Invalidate on every outcome; a failed call may still have written.
        self.invalidate(id);
        let updated = updated?;
        if updated.is_some() {
            info!(product_id = %id, "Product updated");
        }
        Ok(updated)
    }

    /// Delete a product. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store rejects the delete.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let deleted = self.store.delete_product(id).await;
        self.invalidate(id);
        let deleted = deleted?;
        if deleted {
            info!(product_id = %id, "Product deleted");
        }
        Ok(deleted)
    }

    /// Every category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        self.store.list_categories().await
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    #[instrument(skip(self, category), fields(name = %category.category_name))]
    pub async fn create_category(
        &self,
        category: NewCategory,
    ) -> Result<Category, RepositoryError> {
        let created = self.store.create_category(category).await?;
        info!(category_id = %created.category_id, "Category created");
        Ok(created)
    }

    /// Replace a category's fields. Returns `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    #[instrument(skip(self, update))]
    pub async fn update_category(
        &self,
        id: CategoryId,
        update: NewCategory,
    ) -> Result<Option<Category>, RepositoryError> {
        let updated = self.store.update_category(id, update).await?;
        if updated.is_some() {
            info!(category_id = %id, "Category updated");
        }
        Ok(updated)
    }

    /// Delete a category. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store rejects the delete.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let deleted = self.store.delete_category(id).await;
        // Any cached product may have pointed at it
        self.cache.clear();
        let deleted = deleted?;
        if deleted {
            info!(category_id = %id, "Category deleted");
        }
        Ok(deleted)
    }

    /// The cache backing this catalog.
    #[must_use]
    pub fn cache(&self) -> &ProductCache {
        &self.cache
    }

    fn invalidate(&self, id: ProductId) {
        let key = product_key(id);
        self.cache.delete_many([ALL_PRODUCTS_KEY, key.as_str()]);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwheel_core::{Money, ProductStatus};

    use super::*;
    use crate::db::MemoryStore;

    fn new_product(name: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            category_id: None,
            price: Money::from_cents(499),
            stock_quantity: 3,
            image_url: None,
            status: ProductStatus::Active,
        }
    }

    fn catalog() -> CatalogService {
        CatalogService::new(Arc::new(MemoryStore::new()), Arc::new(ProductCache::new()))
    }

    #[tokio::test]
    async fn test_list_populates_cache() {
        let catalog = catalog();
        catalog.create(new_product("Guava")).await.unwrap();

        assert!(!catalog.cache().has(ALL_PRODUCTS_KEY));
        let products = catalog.list_active().await.unwrap();
        assert_eq!(products.len(), 1);
        assert!(catalog.cache().has(ALL_PRODUCTS_KEY));
    }

    #[tokio::test]
    async fn test_writes_invalidate_both_keys() {
        let catalog = catalog();
        let product = catalog.create(new_product("Papaya")).await.unwrap();
        let id = product.product_id;

        catalog.list_active().await.unwrap();
        catalog.get(id).await.unwrap();
        assert!(catalog.cache().has(ALL_PRODUCTS_KEY));
        assert!(catalog.cache().has(&product_key(id)));

        let mut update = new_product("Papaya XL");
        update.price = Money::from_cents(899);
        catalog.update(id, update).await.unwrap().unwrap();

        assert!(!catalog.cache().has(ALL_PRODUCTS_KEY));
        assert!(!catalog.cache().has(&product_key(id)));
        assert_eq!(catalog.get(id).await.unwrap().unwrap().name, "Papaya XL");

        catalog.list_active().await.unwrap();
        assert!(catalog.delete(id).await.unwrap());
        assert!(!catalog.cache().has(ALL_PRODUCTS_KEY));
        assert!(!catalog.cache().has(&product_key(id)));
        assert!(catalog.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_product_is_not_cached() {
        let catalog = catalog();
        assert!(catalog.get(ProductId::new(77)).await.unwrap().is_none());
        assert!(!catalog.cache().has("product_77"));
    }

    #[tokio::test]
    async fn test_category_delete_clears_cached_products() {
        let catalog = catalog();
        let fruit = catalog
            .create_category(NewCategory {
                category_name: "Fruit".to_string(),
                description: Some("Fresh".to_string()),
            })
            .await
            .unwrap();
        let mut fields = new_product("Lychee");
        fields.category_id = Some(fruit.category_id);
        let id = catalog.create(fields).await.unwrap().product_id;

        let cached = catalog.get(id).await.unwrap().unwrap();
        assert_eq!(cached.category_id, Some(fruit.category_id));
        catalog.list_active().await.unwrap();

        assert!(catalog.delete_category(fruit.category_id).await.unwrap());
        assert!(!catalog.cache().has(ALL_PRODUCTS_KEY));
        assert!(!catalog.cache().has(&product_key(id)));
        assert_eq!(catalog.get(id).await.unwrap().unwrap().category_id, None);
        assert!(catalog.categories().await.unwrap().is_empty());
    }
}
