//! In-memory store.
//!
//! Used by tests and when the server starts without a database URL. All
//! tables sit behind one mutex, so every trait method is atomic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use cartwheel_core::{
    CartId, CategoryId, Money, OrderId, OrderStatus, PaymentId, PaymentStatus, ProductId, UserId,
};

use super::{RepositoryError, Store};
use crate::models::{
    CartItem, CartLine, Category, NewCategory, NewOrder, NewProduct, Order, OrderDetails,
    OrderItem, Payment, PlacedOrder, Product, ProductUpdate,
};

#[derive(Debug, Clone, Copy)]
struct CartRow {
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
}

#[derive(Debug, Clone)]
struct OrderRow {
    user_id: UserId,
    payment_id: Option<PaymentId>,
    total: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    cart: BTreeMap<CartId, CartRow>,
    orders: BTreeMap<OrderId, OrderRow>,
    order_items: Vec<(OrderId, OrderItem)>,
    payments: BTreeMap<PaymentId, Payment>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    /// Mirrors the unique constraint on `categories.category_name`.
    fn check_category_name(
        &self,
        name: &str,
        except: Option<CategoryId>,
    ) -> Result<(), RepositoryError> {
        let taken = self
            .categories
            .values()
            .any(|c| c.category_name == name && Some(c.category_id) != except);
        if taken {
            return Err(RepositoryError::Conflict(format!(
                "category {name} already exists"
            )));
        }
        Ok(())
    }

    /// Mirrors the foreign key from `products.category_id`.
    fn check_category(&self, id: Option<CategoryId>) -> Result<(), RepositoryError> {
        match id {
            Some(id) if !self.categories.contains_key(&id) => Err(RepositoryError::Conflict(
                format!("category {id} does not exist"),
            )),
            _ => Ok(()),
        }
    }

    fn insert_cart_row(&mut self, user_id: UserId, product_id: ProductId, quantity: i32) -> CartId {
        let cart_id = CartId::new(self.next_id());
        self.cart.insert(
            cart_id,
            CartRow {
                user_id,
                product_id,
                quantity,
            },
        );
        cart_id
    }

    fn clear_cart(&mut self, user: UserId) {
        self.cart.retain(|_, row| row.user_id != user);
    }

    fn order(&self, order_id: OrderId, row: &OrderRow) -> Order {
        let payment = row.payment_id.and_then(|id| self.payments.get(&id));
        Order {
            order_id,
            user_id: row.user_id,
            payment_id: row.payment_id,
            total: row.total,
            status: row.status,
            created_at: row.created_at,
            payment_method: payment.map(|p| p.payment_method.clone()),
            payment_status: payment.map(|p| p.status),
        }
    }

    fn orders_newest_first(&self, filter: impl Fn(&OrderRow) -> bool) -> Vec<Order> {
        self.orders
            .iter()
            .rev()
            .filter(|(_, row)| filter(row))
            .map(|(id, row)| self.order(*id, row))
            .collect()
    }
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn product_from(id: ProductId, fields: NewProduct) -> Product {
    Product {
        product_id: id,
        name: fields.name,
        description: fields.description,
        category_id: fields.category_id,
        price: fields.price,
        stock_quantity: fields.stock_quantity,
        image_url: fields.image_url,
        status: fields.status,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        Ok(self.tables.lock().categories.values().cloned().collect())
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, RepositoryError> {
        let mut tables = self.tables.lock();
        tables.check_category_name(&category.category_name, None)?;
        let id = CategoryId::new(tables.next_id());
        let category = Category {
            category_id: id,
            category_name: category.category_name,
            description: category.description,
        };
        tables.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        update: NewCategory,
    ) -> Result<Option<Category>, RepositoryError> {
        let mut tables = self.tables.lock();
        if !tables.categories.contains_key(&id) {
            return Ok(None);
        }
        tables.check_category_name(&update.category_name, Some(id))?;
        let category = Category {
            category_id: id,
            category_name: update.category_name,
            description: update.description,
        };
        tables.categories.insert(id, category.clone());
        Ok(Some(category))
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock();
        let existed = tables.categories.remove(&id).is_some();
        if existed {
            for product in tables.products.values_mut() {
                if product.category_id == Some(id) {
                    product.category_id = None;
                }
            }
        }
        Ok(existed)
    }

    async fn list_active_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .products
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.tables.lock().products.get(&id).cloned())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.lock();
        tables.check_category(product.category_id)?;
        let id = ProductId::new(tables.next_id());
        let product = product_from(id, product);
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut tables = self.tables.lock();
        if !tables.products.contains_key(&id) {
            return Ok(None);
        }
        tables.check_category(update.category_id)?;
        let Some(slot) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        *slot = product_from(id, update);
        Ok(Some(slot.clone()))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock();
        let existed = tables.products.remove(&id).is_some();
        if existed {
            tables.cart.retain(|_, row| row.product_id != id);
        }
        Ok(existed)
    }

    async fn cart_items(&self, user: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let tables = self.tables.lock();
        tables
            .cart
            .iter()
            .filter(|(_, row)| row.user_id == user)
            .map(|(cart_id, row)| {
                let product = tables.products.get(&row.product_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart line {cart_id} references missing product {}",
                        row.product_id
                    ))
                })?;
                Ok(CartItem {
                    cart_id: *cart_id,
                    product_id: row.product_id,
                    quantity: row.quantity,
                    name: product.name.clone(),
                    price: product.price,
                })
            })
            .collect()
    }

    async fn add_to_cart(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartId, RepositoryError> {
        let mut tables = self.tables.lock();
        if !tables.products.contains_key(&product) {
            return Err(RepositoryError::Conflict(format!(
                "product {product} does not exist"
            )));
        }

        let existing = tables
            .cart
            .iter_mut()
            .find(|(_, row)| row.user_id == user && row.product_id == product);
        if let Some((cart_id, row)) = existing {
            row.quantity += quantity;
            return Ok(*cart_id);
        }

        Ok(tables.insert_cart_row(user, product, quantity))
    }

    async fn update_cart_item(
        &self,
        user: UserId,
        cart_id: CartId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock();
        match tables.cart.get_mut(&cart_id) {
            Some(row) if row.user_id == user => {
                row.quantity = quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_cart_item(
        &self,
        user: UserId,
        cart_id: CartId,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock();
        let owned = tables
            .cart
            .get(&cart_id)
            .is_some_and(|row| row.user_id == user);
        if owned {
            tables.cart.remove(&cart_id);
        }
        Ok(owned)
    }

    async fn clear_cart(&self, user: UserId) -> Result<(), RepositoryError> {
        self.tables.lock().clear_cart(user);
        Ok(())
    }

    async fn replace_cart_lines(
        &self,
        user: UserId,
        lines: &[CartLine],
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock();
        tables.clear_cart(user);
        for line in lines {
            // Lines for products deleted since the snapshot are dropped.
            if tables.products.contains_key(&line.product_id) {
                tables.insert_cart_row(user, line.product_id, line.quantity);
            }
        }
        Ok(())
    }

    async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, RepositoryError> {
        let mut tables = self.tables.lock();

        let payment_id = PaymentId::new(tables.next_id());
        let order_id = OrderId::new(tables.next_id());

        tables.payments.insert(
            payment_id,
            Payment {
                payment_id,
                order_id: Some(order_id),
                amount: order.total,
                payment_method: order.payment_method,
                status: PaymentStatus::Completed,
            },
        );
        tables.orders.insert(
            order_id,
            OrderRow {
                user_id: order.user_id,
                payment_id: Some(payment_id),
                total: order.total,
                status: OrderStatus::Processing,
                created_at: Utc::now(),
            },
        );
        for item in &order.items {
            tables.order_items.push((
                order_id,
                OrderItem {
                    product_id: item.product_id,
                    product_name: item.name.clone(),
                    quantity: item.quantity,
                    price_at_purchase: item.price,
                },
            ));
        }
        tables.clear_cart(order.user_id);

        Ok(PlacedOrder {
            order_id,
            payment_id,
        })
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .orders_newest_first(|row| row.user_id == user))
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.tables.lock().orders_newest_first(|_| true))
    }

    async fn order_details(&self, id: OrderId) -> Result<Option<OrderDetails>, RepositoryError> {
        let tables = self.tables.lock();
        let Some(row) = tables.orders.get(&id) else {
            return Ok(None);
        };
        let order = tables.order(id, row);
        let items = tables
            .order_items
            .iter()
            .filter(|(order_id, _)| *order_id == id)
            .map(|(_, item)| item.clone())
            .collect();
        let payment = row
            .payment_id
            .and_then(|payment_id| tables.payments.get(&payment_id).cloned());

        Ok(Some(OrderDetails {
            order,
            items,
            payment,
        }))
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock();
        Ok(tables
            .orders
            .get_mut(&id)
            .map(|row| row.status = status)
            .is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwheel_core::ProductStatus;

    use super::*;

    fn new_product(name: &str, cents: i64, status: ProductStatus) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            category_id: None,
            price: Money::from_cents(cents),
            stock_quantity: 10,
            image_url: None,
            status,
        }
    }

    #[tokio::test]
    async fn test_add_to_cart_merges_same_product() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let product = store
            .create_product(new_product("Pineapple", 300, ProductStatus::Active))
            .await
            .unwrap();

        let first = store.add_to_cart(user, product.product_id, 1).await.unwrap();
        let second = store.add_to_cart(user, product.product_id, 2).await.unwrap();

        assert_eq!(first, second);
        let items = store.cart_items(user).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].line_total(), Money::from_cents(900));
    }

    #[tokio::test]
    async fn test_add_unknown_product_conflicts() {
        let store = MemoryStore::new();
        let err = store
            .add_to_cart(UserId::new(1), ProductId::new(99), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_cart_lines_are_private_to_user() {
        let store = MemoryStore::new();
        let product = store
            .create_product(new_product("Mango", 250, ProductStatus::Active))
            .await
            .unwrap();
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        let cart_id = store.add_to_cart(alice, product.product_id, 1).await.unwrap();

        assert!(!store.update_cart_item(bob, cart_id, 5).await.unwrap());
        assert!(!store.remove_cart_item(bob, cart_id).await.unwrap());
        assert_eq!(store.cart_items(alice).await.unwrap()[0].quantity, 1);
        assert!(store.cart_items(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_cart_lines_preserves_order_and_skips_deleted_products() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let a = store
            .create_product(new_product("A", 100, ProductStatus::Active))
            .await
            .unwrap();
        let b = store
            .create_product(new_product("B", 200, ProductStatus::Active))
            .await
            .unwrap();
        store.add_to_cart(user, a.product_id, 9).await.unwrap();

        let snapshot = [
            CartLine {
                product_id: b.product_id,
                quantity: 2,
            },
            CartLine {
                product_id: ProductId::new(404),
                quantity: 1,
            },
            CartLine {
                product_id: a.product_id,
                quantity: 1,
            },
        ];
        store.replace_cart_lines(user, &snapshot).await.unwrap();

        let lines: Vec<CartLine> = store
            .cart_items(user)
            .await
            .unwrap()
            .iter()
            .map(CartLine::from)
            .collect();
        assert_eq!(lines, vec![snapshot[0], snapshot[2]]);
    }

    #[tokio::test]
    async fn test_list_active_products_hides_inactive() {
        let store = MemoryStore::new();
        store
            .create_product(new_product("Shown", 100, ProductStatus::Active))
            .await
            .unwrap();
        let hidden = store
            .create_product(new_product("Hidden", 100, ProductStatus::Inactive))
            .await
            .unwrap();

        let names: Vec<_> = store
            .list_active_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Shown".to_string()]);
        assert!(store.get_product(hidden.product_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_place_order_writes_rows_and_clears_cart() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let product = store
            .create_product(new_product("Kiwi", 150, ProductStatus::Active))
            .await
            .unwrap();
        store.add_to_cart(user, product.product_id, 2).await.unwrap();
        let items = store.cart_items(user).await.unwrap();

        let placed = store
            .place_order(NewOrder {
                user_id: user,
                payment_method: "card".to_string(),
                total: Money::from_cents(300),
                items,
            })
            .await
            .unwrap();

        assert!(store.cart_items(user).await.unwrap().is_empty());
        let details = store.order_details(placed.order_id).await.unwrap().unwrap();
        assert_eq!(details.order.status, OrderStatus::Processing);
        assert_eq!(details.order.payment_method.as_deref(), Some("card"));
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].product_name, "Kiwi");
        let payment = details.payment.unwrap();
        assert_eq!(payment.payment_id, placed.payment_id);
        assert_eq!(payment.order_id, Some(placed.order_id));
        assert_eq!(payment.status, PaymentStatus::Completed);

        assert!(
            store
                .update_order_status(placed.order_id, OrderStatus::Completed)
                .await
                .unwrap()
        );
        assert_eq!(
            store.orders_for_user(user).await.unwrap()[0].status,
            OrderStatus::Completed
        );
        assert!(
            !store
                .update_order_status(OrderId::new(999), OrderStatus::Completed)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_delete_product_drops_cart_lines() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let product = store
            .create_product(new_product("Lime", 50, ProductStatus::Active))
            .await
            .unwrap();
        store.add_to_cart(user, product.product_id, 1).await.unwrap();

        assert!(store.delete_product(product.product_id).await.unwrap());
        assert!(!store.delete_product(product.product_id).await.unwrap());
        assert!(store.cart_items(user).await.unwrap().is_empty());
    }

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            category_name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_category_names_are_unique() {
        let store = MemoryStore::new();
        let fruit = store.create_category(new_category("Fruit")).await.unwrap();
        let veg = store.create_category(new_category("Veg")).await.unwrap();

        let err = store.create_category(new_category("Fruit")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        let err = store
            .update_category(veg.category_id, new_category("Fruit"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        // Renaming to its own name is fine
        let renamed = store
            .update_category(fruit.category_id, new_category("Fruit"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed, fruit);
        assert!(
            store
                .update_category(CategoryId::new(999), new_category("Nuts"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_product_category_must_exist() {
        let store = MemoryStore::new();
        let mut fields = new_product("Kiwi", 80, ProductStatus::Active);
        fields.category_id = Some(CategoryId::new(42));

        let err = store.create_product(fields.clone()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(store.list_active_products().await.unwrap().is_empty());

        let product = store
            .create_product(new_product("Kiwi", 80, ProductStatus::Active))
            .await
            .unwrap();
        let err = store
            .update_product(product.product_id, fields)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_category_detaches_products() {
        let store = MemoryStore::new();
        let fruit = store.create_category(new_category("Fruit")).await.unwrap();
        let mut fields = new_product("Mango", 250, ProductStatus::Active);
        fields.category_id = Some(fruit.category_id);
        let mango = store.create_product(fields).await.unwrap();
        assert_eq!(mango.category_id, Some(fruit.category_id));

        assert!(store.delete_category(fruit.category_id).await.unwrap());
        assert!(!store.delete_category(fruit.category_id).await.unwrap());
        assert!(store.list_categories().await.unwrap().is_empty());

        let mango = store.get_product(mango.product_id).await.unwrap().unwrap();
        assert_eq!(mango.category_id, None);
    }
}
