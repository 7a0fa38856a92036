//! `PostgreSQL` store.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use cartwheel_core::{
    CartId, CategoryId, OrderId, OrderStatus, PaymentId, PaymentStatus, ProductId, UserId,
};

use super::{RepositoryError, Store};
use crate::models::{
    CartItem, CartLine, Category, NewCategory, NewOrder, NewProduct, Order, OrderDetails,
    OrderItem, Payment, PlacedOrder, Product, ProductUpdate,
};

const CATEGORY_COLUMNS: &str = "category_id, category_name, description";

const PRODUCT_COLUMNS: &str = "product_id, name, description, category_id, price, \
                               stock_quantity, image_url, status";

const ORDER_SELECT: &str = r"
    SELECT o.order_id, o.user_id, o.payment_id, o.total, o.status, o.created_at,
           p.payment_method, p.status AS payment_status
    FROM orders o
    LEFT JOIN payments p ON p.payment_id = o.payment_id
";

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn category_name_taken(e: sqlx::Error, name: &str) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("category {name} already exists"))
        }
        _ => RepositoryError::Database(e),
    }
}

fn unknown_category(e: sqlx::Error, id: Option<CategoryId>) -> RepositoryError {
    let Some(id) = id else {
        return RepositoryError::Database(e);
    };
    match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepositoryError::Conflict(format!("category {id} does not exist"))
        }
        _ => RepositoryError::Database(e),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY category_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    #[instrument(skip(self, category), fields(name = %category.category_name))]
    async fn create_category(&self, category: NewCategory) -> Result<Category, RepositoryError> {
        let created = sqlx::query_as::<_, Category>(&format!(
            r"
            INSERT INTO categories (category_name, description)
            VALUES ($1, $2)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(&category.category_name)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| category_name_taken(e, &category.category_name))?;

        debug!(category_id = %created.category_id, "Created category");
        Ok(created)
    }

    #[instrument(skip(self, update), fields(category_id = %id))]
    async fn update_category(
        &self,
        id: CategoryId,
        update: NewCategory,
    ) -> Result<Option<Category>, RepositoryError> {
        let updated = sqlx::query_as::<_, Category>(&format!(
            r"
            UPDATE categories
            SET category_name = $2, description = $3
            WHERE category_id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.category_name)
        .bind(&update.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| category_name_taken(e, &update.category_name))?;
        Ok(updated)
    }

    /// Products keep existing; `ON DELETE SET NULL` detaches them.
    #[instrument(skip(self), fields(category_id = %id))]
    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE category_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_active_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE status = 'active' ORDER BY product_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Loaded active products");
        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let created = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO products
                (name, description, category_id, price, stock_quantity, image_url, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category_id)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(&product.image_url)
        .bind(product.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unknown_category(e, product.category_id))?;

        debug!(product_id = %created.product_id, "Created product");
        Ok(created)
    }

    #[instrument(skip(self, update), fields(product_id = %id))]
    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let updated = sqlx::query_as::<_, Product>(&format!(
            r"
            UPDATE products
            SET name = $2, description = $3, category_id = $4, price = $5,
                stock_quantity = $6, image_url = $7, status = $8
            WHERE product_id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.category_id)
        .bind(update.price)
        .bind(update.stock_quantity)
        .bind(&update.image_url)
        .bind(update.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unknown_category(e, update.category_id))?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cart_items(&self, user: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let items = sqlx::query_as::<_, CartItem>(
            r"
            SELECT c.cart_id, c.product_id, c.quantity, p.name, p.price
            FROM cart c
            JOIN products p ON p.product_id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.cart_id
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    async fn add_to_cart(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartId, RepositoryError> {
        let (cart_id,): (CartId,) = sqlx::query_as(
            r"
            INSERT INTO cart (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart.quantity + EXCLUDED.quantity
            RETURNING cart_id
            ",
        )
        .bind(user)
        .bind(product)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                RepositoryError::Conflict(format!("product {product} does not exist"))
            }
            _ => RepositoryError::Database(e),
        })?;
        Ok(cart_id)
    }

    async fn update_cart_item(
        &self,
        user: UserId,
        cart_id: CartId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE cart SET quantity = $3 WHERE cart_id = $1 AND user_id = $2")
                .bind(cart_id)
                .bind(user)
                .bind(quantity)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_cart_item(
        &self,
        user: UserId,
        cart_id: CartId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart WHERE cart_id = $1 AND user_id = $2")
            .bind(cart_id)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart WHERE user_id = $1")
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, lines), fields(user_id = %user, lines = lines.len()))]
    async fn replace_cart_lines(
        &self,
        user: UserId,
        lines: &[CartLine],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart WHERE user_id = $1")
            .bind(user)
            .execute(&mut *tx)
            .await?;

        for line in lines {
            // Lines for products deleted since the snapshot are dropped.
            sqlx::query(
                r"
                INSERT INTO cart (user_id, product_id, quantity)
                SELECT $1, product_id, $3 FROM products WHERE product_id = $2
                ",
            )
            .bind(user)
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(user_id = %order.user_id, total = %order.total))]
    async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (payment_id,): (PaymentId,) = sqlx::query_as(
            r"
            INSERT INTO payments (amount, payment_method, status)
            VALUES ($1, $2, $3)
            RETURNING payment_id
            ",
        )
        .bind(order.total)
        .bind(&order.payment_method)
        .bind(PaymentStatus::Pending)
        .fetch_one(&mut *tx)
        .await?;

        let (order_id,): (OrderId,) = sqlx::query_as(
            r"
            INSERT INTO orders (user_id, payment_id, total, status)
            VALUES ($1, $2, $3, $4)
            RETURNING order_id
            ",
        )
        .bind(order.user_id)
        .bind(payment_id)
        .bind(order.total)
        .bind(OrderStatus::Processing)
        .fetch_one(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO order_items
                    (order_id, product_id, product_name, quantity, price_at_purchase)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE payments SET order_id = $2, status = $3 WHERE payment_id = $1")
            .bind(payment_id)
            .bind(order_id)
            .bind(PaymentStatus::Completed)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM cart WHERE user_id = $1")
            .bind(order.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(order_id = %order_id, payment_id = %payment_id, "Order written");
        Ok(PlacedOrder {
            order_id,
            payment_id,
        })
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "{ORDER_SELECT} WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.order_id DESC"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "{ORDER_SELECT} ORDER BY o.created_at DESC, o.order_id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn order_details(&self, id: OrderId) -> Result<Option<OrderDetails>, RepositoryError> {
        let Some(order) = sqlx::query_as::<_, Order>(&format!("{ORDER_SELECT} WHERE o.order_id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT product_id, product_name, quantity, price_at_purchase
            FROM order_items
            WHERE order_id = $1
            ORDER BY item_id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let payment = match order.payment_id {
            Some(payment_id) => {
                sqlx::query_as::<_, Payment>(
                    r"
                    SELECT payment_id, order_id, amount, payment_method, status
                    FROM payments
                    WHERE payment_id = $1
                    ",
                )
                .bind(payment_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => None,
        };

        Ok(Some(OrderDetails {
            order,
            items,
            payment,
        }))
    }

    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE order_id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
