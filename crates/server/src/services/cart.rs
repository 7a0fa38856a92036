//! Cart mutations with undo.
//!
//! Every mutation runs under the caller's cart lock: snapshot the current
//! lines, apply the change in the store, then record the snapshot in
//! [`ActionHistory`]. A record is only pushed after the store accepted the
//! change, and an undo whose store write fails puts its record back.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

use cartwheel_core::{CartId, ProductId, UserId};

use super::catalog::CatalogService;
use super::history::{ActionDetail, ActionHistory, ActionKind};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{CartItem, CartLine};

/// Result of adding a product to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartAddition {
    pub cart_id: CartId,
    pub stack_size: usize,
}

/// Result of a successful undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UndoOutcome {
    pub undone_action: ActionKind,
    pub remaining_actions: usize,
}

/// What an undo would currently revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UndoInfo {
    pub size: usize,
    pub can_undo: bool,
    pub last_action: Option<ActionKind>,
}

type CartLocks = DashMap<UserId, Arc<Mutex<()>>>;

/// Drop the user's lock entry if nothing but the map still refers to it.
///
/// Lookups clone the `Arc` under the shard lock, so a concurrent locker
/// either keeps the entry alive or creates a fresh one after removal.
fn prune_lock(locks: &CartLocks, user: UserId) {
    locks.remove_if(&user, |_, mutex| Arc::strong_count(mutex) == 1);
}

/// Exclusive hold on one user's cart.
///
/// Dropping it releases the lock and forgets the user's entry once no other
/// caller is waiting, so the lock map only holds carts in use.
pub(crate) struct CartGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<CartLocks>,
    user: UserId,
}

impl Drop for CartGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune_lock(&self.locks, self.user);
    }
}

/// Cart operations for authenticated users.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    catalog: CatalogService,
    history: Arc<ActionHistory>,
    locks: Arc<CartLocks>,
    lock_timeout: Duration,
}

impl CartService {
    /// Create a cart service.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        catalog: CatalogService,
        history: Arc<ActionHistory>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            history,
            locks: Arc::new(DashMap::new()),
            lock_timeout,
        }
    }

    /// Serialize cart mutations per user.
    ///
    /// Waits at most the configured timeout, then reports a conflict the
    /// caller may retry.
    pub(crate) async fn lock(&self, user: UserId) -> Result<CartGuard> {
        let mutex = Arc::clone(self.locks.entry(user).or_default().value());
        let Ok(guard) = tokio::time::timeout(self.lock_timeout, mutex.lock_owned()).await else {
            prune_lock(&self.locks, user);
            warn!(user_id = %user, "Timed out waiting for cart lock");
            return Err(AppError::Conflict(
                "Cart is busy with another change, retry".to_string(),
            ));
        };
        Ok(CartGuard {
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
            user,
        })
    }

    async fn snapshot(&self, user: UserId) -> Result<(Vec<CartItem>, Vec<CartLine>)> {
        let items = self.store.cart_items(user).await?;
        let lines = items.iter().map(CartLine::from).collect();
        Ok((items, lines))
    }

    /// The user's cart lines.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store read fails.
    pub async fn items(&self, user: UserId) -> Result<Vec<CartItem>> {
        Ok(self.store.cart_items(user).await?)
    }

    /// Add `quantity` of an active product.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a quantity below 1, `NotFound` for an unknown
    /// or inactive product, `Conflict` if the cart stays locked, and
    /// `Database` if the store write fails.
    #[instrument(skip_all, fields(user_id = %user, product_id = %product_id))]
    pub async fn add(
        &self,
        user: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartAddition> {
        ensure_positive(quantity)?;
        match self.catalog.get(product_id).await? {
            Some(product) if product.is_active() => {}
            _ => return Err(AppError::NotFound("Product not found".to_string())),
        }

        let _guard = self.lock(user).await?;
        let (_, previous) = self.snapshot(user).await?;
        let cart_id = self.store.add_to_cart(user, product_id, quantity).await?;
        let stack_size = self.history.record(
            user,
            ActionKind::Add,
            previous,
            ActionDetail::Added {
                product_id,
                quantity,
            },
        );

        Ok(CartAddition {
            cart_id,
            stack_size,
        })
    }

    /// Set the quantity of one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a quantity below 1, `NotFound` if the line is
    /// not in the user's cart, `Conflict` if the cart stays locked, and
    /// `Database` if the store write fails.
    #[instrument(skip_all, fields(user_id = %user, cart_id = %cart_id))]
    pub async fn update(&self, user: UserId, cart_id: CartId, quantity: i32) -> Result<usize> {
        ensure_positive(quantity)?;

        let _guard = self.lock(user).await?;
        let (items, previous) = self.snapshot(user).await?;
        let old_quantity = find_line(&items, cart_id)?.quantity;

        if !self.store.update_cart_item(user, cart_id, quantity).await? {
            return Err(cart_item_not_found());
        }

        Ok(self.history.record(
            user,
            ActionKind::Update,
            previous,
            ActionDetail::Updated {
                cart_id,
                old_quantity,
                new_quantity: quantity,
            },
        ))
    }

    /// Remove one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the line is not in the user's cart, `Conflict` if
    /// the cart stays locked, and `Database` if the store write fails.
    #[instrument(skip_all, fields(user_id = %user, cart_id = %cart_id))]
    pub async fn remove(&self, user: UserId, cart_id: CartId) -> Result<usize> {
        let _guard = self.lock(user).await?;
        let (items, previous) = self.snapshot(user).await?;
        let line = find_line(&items, cart_id)?;
        let detail = ActionDetail::Removed {
            cart_id,
            product_id: line.product_id,
            quantity: line.quantity,
        };

        if !self.store.remove_cart_item(user, cart_id).await? {
            return Err(cart_item_not_found());
        }

        Ok(self
            .history
            .record(user, ActionKind::Remove, previous, detail))
    }

    /// Remove every line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the cart stays locked and `Database` if the store
    /// write fails.
    #[instrument(skip_all, fields(user_id = %user))]
    pub async fn clear(&self, user: UserId) -> Result<usize> {
        let _guard = self.lock(user).await?;
        let (_, previous) = self.snapshot(user).await?;
        self.store.clear_cart(user).await?;

        let line_count = previous.len();
        Ok(self.history.record(
            user,
            ActionKind::Clear,
            previous,
            ActionDetail::Cleared { line_count },
        ))
    }

    /// Revert the user's most recent cart mutation.
    ///
    /// # Errors
    ///
    /// Returns `NothingToUndo` with an empty history, `Conflict` if the cart
    /// stays locked, and `Database` if restoring the cart fails. In the last
    /// case the record stays on the stack.
    #[instrument(skip_all, fields(user_id = %user))]
    pub async fn undo(&self, user: UserId) -> Result<UndoOutcome> {
        let _guard = self.lock(user).await?;
        let record = self.history.pop_last(user).ok_or(AppError::NothingToUndo)?;

        if let Err(err) = self
            .store
            .replace_cart_lines(user, &record.previous_state)
            .await
        {
            warn!(error = %err, action = %record.kind, "Undo failed, keeping record");
            self.history.restore(user, record);
            return Err(err.into());
        }

        let remaining_actions = self.history.size(user);
        info!(action = %record.kind, remaining_actions, "Cart action undone");
        Ok(UndoOutcome {
            undone_action: record.kind,
            remaining_actions,
        })
    }

    /// Describe what an undo would revert, without changing anything.
    #[must_use]
    pub fn undo_info(&self, user: UserId) -> UndoInfo {
        let last_action = self.history.peek_last(user).map(|record| record.kind);
        UndoInfo {
            size: self.history.size(user),
            can_undo: last_action.is_some(),
            last_action,
        }
    }
}

fn ensure_positive(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(AppError::BadRequest(
            "Quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn cart_item_not_found() -> AppError {
    AppError::NotFound("Cart item not found".to_string())
}

fn find_line(items: &[CartItem], cart_id: CartId) -> Result<&CartItem> {
    items
        .iter()
        .find(|item| item.cart_id == cart_id)
        .ok_or_else(cart_item_not_found)
}
