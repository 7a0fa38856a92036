//! Per-user undo history for cart mutations.
//!
//! Each user owns an independent LIFO stack of [`ActionRecord`]s. A record
//! captures the cart as it was *before* the mutation, so undoing it means
//! replacing the cart with `previous_state`.
//!
//! The history is process-lifetime state: it is never persisted and a
//! restart empties it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cartwheel_core::{CartId, ProductId, UserId};

use crate::models::CartLine;

/// Kind of reversible cart mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "add_to_cart")]
    Add,
    #[serde(rename = "update_cart")]
    Update,
    #[serde(rename = "remove_from_cart")]
    Remove,
    #[serde(rename = "clear_cart")]
    Clear,
}

impl ActionKind {
    /// Name reported to clients as `last_action` / `undone_action`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add_to_cart",
            Self::Update => "update_cart",
            Self::Remove => "remove_from_cart",
            Self::Clear => "clear_cart",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation-specific payload stored alongside the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDetail {
    Added {
        product_id: ProductId,
        quantity: i32,
    },
    Updated {
        cart_id: CartId,
        old_quantity: i32,
        new_quantity: i32,
    },
    Removed {
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    },
    Cleared {
        line_count: usize,
    },
}

/// An immutable record of one cart mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub previous_state: Vec<CartLine>,
    pub detail: ActionDetail,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate counts for the status view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    /// Users with at least one record.
    pub users: usize,
    /// Records across all users.
    pub total_actions: usize,
}

/// Per-user undo stacks.
pub struct ActionHistory {
    stacks: Mutex<HashMap<UserId, Vec<ActionRecord>>>,
    max_depth: Option<usize>,
}

impl ActionHistory {
    /// Create an empty history with no depth bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(None)
    }

    /// Create an empty history that keeps at most `max_depth` records per user.
    ///
    /// When a push exceeds the bound the oldest record for that user is dropped.
    #[must_use]
    pub fn with_max_depth(max_depth: Option<usize>) -> Self {
        Self {
            stacks: Mutex::new(HashMap::new()),
            max_depth: max_depth.filter(|depth| *depth > 0),
        }
    }

    /// Push a record onto `user`'s stack and return the new stack size.
    pub fn record(
        &self,
        user: UserId,
        kind: ActionKind,
        previous_state: Vec<CartLine>,
        detail: ActionDetail,
    ) -> usize {
        self.push(
            user,
            ActionRecord {
                kind,
                previous_state,
                detail,
                timestamp: Utc::now(),
            },
        )
    }

    /// Return a popped record to the top of `user`'s stack.
    ///
    /// Used when applying the record upstream failed, so the undo is not lost.
    /// Callers must hold the user's cart lock between the pop and the restore.
    pub fn restore(&self, user: UserId, record: ActionRecord) -> usize {
        self.push(user, record)
    }

    fn push(&self, user: UserId, record: ActionRecord) -> usize {
        let kind = record.kind;
        let mut stacks = self.stacks.lock();
        let stack = stacks.entry(user).or_default();
        stack.push(record);

        if let Some(max) = self.max_depth
            && stack.len() > max
        {
            let dropped = stack.len() - max;
            stack.drain(..dropped);
            debug!(user_id = %user, dropped, "Undo history full, dropped oldest records");
        }

        let size = stack.len();
        debug!(user_id = %user, action = %kind, stack_size = size, "Action pushed to history");
        size
    }

    /// The most recent record for `user`, without removing it.
    #[must_use]
    pub fn peek_last(&self, user: UserId) -> Option<ActionRecord> {
        self.stacks
            .lock()
            .get(&user)
            .and_then(|stack| stack.last().cloned())
    }

    /// Remove and return the most recent record for `user`.
    pub fn pop_last(&self, user: UserId) -> Option<ActionRecord> {
        let mut stacks = self.stacks.lock();
        let stack = stacks.get_mut(&user)?;
        let record = stack.pop()?;
        let size = stack.len();
        if size == 0 {
            stacks.remove(&user);
        }
        debug!(user_id = %user, action = %record.kind, stack_size = size, "Action popped from history");
        Some(record)
    }

    /// Number of records for `user`.
    #[must_use]
    pub fn size(&self, user: UserId) -> usize {
        self.stacks.lock().get(&user).map_or(0, Vec::len)
    }

    /// Whether `user` has nothing to undo.
    #[must_use]
    pub fn is_empty(&self, user: UserId) -> bool {
        self.size(user) == 0
    }

    /// Aggregate counts across all users.
    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        let stacks = self.stacks.lock();
        HistoryStats {
            users: stacks.len(),
            total_actions: stacks.values().map(Vec::len).sum(),
        }
    }
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn line(product: i32, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    fn cleared(history: &ActionHistory, user: UserId, marker: usize) -> usize {
        history.record(
            user,
            ActionKind::Clear,
            vec![],
            ActionDetail::Cleared { line_count: marker },
        )
    }

    #[test]
    fn test_pop_returns_reverse_push_order() {
        let history = ActionHistory::new();
        let user = UserId::new(1);

        for marker in 0..5 {
            cleared(&history, user, marker);
        }

        for expected in (0..5).rev() {
            let record = history.pop_last(user).unwrap();
            assert_eq!(record.detail, ActionDetail::Cleared { line_count: expected });
        }
        assert!(history.pop_last(user).is_none());
        assert_eq!(history.size(user), 0);
        assert!(history.is_empty(user));
    }

    #[test]
    fn test_record_returns_new_size() {
        let history = ActionHistory::new();
        let user = UserId::new(1);
        assert_eq!(cleared(&history, user, 0), 1);
        assert_eq!(cleared(&history, user, 1), 2);
        assert_eq!(history.size(user), 2);
    }

    #[test]
    fn test_peek_does_not_remove() {
        let history = ActionHistory::new();
        let user = UserId::new(1);
        history.record(
            user,
            ActionKind::Add,
            vec![line(3, 2)],
            ActionDetail::Added {
                product_id: ProductId::new(7),
                quantity: 1,
            },
        );

        let peeked = history.peek_last(user).unwrap();
        assert_eq!(peeked.kind, ActionKind::Add);
        assert_eq!(peeked.previous_state, vec![line(3, 2)]);
        assert_eq!(history.size(user), 1);
        assert_eq!(history.pop_last(user).unwrap(), peeked);
    }

    #[test]
    fn test_histories_are_per_user() {
        let history = ActionHistory::new();
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        cleared(&history, alice, 0);

        assert!(history.pop_last(bob).is_none());
        assert!(history.peek_last(bob).is_none());
        assert_eq!(history.size(alice), 1);
        assert_eq!(
            history.stats(),
            HistoryStats {
                users: 1,
                total_actions: 1
            }
        );
    }

    #[test]
    fn test_empty_history_pops_none() {
        let history = ActionHistory::new();
        assert!(history.pop_last(UserId::new(9)).is_none());
        assert!(history.peek_last(UserId::new(9)).is_none());
        assert_eq!(history.stats().users, 0);
    }

    #[test]
    fn test_restore_puts_record_back_on_top() {
        let history = ActionHistory::new();
        let user = UserId::new(1);
        cleared(&history, user, 0);
        cleared(&history, user, 1);

        let top = history.pop_last(user).unwrap();
        assert_eq!(history.restore(user, top.clone()), 2);
        assert_eq!(history.peek_last(user).unwrap(), top);
    }

    #[test]
    fn test_depth_bound_drops_oldest() {
        let history = ActionHistory::with_max_depth(Some(3));
        let user = UserId::new(1);
        for marker in 0..5 {
            cleared(&history, user, marker);
        }

        assert_eq!(history.size(user), 3);
        let popped: Vec<_> = std::iter::from_fn(|| history.pop_last(user))
            .map(|r| r.detail)
            .collect();
        assert_eq!(
            popped,
            vec![
                ActionDetail::Cleared { line_count: 4 },
                ActionDetail::Cleared { line_count: 3 },
                ActionDetail::Cleared { line_count: 2 },
            ]
        );
    }

    #[test]
    fn test_zero_depth_means_unbounded() {
        let history = ActionHistory::with_max_depth(Some(0));
        let user = UserId::new(1);
        for marker in 0..100 {
            cleared(&history, user, marker);
        }
        assert_eq!(history.size(user), 100);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ActionKind::Add.as_str(), "add_to_cart");
        assert_eq!(ActionKind::Update.as_str(), "update_cart");
        assert_eq!(ActionKind::Remove.as_str(), "remove_from_cart");
        assert_eq!(ActionKind::Clear.to_string(), "clear_cart");
        assert_eq!(
            serde_json::to_string(&ActionKind::Remove).unwrap(),
            "\"remove_from_cart\""
        );
    }

    #[test]
    fn test_concurrent_pushes_are_all_recorded() {
        let history = Arc::new(ActionHistory::new());
        let user = UserId::new(1);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let history = Arc::clone(&history);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cleared(&history, user, t * 100 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(history.size(user), 400);
    }
}
