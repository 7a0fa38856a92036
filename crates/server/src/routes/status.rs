//! Engine status view.
//!
//! Reports sizes only; no per-user detail is exposed.

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::services::ALL_PRODUCTS_KEY;
use crate::state::AppState;

/// Sizes of the undo history, order queue and product cache.
pub async fn show(State(state): State<AppState>) -> impl IntoResponse {
    let history = state.history().stats();
    let cache = state.catalog().cache();

    Json(json!({
        "user_action_stack": {
            "users": history.users,
            "size": history.total_actions,
        },
        "order_processing_queue": {
            "size": state.queue().size(),
        },
        "product_cache": {
            "entries": cache.len(),
            "has_all_products": cache.has(ALL_PRODUCTS_KEY),
            "evictions": cache.evictions(),
        },
    }))
}
