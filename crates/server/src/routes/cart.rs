//! Cart route handlers.
//!
//! Every mutation answers with the caller's new undo stack size.

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use cartwheel_core::{CartId, ProductId};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// Body of `POST /api/cart/add`.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Body of `PUT /api/cart/update`.
#[derive(Debug, Deserialize)]
pub struct UpdateCartItem {
    pub cart_id: CartId,
    pub quantity: i32,
}

/// Show the caller's cart.
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<impl IntoResponse> {
    Ok(Json(state.cart().items(user.id).await?))
}

/// Add a product to the caller's cart.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<AddToCart>,
) -> Result<impl IntoResponse> {
    let added = state
        .cart()
        .add(user.id, body.product_id, body.quantity)
        .await?;
    Ok(Json(json!({
        "message": "Added to cart",
        "cart_id": added.cart_id,
        "stack_size": added.stack_size,
    })))
}

/// Set the quantity of a cart line.
#[instrument(skip_all, fields(user_id = %user.id, cart_id = %body.cart_id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<UpdateCartItem>,
) -> Result<impl IntoResponse> {
    let stack_size = state
        .cart()
        .update(user.id, body.cart_id, body.quantity)
        .await?;
    Ok(Json(json!({ "message": "Cart updated", "stack_size": stack_size })))
}

/// Remove a cart line.
#[instrument(skip_all, fields(user_id = %user.id, cart_id = %cart_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(cart_id): Path<CartId>,
) -> Result<impl IntoResponse> {
    let stack_size = state.cart().remove(user.id, cart_id).await?;
    Ok(Json(json!({
        "message": "Item removed from cart",
        "stack_size": stack_size,
    })))
}

/// Remove every line from the caller's cart.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<impl IntoResponse> {
    let stack_size = state.cart().clear(user.id).await?;
    Ok(Json(json!({ "message": "Cart cleared", "stack_size": stack_size })))
}

/// Revert the caller's last cart mutation.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn undo(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<impl IntoResponse> {
    let outcome = state.cart().undo(user.id).await?;
    Ok(Json(json!({
        "message": format!("Undid {}", outcome.undone_action),
        "undone_action": outcome.undone_action,
        "remaining_actions": outcome.remaining_actions,
    })))
}

/// Describe what undo would revert.
pub async fn undo_info(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> impl IntoResponse {
    Json(state.cart().undo_info(user.id))
}
