//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use cartwheel_core::OrderId;

use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::services::DEFAULT_PAYMENT_METHOD;
use crate::state::AppState;

/// Body of `POST /api/orders/place`. The body itself is optional.
#[derive(Debug, Default, Deserialize)]
pub struct PlaceOrder {
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// Place an order from the caller's cart.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    body: Option<Json<PlaceOrder>>,
) -> Result<impl IntoResponse> {
    let payment_method = body
        .and_then(|Json(body)| body.payment_method)
        .filter(|method| !method.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

    let receipt = state
        .checkout()
        .place_order(user.id, &payment_method)
        .await?;
    Ok(Json(json!({
        "message": "Order placed and queued for processing",
        "order_id": receipt.order_id,
        "total": receipt.total,
        "queue_position": receipt.queue_position,
    })))
}

/// Complete the order at the head of the queue.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn process_next(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let Some(job) = state.worker().process_next().await? else {
        return Ok(Json(json!({ "message": "No orders in queue" })));
    };
    Ok(Json(json!({
        "message": "Order processed",
        "order": job,
        "remaining_in_queue": state.queue().size(),
    })))
}

/// Show every queued job with its position.
pub async fn queue_status(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> impl IntoResponse {
    let jobs = state.queue().snapshot();
    Json(json!({ "queue_length": jobs.len(), "jobs": jobs }))
}

/// List the caller's orders.
pub async fn mine(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<impl IntoResponse> {
    Ok(Json(state.store().orders_for_user(user.id).await?))
}

/// Show one order. Other users' orders are reported as missing.
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(order_id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let details = state
        .store()
        .order_details(order_id)
        .await?
        .filter(|details| user.is_admin() || details.order.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    Ok(Json(details))
}

/// List every order.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    Ok(Json(state.store().all_orders().await?))
}
