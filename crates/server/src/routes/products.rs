//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::instrument;

use cartwheel_core::ProductId;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, ProductUpdate};
use crate::state::AppState;

fn product_not_found() -> AppError {
    AppError::NotFound("Product not found".to_string())
}

/// List active products.
pub async fn index(State(state): State<AppState>) -> Result<Response> {
    let products = state.catalog().list_active().await?;
    Ok(Json(products.as_slice()).into_response())
}

/// Show one active product.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Response> {
    match state.catalog().get(id).await? {
        Some(product) if product.is_active() => Ok(Json(product.as_ref()).into_response()),
        _ => Err(product_not_found()),
    }
}

/// Create a product.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(product): Json<NewProduct>,
) -> Result<impl IntoResponse> {
    product.validate().map_err(AppError::BadRequest)?;
    let created = state.catalog().create(product).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace a product's fields.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<impl IntoResponse> {
    update.validate().map_err(AppError::BadRequest)?;
    let updated = state
        .catalog()
        .update(id, update)
        .await?
        .ok_or_else(product_not_found)?;
    Ok(Json(updated))
}

/// Delete a product.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    if !state.catalog().delete(id).await? {
        return Err(product_not_found());
    }
    Ok(Json(json!({ "message": "Product deleted", "product_id": id })))
}
