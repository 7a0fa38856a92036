//! Category route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::instrument;

use cartwheel_core::CategoryId;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::NewCategory;
use crate::state::AppState;

fn category_not_found() -> AppError {
    AppError::NotFound("Category not found".to_string())
}

/// List categories.
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let categories = state.catalog().categories().await?;
    Ok(Json(categories))
}

/// Create a category.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(category): Json<NewCategory>,
) -> Result<impl IntoResponse> {
    category.validate().map_err(AppError::BadRequest)?;
    let created = state.catalog().create_category(category).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace a category's fields.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(update): Json<NewCategory>,
) -> Result<impl IntoResponse> {
    update.validate().map_err(AppError::BadRequest)?;
    let updated = state
        .catalog()
        .update_category(id, update)
        .await?
        .ok_or_else(category_not_found)?;
    Ok(Json(updated))
}

/// Delete a category. Its products stay, without a category.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<impl IntoResponse> {
    if !state.catalog().delete_category(id).await? {
        return Err(category_not_found());
    }
    Ok(Json(json!({ "message": "Category deleted", "category_id": id })))
}
