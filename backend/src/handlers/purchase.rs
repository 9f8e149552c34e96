//! HTTP handlers for purchase endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, Purchase};
use uuid::Uuid;

use super::ListQuery;
use crate::error::AppResult;
use crate::services::purchase::{PurchaseInput, PurchaseService};
use crate::AppState;

fn service(state: &AppState) -> PurchaseService {
    PurchaseService::new(state.store.clone(), state.config.inventory.clone())
}

/// List purchases
pub async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<Purchase>>> {
    let pagination = query.pagination(state.config.inventory.default_page_size);
    let purchases = service(&state).list(&pagination).await?;
    Ok(Json(purchases))
}

/// Get a purchase with its items
pub async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Purchase>> {
    let purchase = service(&state).get(id).await?;
    Ok(Json(purchase))
}

/// Record a purchase
pub async fn create_purchase(
    State(state): State<AppState>,
    Json(input): Json<PurchaseInput>,
) -> AppResult<(StatusCode, Json<Purchase>)> {
    let purchase = service(&state).create(input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

/// Replace a purchase
pub async fn update_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<PurchaseInput>,
) -> AppResult<Json<Purchase>> {
    let purchase = service(&state).update(id, input).await?;
    Ok(Json(purchase))
}

/// Delete a purchase
pub async fn delete_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
