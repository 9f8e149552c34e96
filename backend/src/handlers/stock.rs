//! HTTP handlers for stock item endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, StockItem};
use uuid::Uuid;

use super::ListQuery;
use crate::error::AppResult;
use crate::services::stock::{StockItemInput, StockService};
use crate::AppState;

fn service(state: &AppState) -> StockService {
    StockService::new(state.store.clone(), state.config.inventory.clone())
}

/// List stock items
pub async fn list_stock_items(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<StockItem>>> {
    let pagination = query.pagination(state.config.inventory.default_page_size);
    let items = service(&state)
        .list(&pagination, query.q.as_deref())
        .await?;
    Ok(Json(items))
}

/// Get a stock item
pub async fn get_stock_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StockItem>> {
    let item = service(&state).get(id).await?;
    Ok(Json(item))
}

/// Create a stock item
pub async fn create_stock_item(
    State(state): State<AppState>,
    Json(input): Json<StockItemInput>,
) -> AppResult<(StatusCode, Json<StockItem>)> {
    let item = service(&state).create(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Update a stock item
pub async fn update_stock_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<StockItemInput>,
) -> AppResult<Json<StockItem>> {
    let item = service(&state).update(id, input).await?;
    Ok(Json(item))
}

/// Delete a stock item
pub async fn delete_stock_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
