//! HTTP handlers for usage endpoints

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use shared::{PaginatedResponse, Usage};
use uuid::Uuid;

use super::ListQuery;
use crate::error::AppResult;
use crate::services::usage::{UsageInput, UsageService};
use crate::AppState;

/// Header naming the user who records a usage
pub const USER_HEADER: &str = "x-user";

const DEFAULT_USER: &str = "system";

fn service(state: &AppState) -> UsageService {
    UsageService::new(state.store.clone(), state.config.inventory.clone())
}

fn current_user(headers: &HeaderMap) -> &str {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_USER)
}

/// List usage records
pub async fn list_usages(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<Usage>>> {
    let pagination = query.pagination(state.config.inventory.default_page_size);
    let usages = service(&state).list(&pagination).await?;
    Ok(Json(usages))
}

/// Get a usage record
pub async fn get_usage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Usage>> {
    let usage = service(&state).get(id).await?;
    Ok(Json(usage))
}

/// Record stock consumption
pub async fn create_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<UsageInput>,
) -> AppResult<(StatusCode, Json<Usage>)> {
    let usage = service(&state)
        .create(input, current_user(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(usage)))
}

/// Replace a usage record
pub async fn update_usage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UsageInput>,
) -> AppResult<Json<Usage>> {
    let usage = service(&state).update(id, input).await?;
    Ok(Json(usage))
}

/// Delete a usage record
pub async fn delete_usage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
