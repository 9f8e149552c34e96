//! HTTP handlers for expense endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Expense, PaginatedResponse};
use uuid::Uuid;

use super::ListQuery;
use crate::error::AppResult;
use crate::services::expense::{ExpenseInput, ExpenseService};
use crate::AppState;

fn service(state: &AppState) -> ExpenseService {
    ExpenseService::new(state.store.clone(), state.config.inventory.clone())
}

/// List expenses
pub async fn list_expenses(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<PaginatedResponse<Expense>>> {
    let pagination = query.pagination(state.config.inventory.default_page_size);
    let expenses = service(&state).list(&pagination).await?;
    Ok(Json(expenses))
}

pub async fn get_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Expense>> {
    let expense = service(&state).get(id).await?;
    Ok(Json(expense))
}

pub async fn create_expense(
    State(state): State<AppState>,
    Json(input): Json<ExpenseInput>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    let expense = service(&state).create(input).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ExpenseInput>,
) -> AppResult<Json<Expense>> {
    let expense = service(&state).update(id, input).await?;
    Ok(Json(expense))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
