//! Expense ledger

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_non_negative, validate_not_blank, Expense, PaginatedResponse, Pagination};
use tracing::{info, instrument};
use uuid::Uuid;

use super::retry_on_conflict;
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};
use crate::store::InventoryStore;

/// Expense service for operating costs
#[derive(Clone)]
pub struct ExpenseService {
    store: Arc<dyn InventoryStore>,
    settings: InventoryConfig,
}

/// Input for creating or updating an expense
#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseInput {
    pub category: String,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub date: NaiveDate,
}

impl ExpenseInput {
    fn validate(&self) -> AppResult<()> {
        validate_not_blank("category", &self.category)?;
        if let Some(amount) = self.amount {
            validate_non_negative("amount", amount)?;
        }
        Ok(())
    }
}

impl ExpenseService {
    /// Create a new ExpenseService instance
    pub fn new(store: Arc<dyn InventoryStore>, settings: InventoryConfig) -> Self {
        Self { store, settings }
    }

    /// List expenses, newest first
    pub async fn list(&self, pagination: &Pagination) -> AppResult<PaginatedResponse<Expense>> {
        let (expenses, total) = self.store.list_expenses(pagination).await?;
        Ok(PaginatedResponse::new(expenses, pagination, total))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Expense> {
        self.store
            .get_expense(id)
            .await?
            .ok_or_else(|| AppError::not_found("Expense"))
    }

    #[instrument(skip(self, input), fields(category = %input.category))]
    pub async fn create(&self, input: ExpenseInput) -> AppResult<Expense> {
        input.validate()?;

        let expense = Expense {
            id: Uuid::new_v4(),
            category: input.category.trim().to_string(),
            description: input.description,
            amount: input.amount,
            date: input.date,
        };

        let mut uow = self.store.begin().await?;
        uow.put_expense(&expense).await?;
        uow.commit().await?;

        info!(expense_id = %expense.id, amount = ?expense.amount, "Expense recorded");

        Ok(expense)
    }

    #[instrument(skip(self, input), fields(expense_id = %id))]
    pub async fn update(&self, id: Uuid, input: ExpenseInput) -> AppResult<Expense> {
        input.validate()?;

        let input = &input;
        let expense = retry_on_conflict("update_expense", self.settings.max_conflict_retries, move || {
            self.update_once(id, input)
        })
        .await?;

        info!(expense_id = %expense.id, amount = ?expense.amount, "Expense updated");

        Ok(expense)
    }

    #[instrument(skip(self), fields(expense_id = %id))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        retry_on_conflict("delete_expense", self.settings.max_conflict_retries, move || {
            self.delete_once(id)
        })
        .await?;

        info!(expense_id = %id, "Expense deleted");

        Ok(())
    }

    async fn update_once(&self, id: Uuid, input: &ExpenseInput) -> AppResult<Expense> {
        let mut uow = self.store.begin().await?;

        if uow.expense(id).await?.is_none() {
            return Err(AppError::not_found("Expense"));
        }

        let expense = Expense {
            id,
            category: input.category.trim().to_string(),
            description: input.description.clone(),
            amount: input.amount,
            date: input.date,
        };

        uow.put_expense(&expense).await?;
        uow.commit().await?;

        Ok(expense)
    }

    async fn delete_once(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_expense(id).await? {
            return Err(AppError::not_found("Expense"));
        }
        uow.commit().await
    }
}
