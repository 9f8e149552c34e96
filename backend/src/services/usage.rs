//! Usage transaction manager for stock consumption

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_positive, PaginatedResponse, Pagination, QuantityGuard, Usage};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::retry_on_conflict;
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};
use crate::store::{InventoryStore, UnitOfWork};

/// Usage service for recording consumed stock
#[derive(Clone)]
pub struct UsageService {
    store: Arc<dyn InventoryStore>,
    settings: InventoryConfig,
}

/// Input for creating or replacing a usage record
#[derive(Debug, Clone, Deserialize)]
pub struct UsageInput {
    pub stock_item_id: Uuid,
    pub quantity_used: Decimal,
    pub date: NaiveDate,
    pub purpose: Option<String>,
}

impl UsageService {
    /// Create a new UsageService instance
    pub fn new(store: Arc<dyn InventoryStore>, settings: InventoryConfig) -> Self {
        Self { store, settings }
    }

    /// List usage records, newest first
    pub async fn list(&self, pagination: &Pagination) -> AppResult<PaginatedResponse<Usage>> {
        let (usages, total) = self.store.list_usages(pagination).await?;
        debug!(count = usages.len(), total, "Listed usages");
        Ok(PaginatedResponse::new(usages, pagination, total))
    }

    /// Get a usage record by ID
    pub async fn get(&self, id: Uuid) -> AppResult<Usage> {
        self.store
            .get_usage(id)
            .await?
            .ok_or_else(|| AppError::not_found("Usage"))
    }

    /// Record consumption, refusing to take more than is on hand
    #[instrument(skip(self, input), fields(stock_item_id = %input.stock_item_id, quantity = %input.quantity_used))]
    pub async fn create(&self, input: UsageInput, created_by: &str) -> AppResult<Usage> {
        validate_positive("quantity_used", input.quantity_used)?;

        let usage = Usage {
            id: Uuid::new_v4(),
            stock_item_id: input.stock_item_id,
            quantity_used: input.quantity_used,
            date: input.date,
            purpose: input.purpose,
            created_by: Some(created_by.to_string()),
        };

        let usage_ref = &usage;
        retry_on_conflict("create_usage", self.settings.max_conflict_retries, move || {
            self.create_once(usage_ref)
        })
        .await
        .inspect_err(log_rejection)?;

        info!(usage_id = %usage.id, created_by, "Usage recorded");

        Ok(usage)
    }

    /// Replace a usage record.
    ///
    /// The old quantity goes back to the old item before the new quantity is
    /// taken from the new item, so the two may differ.
    #[instrument(skip(self, input), fields(usage_id = %id))]
    pub async fn update(&self, id: Uuid, input: UsageInput) -> AppResult<Usage> {
        validate_positive("quantity_used", input.quantity_used)?;

        let input = &input;
        let usage = retry_on_conflict("update_usage", self.settings.max_conflict_retries, move || {
            self.update_once(id, input)
        })
        .await
        .inspect_err(log_rejection)?;

        info!(
            usage_id = %usage.id,
            stock_item_id = %usage.stock_item_id,
            quantity = %usage.quantity_used,
            "Usage updated"
        );

        Ok(usage)
    }

    /// Delete a usage record and return its quantity to stock
    #[instrument(skip(self), fields(usage_id = %id))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let removed = retry_on_conflict("delete_usage", self.settings.max_conflict_retries, move || {
            self.delete_once(id)
        })
        .await?;

        info!(
            usage_id = %id,
            stock_item_id = %removed.stock_item_id,
            restored = %removed.quantity_used,
            "Usage deleted"
        );

        Ok(())
    }

    async fn create_once(&self, usage: &Usage) -> AppResult<()> {
        let mut uow = self.store.begin().await?;

        uow.adjust_quantity(
            usage.stock_item_id,
            -usage.quantity_used,
            QuantityGuard::NonNegative,
        )
        .await?;
        uow.put_usage(usage).await?;

        uow.commit().await
    }

    async fn update_once(&self, id: Uuid, input: &UsageInput) -> AppResult<Usage> {
        let mut uow = self.store.begin().await?;

        let existing = uow
            .usage(id)
            .await?
            .ok_or_else(|| AppError::not_found("Usage"))?;

        lock_in_order(uow.as_mut(), existing.stock_item_id, input.stock_item_id).await?;

        uow.adjust_quantity(
            existing.stock_item_id,
            existing.quantity_used,
            QuantityGuard::Unguarded,
        )
        .await?;
        uow.adjust_quantity(
            input.stock_item_id,
            -input.quantity_used,
            QuantityGuard::NonNegative,
        )
        .await?;

        let usage = Usage {
            id,
            stock_item_id: input.stock_item_id,
            quantity_used: input.quantity_used,
            date: input.date,
            purpose: input.purpose.clone(),
            created_by: existing.created_by,
        };

        uow.put_usage(&usage).await?;
        uow.commit().await?;

        Ok(usage)
    }

    async fn delete_once(&self, id: Uuid) -> AppResult<Usage> {
        let mut uow = self.store.begin().await?;

        let existing = uow
            .usage(id)
            .await?
            .ok_or_else(|| AppError::not_found("Usage"))?;

        uow.adjust_quantity(
            existing.stock_item_id,
            existing.quantity_used,
            QuantityGuard::Unguarded,
        )
        .await?;
        uow.delete_usage(id).await?;
        uow.commit().await?;

        Ok(existing)
    }
}

/// Touch both stock items in id order so concurrent updates lock them consistently
async fn lock_in_order(uow: &mut dyn UnitOfWork, a: Uuid, b: Uuid) -> AppResult<()> {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };

    uow.stock_item(first)
        .await?
        .ok_or_else(|| AppError::not_found("Stock item"))?;
    if second != first {
        uow.stock_item(second)
            .await?
            .ok_or_else(|| AppError::not_found("Stock item"))?;
    }

    Ok(())
}

fn log_rejection(err: &AppError) {
    if let AppError::InsufficientStock {
        stock_item_id,
        available,
        requested,
    } = err
    {
        warn!(%stock_item_id, %available, %requested, "Insufficient stock for usage");
    }
}
