//! Stock item catalogue management

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    exact_mul, validate_non_negative, validate_not_blank, PaginatedResponse, Pagination, StockCategory,
    StockItem,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::retry_on_conflict;
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};
use crate::store::InventoryStore;

/// Stock service for plain item CRUD
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn InventoryStore>,
    settings: InventoryConfig,
}

/// Input for creating or updating a stock item
#[derive(Debug, Clone, Deserialize)]
pub struct StockItemInput {
    pub name: String,
    pub category: StockCategory,
    #[serde(default)]
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub reorder_level: Option<Decimal>,
}

impl StockItemInput {
    fn validate(&self) -> AppResult<()> {
        validate_not_blank("name", &self.name)?;
        validate_not_blank("unit", &self.unit)?;
        validate_non_negative("quantity", self.quantity)?;
        validate_non_negative("unit_price", self.unit_price)?;
        if let Some(level) = self.reorder_level {
            validate_non_negative("reorder_level", level)?;
        }
        exact_mul(self.unit_price, self.quantity).map_err(|e| e.for_field("unit_price"))?;
        Ok(())
    }
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(store: Arc<dyn InventoryStore>, settings: InventoryConfig) -> Self {
        Self { store, settings }
    }

    /// List stock items by name, optionally filtered by a name fragment
    pub async fn list(
        &self,
        pagination: &Pagination,
        query: Option<&str>,
    ) -> AppResult<PaginatedResponse<StockItem>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let (items, total) = self.store.list_stock_items(pagination, query).await?;
        debug!(count = items.len(), total, "Listed stock items");
        Ok(PaginatedResponse::new(items, pagination, total))
    }

    /// Get a stock item by ID
    pub async fn get(&self, id: Uuid) -> AppResult<StockItem> {
        self.store
            .get_stock_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("Stock item"))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: StockItemInput) -> AppResult<StockItem> {
        input.validate()?;

        let now = Utc::now();
        let item = StockItem {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            category: input.category,
            quantity: input.quantity,
            unit: input.unit.trim().to_string(),
            unit_price: input.unit_price,
            reorder_level: input.reorder_level,
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.store.begin().await?;
        uow.put_stock_item(&item).await?;
        uow.commit().await?;

        info!(stock_item_id = %item.id, quantity = %item.quantity, "Stock item created");

        Ok(item)
    }

    /// Overwrite a stock item's fields, quantity included
    #[instrument(skip(self, input), fields(stock_item_id = %id))]
    pub async fn update(&self, id: Uuid, input: StockItemInput) -> AppResult<StockItem> {
        input.validate()?;

        let input = &input;
        let item = retry_on_conflict("update_stock_item", self.settings.max_conflict_retries, move || {
            self.update_once(id, input)
        })
        .await?;

        info!(stock_item_id = %item.id, quantity = %item.quantity, "Stock item updated");

        Ok(item)
    }

    /// Delete a stock item. Purchases and usages that reference it are left in place.
    #[instrument(skip(self), fields(stock_item_id = %id))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        retry_on_conflict("delete_stock_item", self.settings.max_conflict_retries, move || {
            self.delete_once(id)
        })
        .await?;

        info!(stock_item_id = %id, "Stock item deleted");

        Ok(())
    }

    async fn update_once(&self, id: Uuid, input: &StockItemInput) -> AppResult<StockItem> {
        let mut uow = self.store.begin().await?;

        let mut item = uow
            .stock_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("Stock item"))?;

        item.name = input.name.trim().to_string();
        item.category = input.category;
        item.quantity = input.quantity;
        item.unit = input.unit.trim().to_string();
        item.unit_price = input.unit_price;
        item.reorder_level = input.reorder_level;
        item.updated_at = Utc::now();

        uow.put_stock_item(&item).await?;
        uow.commit().await?;

        Ok(item)
    }

    async fn delete_once(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_stock_item(id).await? {
            return Err(AppError::not_found("Stock item"));
        }
        uow.commit().await
    }
}
