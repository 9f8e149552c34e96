//! Purchase transaction manager
//!
//! Purchases add stock. Every mutation runs inside one unit of work so the
//! purchase record and all of its stock adjustments commit together or not
//! at all.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    exact_mul, exact_sub, exact_sum, purchase_total, validate_non_negative, validate_not_empty, validate_positive,
    PaginatedResponse, Pagination, Purchase, PurchaseItem, QuantityGuard,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::retry_on_conflict;
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};
use crate::store::{InventoryStore, UnitOfWork};

/// Purchase service for recording inbound stock
#[derive(Clone)]
pub struct PurchaseService {
    store: Arc<dyn InventoryStore>,
    settings: InventoryConfig,
}

/// One purchase line as submitted by the caller
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseItemInput {
    pub stock_item_id: Uuid,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Input for creating or replacing a purchase
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseInput {
    pub supplier_id: Uuid,
    pub date: NaiveDate,
    pub items: Vec<PurchaseItemInput>,
}

impl PurchaseInput {
    fn validate(&self) -> AppResult<()> {
        validate_not_empty("items", &self.items)?;
        for item in &self.items {
            validate_positive("items.quantity", item.quantity)?;
            validate_non_negative("items.price", item.price)?;
        }
        exact_sum(self.items.iter().map(|item| exact_mul(item.quantity, item.price)))
            .map_err(|e| e.for_field("items"))?;
        Ok(())
    }
}

impl PurchaseService {
    /// Create a new PurchaseService instance
    pub fn new(store: Arc<dyn InventoryStore>, settings: InventoryConfig) -> Self {
        Self { store, settings }
    }

    /// List purchases, newest first
    pub async fn list(&self, pagination: &Pagination) -> AppResult<PaginatedResponse<Purchase>> {
        let (purchases, total) = self.store.list_purchases(pagination).await?;
        Ok(PaginatedResponse::new(purchases, pagination, total))
    }

    /// Get a purchase with its items
    pub async fn get(&self, id: Uuid) -> AppResult<Purchase> {
        self.store
            .get_purchase(id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase"))
    }

    /// Record a purchase and add every line's quantity to stock
    #[instrument(skip(self, input), fields(supplier_id = %input.supplier_id, lines = input.items.len()))]
    pub async fn create(&self, input: PurchaseInput) -> AppResult<Purchase> {
        input.validate()?;

        let id = Uuid::new_v4();
        let input = &input;
        let purchase = retry_on_conflict("create_purchase", self.settings.max_conflict_retries, move || {
            self.create_once(id, input)
        })
        .await?;

        info!(
            purchase_id = %purchase.id,
            total_cost = %purchase.total_cost,
            "Purchase recorded"
        );

        Ok(purchase)
    }

    /// Replace a purchase: revert the old lines' stock effect, then apply the new lines
    #[instrument(skip(self, input), fields(purchase_id = %id, lines = input.items.len()))]
    pub async fn update(&self, id: Uuid, input: PurchaseInput) -> AppResult<Purchase> {
        input.validate()?;

        let input = &input;
        let purchase = retry_on_conflict("update_purchase", self.settings.max_conflict_retries, move || {
            self.update_once(id, input)
        })
        .await
        .inspect_err(log_rejection)?;

        info!(
            purchase_id = %purchase.id,
            total_cost = %purchase.total_cost,
            "Purchase updated"
        );

        Ok(purchase)
    }

    /// Delete a purchase.
    ///
    /// Stock is left untouched unless `revert_purchase_stock_on_delete` is
    /// set, in which case the purchased quantities are taken back out.
    #[instrument(skip(self), fields(purchase_id = %id))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        retry_on_conflict("delete_purchase", self.settings.max_conflict_retries, move || {
            self.delete_once(id)
        })
        .await
        .inspect_err(log_rejection)?;

        info!(
            purchase_id = %id,
            stock_reverted = self.settings.revert_purchase_stock_on_delete,
            "Purchase deleted"
        );

        Ok(())
    }

    async fn create_once(&self, id: Uuid, input: &PurchaseInput) -> AppResult<Purchase> {
        let mut uow = self.store.begin().await?;

        lock_stock_items(uow.as_mut(), input.items.iter().map(|i| i.stock_item_id)).await?;
        let purchase = apply_items(uow.as_mut(), id, input).await?;

        uow.put_purchase(&purchase).await?;
        uow.commit().await?;

        Ok(purchase)
    }

    async fn update_once(&self, id: Uuid, input: &PurchaseInput) -> AppResult<Purchase> {
        let mut uow = self.store.begin().await?;

        let existing = uow
            .purchase(id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase"))?;

        let touched = existing
            .items
            .iter()
            .map(|i| i.stock_item_id)
            .chain(input.items.iter().map(|i| i.stock_item_id));
        let before = lock_stock_items(uow.as_mut(), touched).await?;

        // Revert phase: the intermediate state holds none of the old lines
        revert_items(uow.as_mut(), &existing.items).await?;

        // Apply phase
        let purchase = apply_items(uow.as_mut(), id, input).await?;
        ensure_non_negative(uow.as_mut(), &before).await?;

        uow.put_purchase(&purchase).await?;
        uow.commit().await?;

        Ok(purchase)
    }

    async fn delete_once(&self, id: Uuid) -> AppResult<()> {
        let mut uow = self.store.begin().await?;

        let existing = uow
            .purchase(id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase"))?;

        if self.settings.revert_purchase_stock_on_delete {
            let before =
                lock_stock_items(uow.as_mut(), existing.items.iter().map(|i| i.stock_item_id))
                    .await?;
            revert_items(uow.as_mut(), &existing.items).await?;
            ensure_non_negative(uow.as_mut(), &before).await?;
        }

        uow.delete_purchase(id).await?;
        uow.commit().await
    }
}

/// Resolve every referenced stock item in id order, failing with `NotFound`
/// before anything is written. Returns each item's quantity at that point.
async fn lock_stock_items(
    uow: &mut dyn UnitOfWork,
    ids: impl Iterator<Item = Uuid>,
) -> AppResult<BTreeMap<Uuid, Decimal>> {
    let ids: BTreeSet<Uuid> = ids.collect();
    let mut quantities = BTreeMap::new();

    for id in ids {
        let item = uow
            .stock_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("Stock item"))?;
        quantities.insert(id, item.quantity);
    }

    Ok(quantities)
}

/// Add each line's quantity to stock and build the purchase with its derived total
async fn apply_items(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
    input: &PurchaseInput,
) -> AppResult<Purchase> {
    let mut items = Vec::with_capacity(input.items.len());

    for line in &input.items {
        uow.adjust_quantity(line.stock_item_id, line.quantity, QuantityGuard::Unguarded)
            .await?;
        items.push(PurchaseItem {
            id: Uuid::new_v4(),
            stock_item_id: line.stock_item_id,
            quantity: line.quantity,
            price: line.price,
        });
    }

    Ok(Purchase {
        id,
        supplier_id: input.supplier_id,
        date: input.date,
        total_cost: purchase_total(&items).map_err(|e| e.for_field("items"))?,
        items,
    })
}

/// Take each line's quantity back out of stock
async fn revert_items(uow: &mut dyn UnitOfWork, items: &[PurchaseItem]) -> AppResult<()> {
    for item in items {
        uow.adjust_quantity(item.stock_item_id, -item.quantity, QuantityGuard::Unguarded)
            .await?;
    }
    Ok(())
}

/// Reject the unit if any touched item ended up below zero
async fn ensure_non_negative(
    uow: &mut dyn UnitOfWork,
    before: &BTreeMap<Uuid, Decimal>,
) -> AppResult<()> {
    for (&id, &available) in before {
        let item = uow
            .stock_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("Stock item"))?;

        if item.quantity < Decimal::ZERO {
            return Err(AppError::InsufficientStock {
                stock_item_id: id,
                available,
                requested: exact_sub(available, item.quantity)
                    .map_err(|e| e.for_field("quantity"))?,
            });
        }
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
        warn!(%stock_item_id, %available, %requested, "Purchase change would leave stock negative");
    }
}
