//! Stock ledger and record persistence
//!
//! Every mutation of stock goes through a [`UnitOfWork`]: reads made inside
//! the unit take part in its conflict detection (row locks for PostgreSQL,
//! version checks for the in-memory store), writes stay invisible until
//! [`UnitOfWork::commit`] and an uncommitted unit is discarded on drop.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    exact_add, DateRange, Expense, Pagination, Purchase, QuantityGuard, StockItem, Usage,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A page of records plus the total number of records available
pub type Page<T> = (Vec<T>, u64);

/// Persistence for stock items and the purchase, usage and expense ledgers
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Open an atomic unit of work
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Short label for the backing storage, reported by the health endpoint
    fn backend(&self) -> &'static str;

    /// Check that the backing storage is reachable
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    /// Stock items ordered by name, optionally filtered by a case-insensitive name fragment
    async fn list_stock_items(
        &self,
        pagination: &Pagination,
        query: Option<&str>,
    ) -> AppResult<Page<StockItem>>;

    /// Purchases, newest first
    async fn list_purchases(&self, pagination: &Pagination) -> AppResult<Page<Purchase>>;

    /// Usage records, newest first
    async fn list_usages(&self, pagination: &Pagination) -> AppResult<Page<Usage>>;

    /// Expenses, newest first
    async fn list_expenses(&self, pagination: &Pagination) -> AppResult<Page<Expense>>;

    async fn all_stock_items(&self) -> AppResult<Vec<StockItem>>;

    async fn purchases_between(&self, range: &DateRange) -> AppResult<Vec<Purchase>>;

    async fn usages_between(&self, range: &DateRange) -> AppResult<Vec<Usage>>;

    async fn expenses_between(&self, range: &DateRange) -> AppResult<Vec<Expense>>;

    /// Plain reads outside of any unit of work
    async fn get_stock_item(&self, id: Uuid) -> AppResult<Option<StockItem>>;

    async fn get_purchase(&self, id: Uuid) -> AppResult<Option<Purchase>>;

    async fn get_usage(&self, id: Uuid) -> AppResult<Option<Usage>>;

    async fn get_expense(&self, id: Uuid) -> AppResult<Option<Expense>>;
}

/// One atomic read-modify-write transaction against the store
#[async_trait]
pub trait UnitOfWork: Send {
    async fn stock_item(&mut self, id: Uuid) -> AppResult<Option<StockItem>>;

    /// Insert or overwrite a stock item
    async fn put_stock_item(&mut self, item: &StockItem) -> AppResult<()>;

    async fn delete_stock_item(&mut self, id: Uuid) -> AppResult<bool>;

    async fn purchase(&mut self, id: Uuid) -> AppResult<Option<Purchase>>;

    /// Insert or overwrite a purchase, replacing its whole item collection
    async fn put_purchase(&mut self, purchase: &Purchase) -> AppResult<()>;

    /// Remove a purchase and all of its items
    async fn delete_purchase(&mut self, id: Uuid) -> AppResult<bool>;

    async fn usage(&mut self, id: Uuid) -> AppResult<Option<Usage>>;

    async fn put_usage(&mut self, usage: &Usage) -> AppResult<()>;

    async fn delete_usage(&mut self, id: Uuid) -> AppResult<bool>;

    async fn expense(&mut self, id: Uuid) -> AppResult<Option<Expense>>;

    async fn put_expense(&mut self, expense: &Expense) -> AppResult<()>;

    async fn delete_expense(&mut self, id: Uuid) -> AppResult<bool>;

    /// Make every staged change visible at once
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Apply `delta` to a stock item's quantity.
    ///
    /// This is the only path through which purchases and usages change
    /// quantity. With [`QuantityGuard::NonNegative`] a result below zero is
    /// rejected with `InsufficientStock` and nothing is written. A quantity
    /// or stock value that cannot be held exactly is `InvalidArgument`.
    async fn adjust_quantity(
        &mut self,
        stock_item_id: Uuid,
        delta: Decimal,
        guard: QuantityGuard,
    ) -> AppResult<StockItem> {
        let mut item = self
            .stock_item(stock_item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Stock item"))?;

        let new_quantity =
            exact_add(item.quantity, delta).map_err(|e| e.for_field("quantity"))?;
        if guard == QuantityGuard::NonNegative && new_quantity < Decimal::ZERO {
            return Err(AppError::InsufficientStock {
                stock_item_id,
                available: item.quantity,
                requested: -delta,
            });
        }

        item.quantity = new_quantity;
        item.stock_value().map_err(|e| e.for_field("quantity"))?;
        item.updated_at = chrono::Utc::now();
        self.put_stock_item(&item).await?;

        Ok(item)
    }
}
