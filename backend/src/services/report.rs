//! Monthly report aggregation
//!
//! Reads the current stock snapshot and the month's purchases, expenses and
//! usages, then hands them to [`MonthlyReport::compute`]. Nothing is written.

use std::sync::Arc;

use shared::{MonthKey, MonthlyReport};
use tracing::{debug, instrument};

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::store::InventoryStore;

/// Report service for monthly summaries
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
}

impl ReportService {
    /// Create a new ReportService instance
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Build the report for `month` (`YYYY-MM`), or the current month when absent
    #[instrument(skip(self))]
    pub async fn monthly(&self, month: Option<&str>) -> AppResult<MonthlyReport> {
        let month = match month {
            Some(raw) => raw.parse::<MonthKey>()?,
            None => MonthKey::from_date(self.clock.today()),
        };
        let range = month.range();

        let stock = self.store.all_stock_items().await?;
        let purchases = self.store.purchases_between(&range).await?;
        let expenses = self.store.expenses_between(&range).await?;
        let usages = self.store.usages_between(&range).await?;

        debug!(
            %month,
            stock_items = stock.len(),
            purchases = purchases.len(),
            expenses = expenses.len(),
            usages = usages.len(),
            "Aggregating monthly report"
        );

        MonthlyReport::compute(month, &stock, &purchases, &expenses, &usages).map_err(|e| {
            AppError::Internal(format!("monthly report for {month} not representable: {e}"))
        })
    }
}
