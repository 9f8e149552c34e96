//! Monthly financial report

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Expense, Purchase, StockItem, Usage};
use crate::arithmetic::{exact_add, exact_mul, exact_sub, exact_sum, ArithmeticError};
use crate::types::MonthKey;

/// Aggregate figures for one calendar month.
///
/// Stock value and low-stock count describe the current stock set; every
/// other figure only counts records dated inside `month`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub month: MonthKey,
    pub total_stock_value: Decimal,
    pub total_purchases: Decimal,
    pub total_expenses: Decimal,
    /// Number of usage records in the month
    pub total_usage: u64,
    /// Number of items currently at or below their reorder level
    pub low_stock_items: u64,
    pub estimated_sales_value: Decimal,
    pub profit: Decimal,
}

impl MonthlyReport {
    /// Aggregate a report from the current stock set and the record ledgers.
    ///
    /// Records outside `month` are ignored, so callers may pass either the
    /// full ledgers or a pre-filtered slice. Estimated sales price each usage
    /// at the referenced item's current unit price; usages of items that no
    /// longer exist contribute zero. Every figure is exact: a total that
    /// leaves the decimal range or needs rounding is an error.
    pub fn compute(
        month: MonthKey,
        stock: &[StockItem],
        purchases: &[Purchase],
        expenses: &[Expense],
        usages: &[Usage],
    ) -> Result<Self, ArithmeticError> {
        let total_stock_value = exact_sum(stock.iter().map(StockItem::stock_value))?;
        let low_stock_items = stock.iter().filter(|s| s.is_low_stock()).count() as u64;

        let total_purchases = exact_sum(
            purchases
                .iter()
                .filter(|p| month.contains(p.date))
                .map(|p| Ok(p.total_cost)),
        )?;

        let total_expenses = exact_sum(
            expenses
                .iter()
                .filter(|e| month.contains(e.date))
                .map(|e| Ok(e.amount.unwrap_or(Decimal::ZERO))),
        )?;

        let prices: HashMap<Uuid, Decimal> = stock.iter().map(|s| (s.id, s.unit_price)).collect();
        let month_usages: Vec<&Usage> = usages.iter().filter(|u| month.contains(u.date)).collect();

        let estimated_sales_value = exact_sum(month_usages.iter().map(|u| {
            prices
                .get(&u.stock_item_id)
                .map(|price| exact_mul(*price, u.quantity_used))
                .unwrap_or(Ok(Decimal::ZERO))
        }))?;

        let costs = exact_add(total_purchases, total_expenses)?;
        let profit = exact_sub(estimated_sales_value, costs)?;

        Ok(Self {
            month,
            total_stock_value,
            total_purchases,
            total_expenses,
            total_usage: month_usages.len() as u64,
            low_stock_items,
            estimated_sales_value,
            profit,
        })
    }
}
