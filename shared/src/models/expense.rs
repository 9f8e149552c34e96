//! Expense models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded operating expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub category: String,
    pub description: Option<String>,
    /// Legacy rows may lack an amount; reports count those as zero
    pub amount: Option<Decimal>,
    pub date: NaiveDate,
}
