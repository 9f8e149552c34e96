//! Usage models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An outbound transaction that consumes stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub id: Uuid,
    pub stock_item_id: Uuid,
    pub quantity_used: Decimal,
    pub date: NaiveDate,
    pub purpose: Option<String>,
    pub created_by: Option<String>,
}
