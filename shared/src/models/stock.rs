//! Stock item models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arithmetic::{exact_mul, ArithmeticError};

/// A trackable inventory unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: Uuid,
    pub name: String,
    pub category: StockCategory,
    pub quantity: Decimal,
    /// Free-text unit, e.g. "kg", "l", "pcs"
    pub unit: String,
    pub unit_price: Decimal,
    /// Threshold at or below which the item counts as low stock
    pub reorder_level: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// Current value of the item on hand
    pub fn stock_value(&self) -> Result<Decimal, ArithmeticError> {
        exact_mul(self.unit_price, self.quantity)
    }

    /// An item without a reorder level is never low
    pub fn is_low_stock(&self) -> bool {
        self.reorder_level
            .map(|level| self.quantity <= level)
            .unwrap_or(false)
    }
}

/// Stock categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockCategory {
    Ingredients,
    Drinks,
    Supplies,
    Food,
    Other,
}

impl StockCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockCategory::Ingredients => "INGREDIENTS",
            StockCategory::Drinks => "DRINKS",
            StockCategory::Supplies => "SUPPLIES",
            StockCategory::Food => "FOOD",
            StockCategory::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INGREDIENTS" => Some(StockCategory::Ingredients),
            "DRINKS" => Some(StockCategory::Drinks),
            "SUPPLIES" => Some(StockCategory::Supplies),
            "FOOD" => Some(StockCategory::Food),
            "OTHER" => Some(StockCategory::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for StockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a quantity adjustment may leave the item below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityGuard {
    /// Reject any adjustment whose result would be negative
    NonNegative,
    Unguarded,
}
