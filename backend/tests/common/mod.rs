//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use inventory_backend::config::InventoryConfig;
use inventory_backend::services::stock::StockItemInput;
use inventory_backend::services::{
    ExpenseService, PurchaseService, ReportService, StockService, UsageService,
};
use inventory_backend::{FixedClock, InventoryStore, MemoryStore};
use rust_decimal::Decimal;
use shared::{StockCategory, StockItem};
use uuid::Uuid;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Every service wired to one in-memory store
#[derive(Clone)]
pub struct Harness {
    pub store: Arc<dyn InventoryStore>,
    pub stock: StockService,
    pub purchases: PurchaseService,
    pub usages: UsageService,
    pub expenses: ExpenseService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(InventoryConfig::default())
    }

    pub fn with_settings(settings: InventoryConfig) -> Self {
        let store: Arc<dyn InventoryStore> = Arc::new(MemoryStore::new());
        Self {
            stock: StockService::new(store.clone(), settings.clone()),
            purchases: PurchaseService::new(store.clone(), settings.clone()),
            usages: UsageService::new(store.clone(), settings.clone()),
            expenses: ExpenseService::new(store.clone(), settings),
            store,
        }
    }

    pub fn reports(&self, today: NaiveDate) -> ReportService {
        ReportService::new(self.store.clone(), Arc::new(FixedClock(today)))
    }

    pub async fn item(&self, name: &str, quantity: &str, unit_price: &str) -> StockItem {
        self.item_with_reorder(name, quantity, unit_price, None).await
    }

    pub async fn item_with_reorder(
        &self,
        name: &str,
        quantity: &str,
        unit_price: &str,
        reorder_level: Option<&str>,
    ) -> StockItem {
        self.stock
            .create(StockItemInput {
                name: name.to_string(),
                category: StockCategory::Ingredients,
                quantity: dec(quantity),
                unit: "kg".to_string(),
                unit_price: dec(unit_price),
                reorder_level: reorder_level.map(dec),
            })
            .await
            .unwrap()
    }

    pub async fn quantity(&self, id: Uuid) -> Decimal {
        self.stock.get(id).await.unwrap().quantity
    }
}
