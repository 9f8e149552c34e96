//! Concurrency tests
//!
//! Many tasks racing on the same stock item must never oversell it or lose
//! an update.

mod common;

use common::{date, dec, Harness};
use inventory_backend::config::InventoryConfig;
use inventory_backend::services::purchase::{PurchaseInput, PurchaseItemInput};
use inventory_backend::services::usage::UsageInput;
use inventory_backend::ErrorKind;
use rust_decimal::Decimal;
use shared::Pagination;
use uuid::Uuid;

fn patient() -> InventoryConfig {
    InventoryConfig {
        max_conflict_retries: 1_000,
        ..InventoryConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_usages_never_oversell() {
    let h = Harness::with_settings(patient());
    let flour = h.item("Flour", "10", "0.80").await;

    let flour_id = flour.id;
    let mut tasks = Vec::new();
    for _ in 0..25 {
        let usages = h.usages.clone();
        tasks.push(tokio::spawn(async move {
            usages
                .create(
                    UsageInput {
                        stock_item_id: flour_id,
                        quantity_used: Decimal::ONE,
                        date: date(2024, 3, 14),
                        purpose: None,
                    },
                    "line-cook",
                )
                .await
        }));
    }

    let mut accepted = 0u32;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert!(
                matches!(err.kind(), ErrorKind::InsufficientStock | ErrorKind::Conflict),
                "unexpected error: {err}"
            ),
        }
    }

    let remaining = h.quantity(flour.id).await;
    assert!(remaining >= Decimal::ZERO);
    assert_eq!(remaining, dec("10") - Decimal::from(accepted));
    assert!(accepted <= 10);

    let recorded = h.usages.list(&Pagination::new(1, 100)).await.unwrap();
    assert_eq!(recorded.pagination.total_items, u64::from(accepted));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_do_not_lose_updates() {
    let h = Harness::with_settings(patient());
    let rice = h.item("Rice", "0", "1.50").await;

    let rice_id = rice.id;
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let purchases = h.purchases.clone();
        tasks.push(tokio::spawn(async move {
            purchases
                .create(PurchaseInput {
                    supplier_id: Uuid::new_v4(),
                    date: date(2024, 3, 10),
                    items: vec![PurchaseItemInput {
                        stock_item_id: rice_id,
                        quantity: dec("2"),
                        price: dec("1.20"),
                    }],
                })
                .await
        }));
    }

    let mut accepted = 0u32;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            accepted += 1;
        }
    }

    assert_eq!(h.quantity(rice.id).await, dec("2") * Decimal::from(accepted));

    let recorded = h.purchases.list(&Pagination::new(1, 100)).await.unwrap();
    assert_eq!(recorded.pagination.total_items, u64::from(accepted));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_traffic_keeps_ledger_consistent() {
    let h = Harness::with_settings(patient());
    let sugar = h.item("Sugar", "5", "1.10").await;

    let sugar_id = sugar.id;
    let mut tasks = Vec::new();
    for i in 0..30 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move {
            if i % 3 == 0 {
                h.purchases
                    .create(PurchaseInput {
                        supplier_id: Uuid::new_v4(),
                        date: date(2024, 3, 10),
                        items: vec![PurchaseItemInput {
                            stock_item_id: sugar_id,
                            quantity: dec("3"),
                            price: dec("1.00"),
                        }],
                    })
                    .await
                    .map(|p| p.items[0].quantity)
            } else {
                h.usages
                    .create(
                        UsageInput {
                            stock_item_id: sugar_id,
                            quantity_used: dec("2"),
                            date: date(2024, 3, 14),
                            purpose: None,
                        },
                        "line-cook",
                    )
                    .await
                    .map(|u| -u.quantity_used)
            }
        }));
    }

    let mut expected = dec("5");
    for task in tasks {
        if let Ok(delta) = task.await.unwrap() {
            expected += delta;
        }
    }

    let remaining = h.quantity(sugar.id).await;
    assert_eq!(remaining, expected);
    assert!(remaining >= Decimal::ZERO);
}
