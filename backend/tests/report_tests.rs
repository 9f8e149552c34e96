//! Monthly report tests
//!
//! Tests for report aggregation including:
//! - Month filtering of purchases, expenses and usages
//! - Current-state stock value and low-stock count
//! - Profit identity
//! - Month key validation and defaulting
//! - Reads never changing any record
//! - Totals beyond the decimal range

mod common;

use common::{date, dec, Harness};
use inventory_backend::services::expense::ExpenseInput;
use inventory_backend::services::purchase::{PurchaseInput, PurchaseItemInput};
use inventory_backend::services::stock::StockItemInput;
use inventory_backend::services::usage::UsageInput;
use inventory_backend::ErrorKind;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{Expense, Pagination, Purchase, StockItem, Usage, MAX_PAGE_SIZE};
use uuid::Uuid;

async fn buy(h: &Harness, stock_item_id: Uuid, quantity: &str, price: &str, on: chrono::NaiveDate) {
    h.purchases
        .create(PurchaseInput {
            supplier_id: Uuid::new_v4(),
            date: on,
            items: vec![PurchaseItemInput {
                stock_item_id,
                quantity: dec(quantity),
                price: dec(price),
            }],
        })
        .await
        .unwrap();
}

async fn consume(h: &Harness, stock_item_id: Uuid, quantity: &str, on: chrono::NaiveDate) {
    h.usages
        .create(
            UsageInput {
                stock_item_id,
                quantity_used: dec(quantity),
                date: on,
                purpose: None,
            },
            "chef",
        )
        .await
        .unwrap();
}

async fn spend(h: &Harness, amount: Option<&str>, on: chrono::NaiveDate) {
    h.expenses
        .create(ExpenseInput {
            category: "Utilities".to_string(),
            description: None,
            amount: amount.map(dec),
            date: on,
        })
        .await
        .unwrap();
}

/// Every record in the store, as the list endpoints return them
#[derive(Debug, PartialEq)]
struct Snapshot {
    stock: Vec<StockItem>,
    purchases: Vec<Purchase>,
    usages: Vec<Usage>,
    expenses: Vec<Expense>,
}

async fn snapshot(h: &Harness) -> Snapshot {
    let all = Pagination::new(1, MAX_PAGE_SIZE);
    Snapshot {
        stock: h.stock.list(&all, None).await.unwrap().data,
        purchases: h.purchases.list(&all).await.unwrap().data,
        usages: h.usages.list(&all).await.unwrap().data,
        expenses: h.expenses.list(&all).await.unwrap().data,
    }
}

/// Call every read operation, including ones that fail
async fn read_everything(h: &Harness) {
    let all = Pagination::new(1, MAX_PAGE_SIZE);

    for item in h.stock.list(&all, None).await.unwrap().data {
        h.stock.get(item.id).await.unwrap();
    }
    h.stock.list(&all, Some("flour")).await.unwrap();
    for purchase in h.purchases.list(&all).await.unwrap().data {
        h.purchases.get(purchase.id).await.unwrap();
    }
    for usage in h.usages.list(&all).await.unwrap().data {
        h.usages.get(usage.id).await.unwrap();
    }
    for expense in h.expenses.list(&all).await.unwrap().data {
        h.expenses.get(expense.id).await.unwrap();
    }
    assert!(h.stock.get(Uuid::new_v4()).await.is_err());
    assert!(h.purchases.get(Uuid::new_v4()).await.is_err());

    let reports = h.reports(date(2024, 5, 30));
    reports.monthly(None).await.unwrap();
    reports.monthly(Some("2024-04")).await.unwrap();
    reports.monthly(Some("2023-12")).await.unwrap();
    assert!(reports.monthly(Some("2024-13")).await.is_err());
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_month_reports_only_stock_value() {
        let h = Harness::new();
        h.item("Flour", "10", "2.00").await;
        h.item("Rice", "4", "1.50").await;

        let report = h
            .reports(date(2024, 6, 1))
            .monthly(Some("2024-03"))
            .await
            .unwrap();

        assert_eq!(report.month.to_string(), "2024-03");
        assert_eq!(report.total_stock_value, dec("26.00"));
        assert_eq!(report.total_purchases, Decimal::ZERO);
        assert_eq!(report.total_expenses, Decimal::ZERO);
        assert_eq!(report.total_usage, 0);
        assert_eq!(report.estimated_sales_value, Decimal::ZERO);
        assert_eq!(report.profit, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_only_records_dated_in_month_are_counted() {
        let h = Harness::new();
        let flour = h.item("Flour", "0", "2.00").await;

        buy(&h, flour.id, "20", "1.00", date(2024, 3, 1)).await;
        buy(&h, flour.id, "5", "1.00", date(2024, 4, 1)).await;
        consume(&h, flour.id, "3", date(2024, 3, 31)).await;
        consume(&h, flour.id, "2", date(2024, 2, 29)).await;
        spend(&h, Some("12.50"), date(2024, 3, 15)).await;
        spend(&h, None, date(2024, 3, 16)).await;
        spend(&h, Some("99"), date(2024, 4, 15)).await;

        let report = h
            .reports(date(2024, 6, 1))
            .monthly(Some("2024-03"))
            .await
            .unwrap();

        assert_eq!(report.total_purchases, dec("20"));
        assert_eq!(report.total_expenses, dec("12.50"));
        assert_eq!(report.total_usage, 1);
        // 3 used at the current price of 2.00
        assert_eq!(report.estimated_sales_value, dec("6.00"));
        assert_eq!(report.profit, dec("-26.50"));
        // 20 + 5 - 3 - 2 on hand at 2.00
        assert_eq!(report.total_stock_value, dec("40.00"));
    }

    #[tokio::test]
    async fn test_sales_use_current_price_and_skip_removed_items() {
        let h = Harness::new();
        let flour = h.item("Flour", "10", "2.00").await;
        let saffron = h.item("Saffron", "1", "80.00").await;

        consume(&h, flour.id, "4", date(2024, 3, 5)).await;
        consume(&h, saffron.id, "1", date(2024, 3, 6)).await;
        h.stock.delete(saffron.id).await.unwrap();

        // Price change after the usage was recorded
        let input = StockItemInput {
            name: flour.name.clone(),
            category: flour.category,
            quantity: dec("6"),
            unit: flour.unit.clone(),
            unit_price: dec("2.50"),
            reorder_level: None,
        };
        h.stock.update(flour.id, input).await.unwrap();

        let report = h
            .reports(date(2024, 6, 1))
            .monthly(Some("2024-03"))
            .await
            .unwrap();

        assert_eq!(report.total_usage, 2);
        assert_eq!(report.estimated_sales_value, dec("10.00"));
    }

    #[tokio::test]
    async fn test_low_stock_counts_current_state() {
        let h = Harness::new();
        h.item_with_reorder("Flour", "5", "1.00", Some("5")).await;
        h.item_with_reorder("Rice", "6", "1.00", Some("5")).await;
        h.item_with_reorder("Salt", "0", "1.00", None).await;
        h.item_with_reorder("Oil", "0", "1.00", Some("0")).await;

        let report = h
            .reports(date(2024, 6, 1))
            .monthly(Some("1999-01"))
            .await
            .unwrap();

        assert_eq!(report.low_stock_items, 2);
    }

    #[tokio::test]
    async fn test_malformed_month_is_invalid_argument() {
        let h = Harness::new();
        let reports = h.reports(date(2024, 6, 1));

        for raw in ["2024-3", "24-03", "2024-00", "2024-13", "2024/03", "", "abcd-ef"] {
            let err = reports.monthly(Some(raw)).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{raw}");
        }
    }

    #[tokio::test]
    async fn test_month_defaults_to_clock() {
        let h = Harness::new();
        let flour = h.item("Flour", "10", "2.00").await;
        consume(&h, flour.id, "1", date(2024, 12, 31)).await;

        let report = h.reports(date(2024, 12, 31)).monthly(None).await.unwrap();

        assert_eq!(report.month.to_string(), "2024-12");
        assert_eq!(report.total_usage, 1);
    }

    #[tokio::test]
    async fn test_report_is_read_only_and_repeatable() {
        let h = Harness::new();
        let flour = h.item("Flour", "0", "2.00").await;
        buy(&h, flour.id, "8", "1.25", date(2024, 3, 2)).await;
        consume(&h, flour.id, "3", date(2024, 3, 3)).await;

        let reports = h.reports(date(2024, 3, 20));
        let first = reports.monthly(None).await.unwrap();
        let second = reports.monthly(None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.quantity(flour.id).await, dec("5"));
    }

    #[tokio::test]
    async fn test_report_serializes_with_camel_case_fields() {
        let h = Harness::new();
        let report = h
            .reports(date(2024, 3, 20))
            .monthly(Some("2024-03"))
            .await
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["month"], "2024-03");
        for field in [
            "totalStockValue",
            "totalPurchases",
            "totalExpenses",
            "totalUsage",
            "lowStockItems",
            "estimatedSalesValue",
            "profit",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }

    #[tokio::test]
    async fn test_reads_leave_every_record_unchanged() {
        let h = Harness::new();
        let flour = h.item_with_reorder("Flour", "20", "2.00", Some("5")).await;
        let oil = h.item("Oil", "3", "4.50").await;
        buy(&h, flour.id, "8", "1.25", date(2024, 4, 2)).await;
        buy(&h, oil.id, "0.5", "4.10", date(2024, 5, 2)).await;
        consume(&h, flour.id, "3", date(2024, 5, 3)).await;
        spend(&h, Some("120.00"), date(2024, 5, 4)).await;
        spend(&h, None, date(2024, 4, 4)).await;

        let before = snapshot(&h).await;
        read_everything(&h).await;
        read_everything(&h).await;

        assert_eq!(snapshot(&h).await, before);
        assert_eq!(h.quantity(flour.id).await, dec("25"));
        assert_eq!(h.quantity(oil.id).await, dec("3.5"));
    }

    #[tokio::test]
    async fn test_report_totals_stay_exact_at_large_magnitudes() {
        let h = Harness::new();
        let truffle = h.item("Truffle", "1000000000000000", "0.0001").await;
        let caviar = h.item("Caviar", "1000000000", "10000000000").await;
        consume(&h, caviar.id, "0.000001", date(2024, 3, 3)).await;

        let report = h.reports(date(2024, 3, 20)).monthly(None).await.unwrap();

        // 100000000000 + 999999999.999999 x 10000000000
        assert_eq!(report.total_stock_value, dec("10000000099999990000"));
        assert_eq!(report.estimated_sales_value, dec("10000"));
        assert_eq!(h.quantity(truffle.id).await, dec("1000000000000000"));
    }

    #[tokio::test]
    async fn test_stock_value_total_beyond_decimal_range_is_an_error() {
        let h = Harness::new();
        h.item("Water", "79228162514264337593543950335", "1").await;
        h.item("Ice", "1", "1").await;

        let err = h
            .reports(date(2024, 3, 20))
            .monthly(Some("2024-03"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::test_runner::TestCaseError;

    fn amount_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..100_000, 0u32..3).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Profit always equals estimated sales minus purchases and expenses
        #[test]
        fn prop_profit_identity(
            purchases in prop::collection::vec((1i64..50, amount_strategy()), 0..5),
            expenses in prop::collection::vec(prop::option::of(amount_strategy()), 0..5),
            usages in prop::collection::vec(1i64..5, 0..5),
        ) {
            tokio_test::block_on(async {
                let h = Harness::new();
                let flour = h.item("Flour", "1000", "3.25").await;

                for (qty, price) in &purchases {
                    buy(&h, flour.id, &qty.to_string(), &price.to_string(), date(2024, 5, 2)).await;
                }
                for amount in &expenses {
                    let amount = amount.map(|a| a.to_string());
                    spend(&h, amount.as_deref(), date(2024, 5, 3)).await;
                }
                for qty in &usages {
                    consume(&h, flour.id, &qty.to_string(), date(2024, 5, 4)).await;
                }

                let report = h.reports(date(2024, 5, 30)).monthly(None).await.unwrap();

                prop_assert_eq!(
                    report.profit,
                    report.estimated_sales_value - (report.total_purchases + report.total_expenses)
                );
                prop_assert_eq!(report.total_usage, usages.len() as u64);

                let expected_sales: Decimal =
                    usages.iter().map(|q| Decimal::from(*q) * dec("3.25")).sum();
                prop_assert_eq!(report.estimated_sales_value, expected_sales);
                Ok::<(), TestCaseError>(())
            })?;
        }

        /// Reading and reporting never change a record
        #[test]
        fn prop_reads_are_side_effect_free(
            purchases in prop::collection::vec((0usize..2, 1i64..50, amount_strategy(), 1u32..29), 0..5),
            usages in prop::collection::vec((0usize..2, 1i64..5, 1u32..29), 0..5),
            expenses in prop::collection::vec((prop::option::of(amount_strategy()), 1u32..29), 0..4),
        ) {
            tokio_test::block_on(async {
                let h = Harness::new();
                let items = [
                    h.item("Flour", "1000", "3.25").await,
                    h.item_with_reorder("Oil", "50", "7.10", Some("60")).await,
                ];

                for (idx, qty, price, day) in &purchases {
                    buy(&h, items[*idx].id, &qty.to_string(), &price.to_string(), date(2024, 4, *day)).await;
                }
                for (idx, qty, day) in &usages {
                    consume(&h, items[*idx].id, &qty.to_string(), date(2024, 5, *day)).await;
                }
                for (amount, day) in &expenses {
                    let amount = amount.map(|a| a.to_string());
                    spend(&h, amount.as_deref(), date(2024, 5, *day)).await;
                }

                let before = snapshot(&h).await;
                read_everything(&h).await;
                let after = snapshot(&h).await;

                prop_assert_eq!(after, before);
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
