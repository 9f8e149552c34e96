//! Purchase models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arithmetic::{exact_mul, exact_sum, ArithmeticError};

/// An inbound transaction that increases stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    /// Not checked for existence
    pub supplier_id: Uuid,
    pub date: NaiveDate,
    /// Always derived from `items`
    pub total_cost: Decimal,
    pub items: Vec<PurchaseItem>,
}

/// A purchase line, owned exclusively by its purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub id: Uuid,
    pub stock_item_id: Uuid,
    pub quantity: Decimal,
    /// Unit price paid
    pub price: Decimal,
}

impl PurchaseItem {
    pub fn line_total(&self) -> Result<Decimal, ArithmeticError> {
        exact_mul(self.quantity, self.price)
    }
}

/// Exact sum of quantity x price over all lines
pub fn purchase_total(items: &[PurchaseItem]) -> Result<Decimal, ArithmeticError> {
    exact_sum(items.iter().map(PurchaseItem::line_total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item(quantity: &str, price: &str) -> PurchaseItem {
        PurchaseItem {
            id: Uuid::new_v4(),
            stock_item_id: Uuid::new_v4(),
            quantity: Decimal::from_str(quantity).unwrap(),
            price: Decimal::from_str(price).unwrap(),
        }
    }

    #[test]
    fn total_is_exact_decimal_sum() {
        let items = vec![item("25", "1.20"), item("0.1", "0.2"), item("3.333", "3")];
        assert_eq!(purchase_total(&items).unwrap(), Decimal::from_str("40.019").unwrap());
    }

    #[test]
    fn empty_purchase_totals_zero() {
        assert_eq!(purchase_total(&[]).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn huge_line_is_rejected_instead_of_panicking() {
        let items = vec![item("100000000000000000000", "10000000000")];
        assert_eq!(purchase_total(&items), Err(ArithmeticError::Overflow));
    }

    #[test]
    fn lines_summing_past_the_range_are_rejected() {
        let items = vec![
            item("79228162514264337593543950335", "1"),
            item("1", "1"),
        ];
        assert_eq!(purchase_total(&items), Err(ArithmeticError::Overflow));
    }

    #[test]
    fn over_scale_line_is_rejected_instead_of_rounded() {
        let items = vec![item("0.00000000000000001", "0.00000000000000001")];
        assert_eq!(purchase_total(&items), Err(ArithmeticError::Inexact));
    }
}
