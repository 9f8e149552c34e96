//! Exact decimal arithmetic for money and quantities
//!
//! `rust_decimal` panics on overflow in its operators and silently rounds
//! when a result needs more than 28 fractional digits or 96 bits of
//! mantissa. Every amount that reaches the ledgers or a report goes through
//! these helpers instead, so a result is either exact or an error.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::validation::ValidationError;

/// Why an exact result could not be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("exceeds the supported decimal range")]
    Overflow,
    #[error("cannot be represented without rounding")]
    Inexact,
}

impl ArithmeticError {
    /// Attach the offending input field
    pub fn for_field(self, field: &'static str) -> ValidationError {
        let message = match self {
            ArithmeticError::Overflow => "exceeds the supported decimal range",
            ArithmeticError::Inexact => "cannot be represented without rounding",
        };
        ValidationError::new(field, message)
    }
}

/// `a * b`, or an error when the product overflows or would be rounded
pub fn exact_mul(a: Decimal, b: Decimal) -> Result<Decimal, ArithmeticError> {
    if a.is_zero() || b.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let product = a.checked_mul(b).ok_or(ArithmeticError::Overflow)?;
    // rounding always drops fractional digits
    if product.scale() != a.scale() + b.scale() {
        return Err(ArithmeticError::Inexact);
    }
    Ok(product)
}

/// `a + b`, or an error when the sum overflows or would be rounded
pub fn exact_add(a: Decimal, b: Decimal) -> Result<Decimal, ArithmeticError> {
    if a.is_zero() {
        return Ok(b);
    }
    if b.is_zero() {
        return Ok(a);
    }
    let sum = a.checked_add(b).ok_or(ArithmeticError::Overflow)?;
    if sum.scale() != a.scale().max(b.scale()) {
        return Err(ArithmeticError::Inexact);
    }
    Ok(sum)
}

pub fn exact_sub(a: Decimal, b: Decimal) -> Result<Decimal, ArithmeticError> {
    exact_add(a, -b)
}

/// Sum of fallible terms; the first error wins
pub fn exact_sum<I>(terms: I) -> Result<Decimal, ArithmeticError>
where
    I: IntoIterator<Item = Result<Decimal, ArithmeticError>>,
{
    terms
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, term| exact_add(acc, term?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn products_keep_every_digit() {
        assert_eq!(exact_mul(dec("25"), dec("1.20")).unwrap(), dec("30.00"));
        assert_eq!(exact_mul(dec("0.1"), dec("0.2")).unwrap(), dec("0.02"));
        assert_eq!(exact_mul(dec("-3"), dec("0.5")).unwrap(), dec("-1.5"));
        assert_eq!(exact_mul(Decimal::ZERO, Decimal::MAX).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn overflowing_product_is_an_error() {
        assert_eq!(
            exact_mul(dec("100000000000000000000"), dec("10000000000")),
            Err(ArithmeticError::Overflow)
        );
        assert_eq!(exact_mul(Decimal::MAX, dec("2")), Err(ArithmeticError::Overflow));
    }

    #[test]
    fn product_beyond_28_fractional_digits_is_an_error() {
        let tiny = dec("0.00000000000000001");
        assert_eq!(exact_mul(tiny, tiny), Err(ArithmeticError::Inexact));
    }

    #[test]
    fn product_needing_more_mantissa_is_an_error() {
        // 29 significant digits cannot fit in 96 bits
        let wide = dec("1.0000000000000000000000000001");
        assert_eq!(exact_mul(wide, dec("9")), Err(ArithmeticError::Inexact));
    }

    #[test]
    fn sums_overflow_or_round_into_errors() {
        assert_eq!(exact_add(Decimal::MAX, Decimal::ONE), Err(ArithmeticError::Overflow));
        assert_eq!(exact_sub(Decimal::MIN, Decimal::ONE), Err(ArithmeticError::Overflow));
        assert_eq!(
            exact_add(dec("79228162514264337593543950334"), dec("0.5")),
            Err(ArithmeticError::Inexact)
        );
        assert_eq!(exact_add(dec("1.5"), dec("-1.5")).unwrap(), Decimal::ZERO);
        assert_eq!(exact_add(Decimal::ZERO, Decimal::MAX).unwrap(), Decimal::MAX);
    }

    #[test]
    fn sum_stops_at_first_error() {
        let terms = vec![Ok(dec("1")), Err(ArithmeticError::Inexact), Ok(Decimal::MAX)];
        assert_eq!(exact_sum(terms), Err(ArithmeticError::Inexact));
        assert_eq!(exact_sum(Vec::new()).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn field_is_attached_to_the_message() {
        let err = ArithmeticError::Overflow.for_field("quantity");
        assert_eq!(err.field, "quantity");
        assert_eq!(err.to_string(), "quantity: exceeds the supported decimal range");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_small_operands_match_operators(
            a in -1_000_000_000i64..1_000_000_000i64,
            b in -1_000_000_000i64..1_000_000_000i64,
            sa in 0u32..6,
            sb in 0u32..6,
        ) {
            let x = Decimal::new(a, sa);
            let y = Decimal::new(b, sb);
            prop_assert_eq!(exact_mul(x, y).unwrap(), x * y);
            prop_assert_eq!(exact_add(x, y).unwrap(), x + y);
            prop_assert_eq!(exact_sub(x, y).unwrap(), x - y);
        }
    }
}
