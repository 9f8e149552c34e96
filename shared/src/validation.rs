//! Input validation for inventory operations

use rust_decimal::Decimal;
use thiserror::Error;

/// A field that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ValidationError {
    pub fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

// ============================================================================
// Quantity and Price Validations
// ============================================================================

/// Validate a quantity that must be strictly positive (usage, purchase lines)
pub fn validate_positive(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }
    Ok(())
}

/// Validate an amount that may be zero but never negative
pub fn validate_non_negative(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value < Decimal::ZERO {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate that a required text field is not blank
pub fn validate_not_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be blank"));
    }
    Ok(())
}

/// Validate that a collection has at least one element
pub fn validate_not_empty<T>(field: &'static str, values: &[T]) -> Result<(), ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::new(field, "must contain at least one entry"));
    }
    Ok(())
}
