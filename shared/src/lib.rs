//! Shared types and models for the restaurant inventory platform
//!
//! This crate contains the domain models, the pure monthly report
//! aggregation, exact decimal arithmetic and input validation used by the
//! backend.

pub mod arithmetic;
pub mod models;
pub mod types;
pub mod validation;

pub use arithmetic::*;
pub use models::*;
pub use types::*;
pub use validation::*;
