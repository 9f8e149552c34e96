//! Domain models for the restaurant inventory

mod expense;
mod purchase;
mod report;
mod stock;
mod usage;

pub use expense::*;
pub use purchase::*;
pub use report::*;
pub use stock::*;
pub use usage::*;
