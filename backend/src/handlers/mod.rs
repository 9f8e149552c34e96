//! HTTP request handlers

use serde::Deserialize;
use shared::Pagination;

mod expense;
mod health;
mod purchase;
mod report;
mod stock;
mod usage;

pub use expense::*;
pub use health::*;
pub use purchase::*;
pub use report::*;
pub use stock::*;
pub use usage::*;

/// Common list query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Case-insensitive name fragment, only used by stock listings
    pub q: Option<String>,
}

impl ListQuery {
    pub fn pagination(&self, default_page_size: u32) -> Pagination {
        Pagination::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(default_page_size),
        )
    }
}
