//! Business logic services for the inventory platform

use std::future::Future;

use crate::error::{AppResult, ErrorKind};

pub mod expense;
pub mod purchase;
pub mod report;
pub mod stock;
pub mod usage;

pub use expense::ExpenseService;
pub use purchase::PurchaseService;
pub use report::ReportService;
pub use stock::StockService;
pub use usage::UsageService;

/// Run `attempt` again while it fails with `Conflict`, at most `max_retries`
/// extra times. Any other outcome is returned as is.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    operation: &'static str,
    max_retries: u32,
    mut attempt: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(err) if err.kind() == ErrorKind::Conflict && retries < max_retries => {
                retries += 1;
                tracing::warn!(operation, retries, error = %err, "Concurrent modification, retrying");
                tokio::task::yield_now().await;
            }
            result => return result,
        }
    }
}
