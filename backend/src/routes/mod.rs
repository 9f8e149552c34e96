//! Route definitions for the Restaurant Inventory API

use axum::{
    routing::get,
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Stock item catalogue
        .nest("/stocks", stock_routes())
        // Inbound stock
        .nest("/purchases", purchase_routes())
        // Outbound stock
        .nest("/usages", usage_routes())
        // Operating costs
        .nest("/expenses", expense_routes())
        // Reports
        .nest("/reports", report_routes())
}

/// Stock item routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_stock_items).post(handlers::create_stock_item),
        )
        .route(
            "/:id",
            get(handlers::get_stock_item)
                .put(handlers::update_stock_item)
                .delete(handlers::delete_stock_item),
        )
}

/// Purchase routes
fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchases).post(handlers::create_purchase),
        )
        .route(
            "/:id",
            get(handlers::get_purchase)
                .put(handlers::update_purchase)
                .delete(handlers::delete_purchase),
        )
}

/// Usage routes
fn usage_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_usages).post(handlers::create_usage))
        .route(
            "/:id",
            get(handlers::get_usage)
                .put(handlers::update_usage)
                .delete(handlers::delete_usage),
        )
}

/// Expense routes
fn expense_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route(
            "/:id",
            get(handlers::get_expense)
                .put(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
}

/// Reporting routes
fn report_routes() -> Router<AppState> {
    Router::new().route("/monthly", get(handlers::get_monthly_report))
}
