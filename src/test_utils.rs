//! Shared test utilities for the credit ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and building purchases and store events with sensible defaults.

use crate::{
    core::{Ledger, NewPurchase, StoreEvent},
    entities::ReportArea,
    errors::Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
///
/// # Errors
/// Returns an error if the connection or table creation fails.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a ledger over a fresh in-memory database.
///
/// # Errors
/// Same as [`setup_test_db`].
pub async fn setup_test_ledger() -> Result<Ledger> {
    Ok(Ledger::new(setup_test_db().await?))
}

/// Builds a purchase with sensible defaults.
///
/// # Defaults
/// * `product_id`: `"com.app.report.general"`
/// * `price`: 4.99 USD, shown as `"$4.99"`
/// * `credit_amount`: 1
/// * `purchase_date`: now
/// * `report_area`: general
pub fn sample_purchase(transaction_id: &str) -> NewPurchase {
    NewPurchase {
        product_id: "com.app.report.general".to_string(),
        transaction_id: transaction_id.to_string(),
        price: Decimal::new(499, 2),
        localized_price: "$4.99".to_string(),
        currency_code: "USD".to_string(),
        credit_amount: 1,
        purchase_date: Utc::now(),
        report_area: Some(ReportArea::General),
    }
}

/// Builds a fresh-purchase store event with the same defaults as [`sample_purchase`].
pub fn sample_event(transaction_id: &str) -> StoreEvent {
    let purchase = sample_purchase(transaction_id);
    StoreEvent {
        product_id: purchase.product_id,
        transaction_id: purchase.transaction_id,
        price: purchase.price,
        localized_price: purchase.localized_price,
        currency_code: purchase.currency_code,
        credit_amount: purchase.credit_amount,
        purchase_date: purchase.purchase_date,
        is_restore: false,
    }
}
