//! Database configuration module for the credit ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the unique constraints on transaction
//! identifiers and the cascading foreign key from credits to purchase records come
//! straight from the entity attributes.

use crate::entities::{Credit, PurchaseRecord};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/astro_credits.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns the
/// default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the `SQLite` database named by [`get_database_url`].
///
/// # Errors
/// Returns an error if the database cannot be opened.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    info!("Connecting to {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates the ledger tables if they do not already exist.
///
/// Purchase records are created before credits because credits reference them.
///
/// # Errors
/// Returns an error if a `CREATE TABLE` statement fails.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let purchase_record_table = schema
        .create_table_from_entity(PurchaseRecord)
        .if_not_exists()
        .to_owned();
    let credit_table = schema
        .create_table_from_entity(Credit)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&purchase_record_table)).await?;
    db.execute(builder.build(&credit_table)).await?;

    Ok(())
}
