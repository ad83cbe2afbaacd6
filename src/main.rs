use astro_credits::{
    config::{catalog, database},
    core::Ledger,
    entities::ReportArea,
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    if dotenv().is_err() {
        info!("No .env file found, using process environment.");
    }

    // 3. Open the database and make sure the ledger tables exist
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Ledger tables ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 4. Load the product catalog; unknown products still resolve from their identifiers
    let product_catalog = catalog::load_default_catalog().unwrap_or_else(|e| {
        warn!("Continuing without a product catalog: {}", e);
        catalog::Catalog::default()
    });
    info!("Catalog lists {} product(s).", product_catalog.products.len());
    for product in &product_catalog.products {
        info!(
            "  {}: {} credit(s) for {} reports",
            product.display_name.as_deref().unwrap_or(&product.product_id),
            product.credit_amount,
            product.report_area.map_or("any", ReportArea::as_str)
        );
    }

    let ledger = Ledger::new(db).with_catalog(product_catalog);

    // 5. Report what is left to spend
    let records = ledger.list_records().await?;
    let summary = ledger.credit_summary().await?;
    info!("{} purchase record(s) on file.", records.len());
    if summary.is_empty() {
        info!("No credits available.");
    }
    for (area, count) in &summary {
        info!(
            "{} available credit(s) for {} reports.",
            count,
            area.as_str()
        );
    }

    Ok(())
}
