//! Product catalog loading from config.toml
//!
//! The store tells the ledger which product was bought but not which report area it
//! unlocks. The catalog maps store product identifiers to the credits and area they
//! grant. Products missing from the catalog fall back to the last dotted segment of
//! their identifier (`com.app.report.career` unlocks career reports), and anything
//! unrecognised grants universal credits.

use crate::entities::ReportArea;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Configuration structure representing the catalog section of config.toml
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Products sold in the store
    #[serde(default)]
    pub products: Vec<ProductConfig>,
}

/// Configuration for a single store product
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ProductConfig {
    /// Store product identifier
    pub product_id: String,
    /// Name shown on the purchase screen
    #[serde(default)]
    pub display_name: Option<String>,
    /// Credits granted per purchase
    #[serde(default = "default_credit_amount")]
    pub credit_amount: i32,
    /// Area the credits unlock; absent means universal
    #[serde(default)]
    pub report_area: Option<ReportArea>,
}

const fn default_credit_amount() -> i32 {
    1
}

impl Catalog {
    /// Finds the catalog entry for a store product.
    #[must_use]
    pub fn find(&self, product_id: &str) -> Option<&ProductConfig> {
        self.products.iter().find(|p| p.product_id == product_id)
    }

    /// Resolves the report area a product's credits unlock.
    #[must_use]
    pub fn report_area_for(&self, product_id: &str) -> ReportArea {
        if let Some(product) = self.find(product_id) {
            return product.report_area.unwrap_or(ReportArea::Universal);
        }

        let area = product_id
            .rsplit('.')
            .next()
            .and_then(|segment| segment.parse().ok())
            .unwrap_or(ReportArea::Universal);
        debug!(
            "Product '{}' not in catalog, resolved area {} from its identifier",
            product_id,
            area.as_str()
        );
        area
    }

    /// Credits a product grants, if it is in the catalog.
    #[must_use]
    pub fn credit_amount_for(&self, product_id: &str) -> Option<i32> {
        self.find(product_id).map(|p| p.credit_amount)
    }
}

/// Loads the product catalog from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A product has an unknown report area
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read catalog file: {e}"),
    })?;

    let catalog: Catalog = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog: {e}"),
    })?;

    if let Some(bad) = catalog.products.iter().find(|p| p.credit_amount < 1) {
        return Err(Error::Config {
            message: format!(
                "Product '{}' must grant at least one credit",
                bad.product_id
            ),
        });
    }

    Ok(catalog)
}

/// Loads the catalog from `CATALOG_PATH`, or ./config.toml when unset
///
/// # Errors
/// Same as [`load_catalog`].
pub fn load_default_catalog() -> Result<Catalog> {
    let path = std::env::var("CATALOG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_catalog(path)
}
