//! Purchase record entity - One completed store purchase.
//!
//! Each record carries the store's `product_id` and `transaction_id`, the price paid,
//! how many credits it granted, and an optional `restored_date` set when the purchase
//! was later recovered through a restore flow instead of a fresh buy.
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Purchase record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_records")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Store product identifier (e.g., `"com.app.report.general"`)
    pub product_id: String,
    /// Store transaction identifier, unique across all records
    #[sea_orm(unique)]
    pub transaction_id: String,
    /// When the store completed the purchase
    pub purchase_date: DateTimeUtc,
    /// Price paid, kept as canonical decimal text so no precision is lost
    pub price: String,
    /// ISO 4217 currency code
    pub currency_code: String,
    /// Price string as the store displayed it (e.g., `"$4.99"`)
    pub localized_price: String,
    /// Number of credits this purchase granted
    pub credit_amount: i32,
    /// Set once if the entitlement was recovered by a restore
    pub restored_date: Option<DateTimeUtc>,
}

impl Model {
    /// Parses the stored price back into an exact decimal.
    ///
    /// # Errors
    /// Fails only if the column was written by something other than the ledger.
    pub fn price_decimal(&self) -> Result<Decimal, rust_decimal::Error> {
        Decimal::from_str(&self.price)
    }

    /// Whether this purchase has been recovered through a restore.
    #[must_use]
    pub const fn is_restored(&self) -> bool {
        self.restored_date.is_some()
    }
}

/// Defines relationships between `PurchaseRecord` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One record owns many credits
    #[sea_orm(has_many = "super::credit::Entity")]
    Credits,
}

impl Related<super::credit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Credits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
