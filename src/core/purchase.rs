//! Purchase record storage - Creating, restoring, looking up and deleting purchase records.
//!
//! A purchase record and the credits it grants are always written together so a
//! half-recorded purchase can never be observed. The writers in this module are
//! crate-private: every state change goes through [`crate::core::ledger::Ledger`],
//! which serializes them. Readers are public and take any connection or transaction.

use crate::{
    entities::{Credit, PurchaseRecord, ReportArea, credit, purchase_record},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, SqlErr, prelude::*};
use tracing::{debug, info, instrument, warn};

/// A verified store purchase about to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchase {
    /// Store product identifier
    pub product_id: String,
    /// Store transaction identifier
    pub transaction_id: String,
    /// Price paid
    pub price: Decimal,
    /// Price as the store displayed it
    pub localized_price: String,
    /// ISO 4217 currency code
    pub currency_code: String,
    /// Number of credits to mint
    pub credit_amount: i32,
    /// When the store completed the purchase
    pub purchase_date: DateTime<Utc>,
    /// Area the credits may pay for; `None` mints universal credits
    pub report_area: Option<ReportArea>,
}

impl NewPurchase {
    /// Checks the purchase before anything touches storage.
    ///
    /// # Errors
    /// Returns `EmptyTransactionId`, `InvalidCreditAmount` or `InvalidPrice`.
    pub fn validate(&self) -> Result<()> {
        if self.transaction_id.trim().is_empty() {
            return Err(Error::EmptyTransactionId);
        }

        if self.credit_amount < 1 {
            return Err(Error::InvalidCreditAmount {
                amount: self.credit_amount,
            });
        }

        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(Error::InvalidPrice {
                value: self.price.to_string(),
            });
        }

        Ok(())
    }
}

/// Builds the per-credit transaction identifier for the `index`-th credit of a purchase.
#[must_use]
pub fn credit_transaction_id(transaction_id: &str, index: i32) -> String {
    format!("{transaction_id}#{index}")
}

/// Writes a purchase record and its credits.
///
/// Callers pass a database transaction so the record and credits commit together.
///
/// # Errors
/// Returns `DuplicateTransaction` if the store transaction is already on file,
/// whether caught by the lookup or by the unique constraint on insert.
#[instrument(skip(db, purchase), fields(transaction_id = %purchase.transaction_id))]
pub(crate) async fn insert_purchase<C>(
    db: &C,
    purchase: &NewPurchase,
) -> Result<(purchase_record::Model, Vec<credit::Model>)>
where
    C: ConnectionTrait,
{
    purchase.validate()?;

    if find_record_by_transaction(db, &purchase.transaction_id)
        .await?
        .is_some()
    {
        return Err(Error::DuplicateTransaction {
            transaction_id: purchase.transaction_id.clone(),
        });
    }

    let record = purchase_record::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(purchase.product_id.clone()),
        transaction_id: Set(purchase.transaction_id.clone()),
        purchase_date: Set(purchase.purchase_date),
        price: Set(purchase.price.normalize().to_string()),
        currency_code: Set(purchase.currency_code.clone()),
        localized_price: Set(purchase.localized_price.clone()),
        credit_amount: Set(purchase.credit_amount),
        restored_date: Set(None),
    }
    .insert(db)
    .await
    .map_err(|e| duplicate_or_db(e, &purchase.transaction_id))?;

    let area = purchase.report_area.unwrap_or(ReportArea::Universal);
    let mut credits = Vec::with_capacity(usize::try_from(purchase.credit_amount).unwrap_or(0));
    for index in 0..purchase.credit_amount {
        let credit = credit::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_record_id: Set(record.id),
            report_area: Set(area),
            purchase_date: Set(purchase.purchase_date),
            consumed: Set(false),
            consumed_date: Set(None),
            sequence: Set(index),
            transaction_id: Set(credit_transaction_id(&purchase.transaction_id, index)),
            user_profile_id: Set(None),
        }
        .insert(db)
        .await
        .map_err(|e| duplicate_or_db(e, &purchase.transaction_id))?;
        credits.push(credit);
    }

    info!(
        "Recorded purchase {} for product '{}': {} {} credit(s)",
        record.transaction_id,
        record.product_id,
        credits.len(),
        area.as_str()
    );
    Ok((record, credits))
}

fn duplicate_or_db(err: DbErr, transaction_id: &str) -> Error {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        warn!(
            "Unique constraint rejected transaction {}; treating as duplicate",
            transaction_id
        );
        Error::DuplicateTransaction {
            transaction_id: transaction_id.to_string(),
        }
    } else {
        Error::Database(err)
    }
}

/// Stamps `restored_date` on the record for `transaction_id` unless it is already set.
///
/// # Errors
/// Returns `NotFound` if no record matches.
#[instrument(skip(db))]
pub(crate) async fn set_restored<C>(
    db: &C,
    transaction_id: &str,
    now: DateTime<Utc>,
) -> Result<purchase_record::Model>
where
    C: ConnectionTrait,
{
    let record = find_record_by_transaction(db, transaction_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            transaction_id: transaction_id.to_string(),
        })?;

    if record.restored_date.is_some() {
        debug!("Transaction {} already marked restored", transaction_id);
        return Ok(record);
    }

    let mut active: purchase_record::ActiveModel = record.into();
    active.restored_date = Set(Some(now));
    let updated = active.update(db).await?;
    info!("Marked transaction {} as restored", transaction_id);
    Ok(updated)
}

/// Deletes a purchase record together with every credit it granted.
///
/// Returns the number of credits removed.
///
/// # Errors
/// Returns `NotFound` if no record matches.
#[instrument(skip(db))]
pub(crate) async fn delete_record<C>(db: &C, transaction_id: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    let record = find_record_by_transaction(db, transaction_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            transaction_id: transaction_id.to_string(),
        })?;

    let removed = Credit::delete_many()
        .filter(credit::Column::PurchaseRecordId.eq(record.id))
        .exec(db)
        .await?
        .rows_affected;
    PurchaseRecord::delete_by_id(record.id).exec(db).await?;

    info!(
        "Deleted purchase {} and {} credit(s)",
        transaction_id, removed
    );
    Ok(removed)
}

/// Looks up a purchase record by its store transaction identifier.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn find_record_by_transaction<C>(
    db: &C,
    transaction_id: &str,
) -> Result<Option<purchase_record::Model>>
where
    C: ConnectionTrait,
{
    PurchaseRecord::find()
        .filter(purchase_record::Column::TransactionId.eq(transaction_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all purchase records, newest purchase first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_records<C>(db: &C) -> Result<Vec<purchase_record::Model>>
where
    C: ConnectionTrait,
{
    PurchaseRecord::find()
        .order_by_desc(purchase_record::Column::PurchaseDate)
        .order_by_asc(purchase_record::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
