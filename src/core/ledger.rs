//! Ledger service - the single writer of purchase records and credits.
//!
//! A [`Ledger`] is built from a database connection and handed to whoever needs it;
//! clones share the same write gate, so record creation, restore stamping, credit
//! consumption and deletion never interleave on one store. Reads do not take the gate.

use crate::{
    config::catalog::Catalog,
    core::{credit as credits, purchase},
    entities::{ReportArea, credit, purchase_record},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait, prelude::*};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub use purchase::NewPurchase;

/// What [`Ledger::record_purchase`] did with a store purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// First delivery: the record and its credits were created.
    Recorded {
        /// The new record
        record: purchase_record::Model,
        /// Credits minted for it
        credits: Vec<credit::Model>,
    },
    /// Redelivery of a transaction already on file; nothing was written.
    AlreadyRecorded {
        /// The existing record
        record: purchase_record::Model,
        /// Its credits as currently stored
        credits: Vec<credit::Model>,
    },
}

impl PurchaseOutcome {
    /// The purchase record, new or existing.
    #[must_use]
    pub const fn record(&self) -> &purchase_record::Model {
        match self {
            Self::Recorded { record, .. } | Self::AlreadyRecorded { record, .. } => record,
        }
    }

    /// The record's credits.
    #[must_use]
    pub fn credits(&self) -> &[credit::Model] {
        match self {
            Self::Recorded { credits, .. } | Self::AlreadyRecorded { credits, .. } => credits,
        }
    }

    /// Whether this call created the record.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }

    fn with_record(self, record: purchase_record::Model) -> Self {
        match self {
            Self::Recorded { credits, .. } => Self::Recorded { record, credits },
            Self::AlreadyRecorded { credits, .. } => Self::AlreadyRecorded { record, credits },
        }
    }
}

/// A verified transaction delivered by the store's purchase-update stream.
///
/// The report area is not part of the event; it comes from the product catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
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
    /// Number of credits granted
    pub credit_amount: i32,
    /// When the store completed the purchase
    pub purchase_date: DateTime<Utc>,
    /// Delivered by a restore flow rather than a fresh buy
    pub is_restore: bool,
}

/// The purchase-to-credit ledger.
#[derive(Clone)]
pub struct Ledger {
    db: Arc<DatabaseConnection>,
    catalog: Arc<Catalog>,
    write_gate: Arc<Mutex<()>>,
}

impl Ledger {
    /// Creates a ledger over `db` with an empty product catalog.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db: Arc::new(db),
            catalog: Arc::new(Catalog::default()),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Replaces the catalog used to resolve report areas and credit amounts for
    /// store events.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// The underlying connection, for direct table reads in tests.
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// The product catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Records a store purchase and mints its credits.
    ///
    /// Redelivery of a transaction already on file is a no-op that returns
    /// [`PurchaseOutcome::AlreadyRecorded`] with the stored state.
    ///
    /// # Errors
    /// Returns a validation error for a malformed purchase or `Database` on storage failure.
    #[instrument(skip(self, purchase), fields(transaction_id = %purchase.transaction_id))]
    pub async fn record_purchase(&self, purchase: NewPurchase) -> Result<PurchaseOutcome> {
        purchase.validate()?;
        let _gate = self.write_gate.lock().await;

        let txn = self.db.begin().await?;
        match purchase::insert_purchase(&txn, &purchase).await {
            Ok((record, credits)) => {
                txn.commit().await?;
                Ok(PurchaseOutcome::Recorded { record, credits })
            }
            Err(Error::DuplicateTransaction { transaction_id }) => {
                txn.rollback().await?;
                warn!(
                    "Transaction {} redelivered; returning existing record",
                    transaction_id
                );
                let record = purchase::find_record_by_transaction(&*self.db, &transaction_id)
                    .await?
                    .ok_or(Error::NotFound { transaction_id })?;
                let credits = credits::credits_for_record(&*self.db, record.id).await?;
                Ok(PurchaseOutcome::AlreadyRecorded { record, credits })
            }
            Err(e) => Err(e),
        }
    }

    /// Stamps the record for `transaction_id` as restored, once.
    ///
    /// # Errors
    /// Returns `NotFound` if no record matches.
    #[instrument(skip(self))]
    pub async fn mark_restored(&self, transaction_id: &str) -> Result<purchase_record::Model> {
        let _gate = self.write_gate.lock().await;
        let txn = self.db.begin().await?;
        let record = purchase::set_restored(&txn, transaction_id, Utc::now()).await?;
        txn.commit().await?;
        Ok(record)
    }

    /// Applies a store event.
    ///
    /// Products listed in the catalog grant the catalog's credit amount; unlisted
    /// products grant what the store reported. Fresh purchases are recorded.
    /// Restores stamp `restored_date` on the existing record; if the original delivery never reached the ledger the purchase is
    /// recorded first, so a restore never mints credits twice.
    ///
    /// # Errors
    /// Same as [`Ledger::record_purchase`].
    #[instrument(skip(self, event), fields(transaction_id = %event.transaction_id, restore = event.is_restore))]
    pub async fn apply_store_event(&self, event: StoreEvent) -> Result<PurchaseOutcome> {
        let report_area = self.catalog.report_area_for(&event.product_id);
        let credit_amount = self
            .catalog
            .credit_amount_for(&event.product_id)
            .map_or(event.credit_amount, |listed| {
                if listed != event.credit_amount {
                    warn!(
                        "Store reported {} credit(s) for '{}' but the catalog lists {}; using the catalog",
                        event.credit_amount, event.product_id, listed
                    );
                }
                listed
            });
        let is_restore = event.is_restore;
        let purchase = NewPurchase {
            product_id: event.product_id,
            transaction_id: event.transaction_id,
            price: event.price,
            localized_price: event.localized_price,
            currency_code: event.currency_code,
            credit_amount,
            purchase_date: event.purchase_date,
            report_area: Some(report_area),
        };

        let outcome = self.record_purchase(purchase).await?;
        if !is_restore {
            return Ok(outcome);
        }

        let restored = self.mark_restored(&outcome.record().transaction_id).await?;
        Ok(outcome.with_record(restored))
    }

    /// Unconsumed credits, oldest first, optionally limited to an area.
    ///
    /// Credits are not assigned to profiles until spent, so `profile_id` does not
    /// narrow the result.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn available_credits(
        &self,
        profile_id: Option<Uuid>,
        area: Option<ReportArea>,
    ) -> Result<Vec<credit::Model>> {
        debug!("Listing available credits for profile {:?}", profile_id);
        credits::available_credits(&*self.db, area).await
    }

    /// Spends a credit on behalf of `profile_id`.
    ///
    /// # Errors
    /// Returns `CreditAlreadyConsumed` if another call spent it first and
    /// `CreditNotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn consume(&self, credit_id: Uuid, profile_id: Uuid) -> Result<credit::Model> {
        let _gate = self.write_gate.lock().await;
        let txn = self.db.begin().await?;
        let credit = credits::consume_credit(&txn, credit_id, profile_id, Utc::now()).await?;
        txn.commit().await?;
        Ok(credit)
    }

    /// Picks and spends a credit that can pay for an `area` report.
    ///
    /// Area-specific credits are spent before universal ones, each group oldest first.
    /// Credits lost to a concurrent spender are skipped.
    ///
    /// # Errors
    /// Returns `NoCreditsAvailable` when nothing is left for `area`.
    #[instrument(skip(self))]
    pub async fn spend_credit(&self, profile_id: Uuid, area: ReportArea) -> Result<credit::Model> {
        loop {
            let mut candidates = self.available_credits(Some(profile_id), Some(area)).await?;
            if candidates.is_empty() {
                info!("No credits left for {} reports", area.as_str());
                return Err(Error::NoCreditsAvailable { area: Some(area) });
            }
            candidates.sort_by_key(|c| c.report_area != area);

            for candidate in candidates {
                match self.consume(candidate.id, profile_id).await {
                    Ok(spent) => return Ok(spent),
                    Err(Error::CreditAlreadyConsumed { credit_id } | Error::CreditNotFound { credit_id }) => {
                        debug!("Lost credit {} to another spender, trying next", credit_id);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    /// Available credit counts per report area.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn credit_summary(&self) -> Result<BTreeMap<ReportArea, usize>> {
        credits::credit_summary(&*self.db).await
    }

    /// Looks up a record by store transaction identifier.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn find_record(&self, transaction_id: &str) -> Result<Option<purchase_record::Model>> {
        purchase::find_record_by_transaction(&*self.db, transaction_id).await
    }

    /// All records, newest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_records(&self) -> Result<Vec<purchase_record::Model>> {
        purchase::list_records(&*self.db).await
    }

    /// Every credit of a record.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn credits_for_record(&self, record_id: Uuid) -> Result<Vec<credit::Model>> {
        credits::credits_for_record(&*self.db, record_id).await
    }

    /// Unconsumed credits of a record.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn available_credits_for_record(&self, record_id: Uuid) -> Result<Vec<credit::Model>> {
        credits::available_credits_for_record(&*self.db, record_id).await
    }

    /// Consumed credits of a record.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn consumed_credits_for_record(&self, record_id: Uuid) -> Result<Vec<credit::Model>> {
        credits::consumed_credits_for_record(&*self.db, record_id).await
    }

    /// Credits a profile has spent.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn credits_consumed_by_profile(&self, profile_id: Uuid) -> Result<Vec<credit::Model>> {
        credits::credits_consumed_by_profile(&*self.db, profile_id).await
    }

    /// Deletes a record and its credits, e.g. on account reset.
    ///
    /// Returns the number of credits removed.
    ///
    /// # Errors
    /// Returns `NotFound` if no record matches.
    #[instrument(skip(self))]
    pub async fn delete_record(&self, transaction_id: &str) -> Result<u64> {
        let _gate = self.write_gate.lock().await;
        let txn = self.db.begin().await?;
        let removed = purchase::delete_record(&txn, transaction_id).await?;
        txn.commit().await?;
        Ok(removed)
    }
}
