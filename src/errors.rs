//! Unified error type for the ledger.
//!
//! Every fallible operation returns [`Result`]. Variants other than
//! [`Error::Database`] and [`Error::Config`] are expected outcomes that callers
//! recover from by re-querying, re-selecting, or routing the user to purchase.

use crate::entities::ReportArea;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the ledger and its configuration layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying storage failure, surfaced as-is and never retried here
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A purchase must grant at least one credit
    #[error("Invalid credit amount: {amount} (must be at least 1)")]
    InvalidCreditAmount {
        /// The rejected amount
        amount: i32,
    },

    /// Price is negative or stored in an unreadable form
    #[error("Invalid price: {value}")]
    InvalidPrice {
        /// The rejected price text
        value: String,
    },

    /// Store transaction identifier is blank
    #[error("Transaction identifier must not be empty")]
    EmptyTransactionId,

    /// A purchase with this store transaction identifier is already on file
    #[error("Transaction '{transaction_id}' has already been recorded")]
    DuplicateTransaction {
        /// Store transaction identifier
        transaction_id: String,
    },

    /// No purchase record matches the store transaction identifier
    #[error("No purchase recorded for transaction '{transaction_id}'")]
    NotFound {
        /// Store transaction identifier
        transaction_id: String,
    },

    /// No credit has this identifier
    #[error("Credit {credit_id} not found")]
    CreditNotFound {
        /// Credit identifier
        credit_id: Uuid,
    },

    /// The credit was spent before this call could spend it
    #[error("Credit {credit_id} has already been consumed")]
    CreditAlreadyConsumed {
        /// Credit identifier
        credit_id: Uuid,
    },

    /// Nothing left to spend for the requested area
    #[error(
        "No credits available{}",
        .area.map_or_else(String::new, |a| format!(" for {} reports", a.as_str()))
    )]
    NoCreditsAvailable {
        /// Requested area, if any
        area: Option<ReportArea>,
    },
}

impl Error {
    /// Whether the caller can recover without operator intervention.
    ///
    /// Storage and configuration failures are the only non-recoverable kinds; a
    /// storage failure may still succeed if the caller retries later.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Config { .. })
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
