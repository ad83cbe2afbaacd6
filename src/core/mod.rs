//! Core business logic - framework-agnostic purchase recording, credit queries and
//! consumption. [`ledger::Ledger`] is the entry point; the submodules hold the
//! storage functions it composes.

/// Credit queries and atomic consumption
pub mod credit;
/// The ledger service
pub mod ledger;
/// Purchase record creation, restore stamping and deletion
pub mod purchase;

pub use ledger::{Ledger, NewPurchase, PurchaseOutcome, StoreEvent};
