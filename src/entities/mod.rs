//! Entity module - Contains all SeaORM entity definitions for the ledger database.
//! A purchase record owns the credits it granted; credits point back at their
//! record through a foreign key column.

pub mod credit;
pub mod purchase_record;
pub mod report_area;

// Re-export specific types to avoid conflicts
pub use credit::{Column as CreditColumn, Entity as Credit, Model as CreditModel};
pub use purchase_record::{
    Column as PurchaseRecordColumn, Entity as PurchaseRecord, Model as PurchaseRecordModel,
};
pub use report_area::ReportArea;
