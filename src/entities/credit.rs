//! Credit entity - One consumable unit of report-generation entitlement.
//!
//! Credits are minted in a batch alongside their purchase record and flip to
//! consumed exactly once. `consumed`, `consumed_date` and `user_profile_id` move
//! together: either all three are unset or all three are set.
use super::report_area::ReportArea;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Credit database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credits")]
pub struct Model {
    /// Unique identifier for the credit
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Record that granted this credit
    pub purchase_record_id: Uuid,
    /// Report area this credit may pay for
    pub report_area: ReportArea,
    /// Copied from the owning record; drives first-in-first-used ordering
    pub purchase_date: DateTimeUtc,
    /// Whether the credit has been spent
    pub consumed: bool,
    /// When the credit was spent
    pub consumed_date: Option<DateTimeUtc>,
    /// Position of the credit within its purchase, starting at 0
    pub sequence: i32,
    /// Per-credit transaction identifier, `"{store transaction id}#{index}"`
    #[sea_orm(unique)]
    pub transaction_id: String,
    /// Profile the credit was spent on
    pub user_profile_id: Option<Uuid>,
}

impl Model {
    /// Whether this credit can pay for a report in `area`.
    #[must_use]
    pub fn covers(&self, area: ReportArea) -> bool {
        self.report_area == area || self.report_area == ReportArea::Universal
    }
}

/// Defines relationships between Credit and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each credit belongs to one purchase record
    #[sea_orm(
        belongs_to = "super::purchase_record::Entity",
        from = "Column::PurchaseRecordId",
        to = "super::purchase_record::Column::Id",
        on_delete = "Cascade"
    )]
    PurchaseRecord,
}

impl Related<super::purchase_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
