//! Report area - the category a credit may pay for.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Category tag stored as text on each credit.
///
/// `Universal` credits can pay for a report in any area.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ReportArea {
    /// General life overview
    #[sea_orm(string_value = "general")]
    General,
    /// Career and vocation
    #[sea_orm(string_value = "career")]
    Career,
    /// Relationships and compatibility
    #[sea_orm(string_value = "relationships")]
    Relationships,
    /// Money and finances
    #[sea_orm(string_value = "finances")]
    Finances,
    /// Health and wellbeing
    #[sea_orm(string_value = "health")]
    Health,
    /// Any area
    #[sea_orm(string_value = "universal")]
    Universal,
}

impl ReportArea {
    /// The text stored in the database for this area.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Career => "career",
            Self::Relationships => "relationships",
            Self::Finances => "finances",
            Self::Health => "health",
            Self::Universal => "universal",
        }
    }
}

/// Returned when a string names no known report area.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown report area '{0}'")]
pub struct UnknownReportArea(pub String);

impl FromStr for ReportArea {
    type Err = UnknownReportArea;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "career" => Ok(Self::Career),
            "relationships" => Ok(Self::Relationships),
            "finances" => Ok(Self::Finances),
            "health" => Ok(Self::Health),
            "universal" | "any" => Ok(Self::Universal),
            _ => Err(UnknownReportArea(s.to_string())),
        }
    }
}
