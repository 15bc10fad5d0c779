use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::material::MaterialId;
use crate::domain::review::ReviewItemId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceHistoryId(pub String);

impl fmt::Display for PriceHistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a price-history record originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Seeded from the master price book.
    Master,
    /// Committed from a reviewed email extraction.
    Gmail,
    /// Appended when a quote was saved by hand.
    Manual,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Gmail => "gmail",
            Self::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "master" => Some(Self::Master),
            "gmail" => Some(Self::Gmail),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// One entry in the append-only quoted-price log.
///
/// Records are never mutated; a correction appends a new record with
/// `corrected` set and keeps the original in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryRecord {
    pub id: PriceHistoryId,
    pub material_id: MaterialId,
    /// Absent on records that predate client attribution.
    pub client_id: Option<ClientId>,
    pub quantity: Decimal,
    pub unit: String,
    pub rate_per_unit: Decimal,
    pub ex_works_location: Option<String>,
    pub source: PriceSource,
    pub corrected: bool,
    pub review_item_id: Option<ReviewItemId>,
    pub quoted_at: DateTime<Utc>,
}
