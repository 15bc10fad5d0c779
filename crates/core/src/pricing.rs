//! Price-resolution selection rules.
//!
//! The db layer fetches ranked history (most recent first, ties broken by
//! record id); this module picks the suggestion and attaches the provenance
//! the UI needs to explain "why this price". Resolution is a pure read.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::price::{PriceHistoryId, PriceHistoryRecord, PriceSource};

/// A suggested rate plus the provenance of the record it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSuggestion {
    pub record_id: PriceHistoryId,
    pub rate_per_unit: Decimal,
    pub source: PriceSource,
    pub corrected: bool,
    pub quoted_at: DateTime<Utc>,
    pub client_id: Option<ClientId>,
    /// Display name of the originating client, filled in by the resolver
    /// service when the record carries a client id.
    pub client_name: Option<String>,
    /// True when the record matched the requested client rather than the
    /// general history.
    pub client_specific: bool,
}

impl PriceSuggestion {
    pub fn from_record(record: &PriceHistoryRecord, client_specific: bool) -> Self {
        Self {
            record_id: record.id.clone(),
            rate_per_unit: record.rate_per_unit,
            source: record.source,
            corrected: record.corrected,
            quoted_at: record.quoted_at,
            client_id: record.client_id.clone(),
            client_name: None,
            client_specific,
        }
    }
}

/// Ranked history plus the single suggestion, if any.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceResolution {
    pub suggestion: Option<PriceSuggestion>,
    pub history: Vec<PriceHistoryRecord>,
}

/// Pick the suggestion: the client-specific record when one exists (client
/// affinity beats recency), otherwise the most recent record overall,
/// otherwise none. "None" is a defined outcome, not a failure.
pub fn select_suggestion(
    history: &[PriceHistoryRecord],
    client_match: Option<&PriceHistoryRecord>,
) -> Option<PriceSuggestion> {
    if let Some(record) = client_match {
        return Some(PriceSuggestion::from_record(record, true));
    }
    history.first().map(|record| PriceSuggestion::from_record(record, false))
}
