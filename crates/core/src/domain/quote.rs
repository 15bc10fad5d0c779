use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::material::MaterialId;
use crate::errors::{ValidationError, ValidationIssue};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteLineId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteLineItem {
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit: String,
    pub rate_per_unit: Decimal,
    /// Monetary ex-works charge added to the line amount.
    pub ex_works: Decimal,
    pub delivery_terms: Option<String>,
}

impl QuoteLineItem {
    pub fn amount(&self) -> Decimal {
        self.quantity * self.rate_per_unit + self.ex_works
    }
}

/// A priced document composed from line items. The total is derived; the
/// persisted value is never trusted on read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub client_id: ClientId,
    pub line_items: Vec<QuoteLineItem>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    /// Sum of `(quantity x rate_per_unit) + ex_works` across all lines.
    pub fn compute_total(lines: &[QuoteLineItem]) -> Decimal {
        lines.iter().map(QuoteLineItem::amount).sum()
    }

    /// Validate every line, collecting all offending line indices rather
    /// than stopping at the first.
    pub fn validate_lines(lines: &[QuoteLineItem]) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if lines.is_empty() {
            issues.push(ValidationIssue::field("items", "quote must contain at least one line"));
        }
        for (index, line) in lines.iter().enumerate() {
            if line.material_id.0.trim().is_empty() {
                issues.push(ValidationIssue::line(
                    "material_id",
                    index,
                    "line must reference a material",
                ));
            }
            if line.quantity <= Decimal::ZERO {
                issues.push(ValidationIssue::line("quantity", index, "quantity must be positive"));
            }
            if line.rate_per_unit <= Decimal::ZERO {
                issues.push(ValidationIssue::line(
                    "rate_per_unit",
                    index,
                    "rate per unit must be positive",
                ));
            }
            if line.ex_works < Decimal::ZERO {
                issues.push(ValidationIssue::line(
                    "ex_works",
                    index,
                    "ex-works charge must not be negative",
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }
}
