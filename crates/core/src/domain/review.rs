use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationIssue};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewItemId(pub String);

impl fmt::Display for ReviewItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which extraction strategy produced the candidate payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    RuleBased,
    ModelBased,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::ModelBased => "model_based",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rule_based" => Some(Self::RuleBased),
            "model_based" => Some(Self::ModelBased),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Corrected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Corrected => "corrected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "corrected" => Some(Self::Corrected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Candidate client parsed from an inbound message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateClient {
    pub name: String,
    pub email: Option<String>,
}

/// One candidate quotation line parsed from an inbound message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateLineItem {
    pub material_name: String,
    pub hsn_code: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub rate_per_unit: Decimal,
    pub ex_works_terms: Option<String>,
    pub confidence: f64,
}

/// Structured candidate quotation data awaiting a human decision.
///
/// Validated at the boundary where it enters the review-item store so a
/// corrected payload cannot silently drop required fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPayload {
    pub client: CandidateClient,
    pub items: Vec<CandidateLineItem>,
}

impl ExtractionPayload {
    /// Shape checks applied to fresh extractions and to merged corrections
    /// alike. Collects every issue rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.client.name.trim().is_empty() {
            issues.push(ValidationIssue::field("client.name", "client name must not be empty"));
        }
        if self.items.is_empty() {
            issues.push(ValidationIssue::field("items", "payload must contain at least one line item"));
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.material_name.trim().is_empty() {
                issues.push(ValidationIssue::line(
                    "material_name",
                    index,
                    "material name must not be empty",
                ));
            }
            if item.quantity <= Decimal::ZERO {
                issues.push(ValidationIssue::line("quantity", index, "quantity must be positive"));
            }
            if item.rate_per_unit <= Decimal::ZERO {
                issues.push(ValidationIssue::line(
                    "rate_per_unit",
                    index,
                    "rate per unit must be positive",
                ));
            }
            if !(0.0..=1.0).contains(&item.confidence) {
                issues.push(ValidationIssue::line(
                    "confidence",
                    index,
                    "confidence must lie within [0, 1]",
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }

    /// Apply a correction overlay. Field-level replacement: a present item
    /// list replaces the stored list wholesale, never a deep patch.
    pub fn merged_with(&self, corrections: &PayloadCorrections) -> ExtractionPayload {
        ExtractionPayload {
            client: corrections.client.clone().unwrap_or_else(|| self.client.clone()),
            items: corrections.items.clone().unwrap_or_else(|| self.items.clone()),
        }
    }
}

/// Partial overlay supplied with a `correct` decision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadCorrections {
    pub client: Option<CandidateClient>,
    pub items: Option<Vec<CandidateLineItem>>,
}

impl PayloadCorrections {
    pub fn is_empty(&self) -> bool {
        self.client.is_none() && self.items.is_none()
    }
}

/// One pending decision unit wrapping an extraction payload, its original
/// machine confidence, and the review status that drives write permissions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: ReviewItemId,
    pub source_message_id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender_address: String,
    pub received_at: DateTime<Utc>,
    pub extraction_method: ExtractionMethod,
    /// Unedited machine confidence in [0, 1]. Advisory only; never gates a
    /// transition.
    pub confidence: f64,
    pub payload: ExtractionPayload,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

impl ReviewItem {
    pub fn can_transition_to(&self, next: ReviewStatus) -> bool {
        matches!(
            (self.status, next),
            (ReviewStatus::Pending, ReviewStatus::Approved)
                | (ReviewStatus::Pending, ReviewStatus::Rejected)
                | (ReviewStatus::Pending, ReviewStatus::Corrected)
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{
        CandidateClient, CandidateLineItem, ExtractionMethod, ExtractionPayload,
        PayloadCorrections, ReviewItem, ReviewItemId, ReviewStatus,
    };

    fn payload() -> ExtractionPayload {
        ExtractionPayload {
            client: CandidateClient {
                name: "Sharma Steels".to_string(),
                email: Some("purchase@sharmasteels.example".to_string()),
            },
            items: vec![CandidateLineItem {
                material_name: "MS Angle 50x50x6".to_string(),
                hsn_code: Some("7216".to_string()),
                quantity: Decimal::new(12, 0),
                unit: "MT".to_string(),
                rate_per_unit: Decimal::new(54_500, 0),
                ex_works_terms: Some("ex-works Raipur".to_string()),
                confidence: 0.92,
            }],
        }
    }

    fn item(status: ReviewStatus) -> ReviewItem {
        ReviewItem {
            id: ReviewItemId("RI-1".to_string()),
            source_message_id: "msg-100".to_string(),
            thread_id: "thread-7".to_string(),
            subject: "RFQ MS Angle".to_string(),
            sender_address: "purchase@sharmasteels.example".to_string(),
            received_at: Utc::now(),
            extraction_method: ExtractionMethod::ModelBased,
            confidence: 0.88,
            payload: payload(),
            status,
            created_at: Utc::now(),
            decided_at: None,
            decided_by: None,
        }
    }

    #[test]
    fn pending_items_may_reach_every_terminal_state() {
        let item = item(ReviewStatus::Pending);
        assert!(item.can_transition_to(ReviewStatus::Approved));
        assert!(item.can_transition_to(ReviewStatus::Rejected));
        assert!(item.can_transition_to(ReviewStatus::Corrected));
        assert!(!item.can_transition_to(ReviewStatus::Pending));
    }

    #[test]
    fn terminal_items_accept_no_further_transition() {
        for status in [ReviewStatus::Approved, ReviewStatus::Rejected, ReviewStatus::Corrected] {
            let item = item(status);
            assert!(!item.can_transition_to(ReviewStatus::Approved));
            assert!(!item.can_transition_to(ReviewStatus::Rejected));
            assert!(!item.can_transition_to(ReviewStatus::Corrected));
            assert!(!item.can_transition_to(ReviewStatus::Pending));
        }
    }

    #[test]
    fn status_round_trips_through_storage_tags() {
        for status in [
            ReviewStatus::Pending,
            ReviewStatus::Approved,
            ReviewStatus::Rejected,
            ReviewStatus::Corrected,
        ] {
            assert_eq!(ReviewStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReviewStatus::parse("archived"), None);
    }

    #[test]
    fn valid_payload_passes_shape_checks() {
        assert!(payload().validate().is_ok());
    }

    #[test]
    fn validation_collects_every_offending_field() {
        let mut bad = payload();
        bad.items[0].material_name = "  ".to_string();
        bad.items[0].quantity = Decimal::ZERO;
        bad.items[0].rate_per_unit = Decimal::new(-5, 0);

        let error = bad.validate().expect_err("shape checks should fail");
        let fields: Vec<&str> = error.issues.iter().map(|issue| issue.field.as_str()).collect();
        assert_eq!(fields, vec!["material_name", "quantity", "rate_per_unit"]);
        assert!(error.issues.iter().all(|issue| issue.line_index == Some(0)));
    }

    #[test]
    fn empty_item_list_is_rejected() {
        let mut bad = payload();
        bad.items.clear();
        let error = bad.validate().expect_err("empty payload should fail");
        assert_eq!(error.issues.len(), 1);
        assert_eq!(error.issues[0].field, "items");
    }

    #[test]
    fn corrections_replace_item_list_wholesale() {
        let original = payload();
        let replacement = vec![CandidateLineItem {
            material_name: "HR Coil 2mm".to_string(),
            hsn_code: Some("7208".to_string()),
            quantity: Decimal::new(8, 0),
            unit: "MT".to_string(),
            rate_per_unit: Decimal::new(51_200, 0),
            ex_works_terms: None,
            confidence: 1.0,
        }];

        let merged = original.merged_with(&PayloadCorrections {
            client: None,
            items: Some(replacement.clone()),
        });

        assert_eq!(merged.client, original.client);
        assert_eq!(merged.items, replacement);
    }

    #[test]
    fn empty_corrections_leave_payload_untouched() {
        let original = payload();
        let merged = original.merged_with(&PayloadCorrections::default());
        assert_eq!(merged, original);
    }
}
