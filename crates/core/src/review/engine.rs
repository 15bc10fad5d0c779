//! Review-queue decision engine.
//!
//! Pure state-machine logic: given a loaded item and a decision, compute the
//! updated item plus the reference-data commit the store must apply
//! atomically. Persistence and the conditional-update guard live in the db
//! layer; this module never performs I/O.

use chrono::{DateTime, Utc};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::price::PriceSource;
use crate::domain::review::{
    CandidateClient, CandidateLineItem, ExtractionPayload, PayloadCorrections, ReviewItem,
    ReviewItemId, ReviewStatus,
};
use crate::errors::CoreError;

/// A human reviewer's disposition of one pending item.
#[derive(Clone, Debug, PartialEq)]
pub enum ReviewDecision {
    Approve,
    Reject,
    Correct(PayloadCorrections),
}

impl ReviewDecision {
    pub fn target_status(&self) -> ReviewStatus {
        match self {
            Self::Approve => ReviewStatus::Approved,
            Self::Reject => ReviewStatus::Rejected,
            Self::Correct(_) => ReviewStatus::Corrected,
        }
    }
}

/// Reference-data writes the store must apply in the same atomic unit as
/// the status transition: create-or-reuse the client and each material,
/// then append one price-history record per line item.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceCommit {
    pub review_item_id: ReviewItemId,
    pub client: CandidateClient,
    pub items: Vec<CandidateLineItem>,
    pub source: PriceSource,
    pub corrected: bool,
    /// Timestamp stamped onto the appended price records; the moment the
    /// quotation was received, not the moment it was reviewed.
    pub quoted_at: DateTime<Utc>,
}

/// The computed result of a decision: the item as it must be persisted and
/// the commit to perform alongside, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionOutcome {
    pub item: ReviewItem,
    pub commit: Option<ReferenceCommit>,
}

#[derive(Clone, Debug, Default)]
pub struct ReviewQueueEngine;

impl ReviewQueueEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply a decision to a loaded item.
    ///
    /// Fails with `InvalidStateTransition` when the item is not pending and
    /// with `ValidationError` when a correction overlay produces a payload
    /// that fails the same shape checks as a fresh extraction. Confidence is
    /// advisory and never consulted here.
    pub fn decide(
        &self,
        item: &ReviewItem,
        decision: ReviewDecision,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, CoreError> {
        let target = decision.target_status();
        if !item.can_transition_to(target) {
            return Err(CoreError::InvalidStateTransition { from: item.status, attempted: target });
        }

        let payload = match &decision {
            ReviewDecision::Approve | ReviewDecision::Reject => item.payload.clone(),
            ReviewDecision::Correct(corrections) => {
                let merged = item.payload.merged_with(corrections);
                merged.validate()?;
                merged
            }
        };

        let commit = match &decision {
            ReviewDecision::Reject => None,
            ReviewDecision::Approve | ReviewDecision::Correct(_) => Some(ReferenceCommit {
                review_item_id: item.id.clone(),
                client: payload.client.clone(),
                items: payload.items.clone(),
                source: PriceSource::Gmail,
                corrected: matches!(decision, ReviewDecision::Correct(_)),
                quoted_at: item.received_at,
            }),
        };

        let mut updated = item.clone();
        updated.status = target;
        updated.payload = payload;
        updated.decided_at = Some(now);
        updated.decided_by = Some(actor.to_string());

        Ok(DecisionOutcome { item: updated, commit })
    }

    /// `decide`, emitting an audit event for the applied or rejected
    /// transition.
    pub fn decide_with_audit<S>(
        &self,
        item: &ReviewItem,
        decision: ReviewDecision,
        actor: &str,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<DecisionOutcome, CoreError>
    where
        S: AuditSink,
    {
        let attempted = decision.target_status();
        let result = self.decide(item, decision, actor, now);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        Some(item.id.clone()),
                        audit.correlation_id.clone(),
                        "review.transition_applied",
                        AuditCategory::Review,
                        actor,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", ReviewStatus::Pending.as_str())
                    .with_metadata("to", outcome.item.status.as_str())
                    .with_metadata("commit", if outcome.commit.is_some() { "yes" } else { "no" }),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        Some(item.id.clone()),
                        audit.correlation_id.clone(),
                        "review.transition_rejected",
                        AuditCategory::Review,
                        actor,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("attempted", attempted.as_str())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    /// Validate and wrap a fresh extraction payload as a pending item. The
    /// boundary check here is what makes later `approve` commits safe to
    /// apply verbatim.
    #[allow(clippy::too_many_arguments)]
    pub fn ingest(
        &self,
        id: ReviewItemId,
        source_message_id: impl Into<String>,
        thread_id: impl Into<String>,
        subject: impl Into<String>,
        sender_address: impl Into<String>,
        received_at: DateTime<Utc>,
        extraction_method: crate::domain::review::ExtractionMethod,
        confidence: f64,
        payload: ExtractionPayload,
        now: DateTime<Utc>,
    ) -> Result<ReviewItem, CoreError> {
        payload.validate()?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(CoreError::Validation(crate::errors::ValidationError::new(vec![
                crate::errors::ValidationIssue::field(
                    "confidence",
                    "confidence must lie within [0, 1]",
                ),
            ])));
        }

        Ok(ReviewItem {
            id,
            source_message_id: source_message_id.into(),
            thread_id: thread_id.into(),
            subject: subject.into(),
            sender_address: sender_address.into(),
            received_at,
            extraction_method,
            confidence,
            payload,
            status: ReviewStatus::Pending,
            created_at: now,
            decided_at: None,
            decided_by: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use crate::audit::{AuditContext, AuditOutcome, InMemoryAuditSink};
    use crate::domain::price::PriceSource;
    use crate::domain::review::{
        CandidateClient, CandidateLineItem, ExtractionMethod, ExtractionPayload,
        PayloadCorrections, ReviewItem, ReviewItemId, ReviewStatus,
    };
    use crate::errors::CoreError;

    use super::{ReviewDecision, ReviewQueueEngine};

    fn two_line_payload() -> ExtractionPayload {
        ExtractionPayload {
            client: CandidateClient {
                name: "Sharma Steels".to_string(),
                email: Some("purchase@sharmasteels.example".to_string()),
            },
            items: vec![
                CandidateLineItem {
                    material_name: "MS Angle 50x50x6".to_string(),
                    hsn_code: Some("7216".to_string()),
                    quantity: Decimal::new(12, 0),
                    unit: "MT".to_string(),
                    rate_per_unit: Decimal::new(54_500, 0),
                    ex_works_terms: Some("ex-works Raipur".to_string()),
                    confidence: 0.92,
                },
                CandidateLineItem {
                    material_name: "TMT Bar 12mm".to_string(),
                    hsn_code: Some("7214".to_string()),
                    quantity: Decimal::new(20, 0),
                    unit: "MT".to_string(),
                    rate_per_unit: Decimal::new(48_900, 0),
                    ex_works_terms: None,
                    confidence: 0.81,
                },
            ],
        }
    }

    fn pending_item() -> ReviewItem {
        ReviewItem {
            id: ReviewItemId("RI-42".to_string()),
            source_message_id: "msg-42".to_string(),
            thread_id: "thread-9".to_string(),
            subject: "RFQ structural steel".to_string(),
            sender_address: "purchase@sharmasteels.example".to_string(),
            received_at: Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).single().expect("timestamp"),
            extraction_method: ExtractionMethod::ModelBased,
            confidence: 0.87,
            payload: two_line_payload(),
            status: ReviewStatus::Pending,
            created_at: Utc.with_ymd_and_hms(2026, 3, 10, 9, 31, 0).single().expect("timestamp"),
            decided_at: None,
            decided_by: None,
        }
    }

    #[test]
    fn approve_commits_payload_verbatim_with_gmail_source() {
        let engine = ReviewQueueEngine::new();
        let item = pending_item();
        let now = Utc::now();

        let outcome =
            engine.decide(&item, ReviewDecision::Approve, "admin-1", now).expect("approve");

        assert_eq!(outcome.item.status, ReviewStatus::Approved);
        assert_eq!(outcome.item.decided_at, Some(now));
        assert_eq!(outcome.item.decided_by.as_deref(), Some("admin-1"));
        assert_eq!(outcome.item.payload, item.payload);

        let commit = outcome.commit.expect("approve carries a commit");
        assert_eq!(commit.source, PriceSource::Gmail);
        assert!(!commit.corrected);
        assert_eq!(commit.items.len(), 2);
        assert_eq!(commit.quoted_at, item.received_at);
    }

    #[test]
    fn reject_has_no_reference_data_side_effect() {
        let engine = ReviewQueueEngine::new();
        let outcome = engine
            .decide(&pending_item(), ReviewDecision::Reject, "admin-1", Utc::now())
            .expect("reject");

        assert_eq!(outcome.item.status, ReviewStatus::Rejected);
        assert!(outcome.commit.is_none());
    }

    #[test]
    fn correct_merges_overlay_and_tags_commit_as_corrected() {
        let engine = ReviewQueueEngine::new();
        let item = pending_item();

        let mut corrected_items = item.payload.items.clone();
        corrected_items[1].rate_per_unit = Decimal::new(49_400, 0);

        let outcome = engine
            .decide(
                &item,
                ReviewDecision::Correct(PayloadCorrections {
                    client: None,
                    items: Some(corrected_items.clone()),
                }),
                "admin-2",
                Utc::now(),
            )
            .expect("correct");

        assert_eq!(outcome.item.status, ReviewStatus::Corrected);
        assert_eq!(outcome.item.payload.items, corrected_items);

        let commit = outcome.commit.expect("correct carries a commit");
        assert!(commit.corrected);
        assert_eq!(commit.source, PriceSource::Gmail);
        // one record per (corrected) line item
        assert_eq!(commit.items.len(), 2);
        assert_eq!(commit.items[1].rate_per_unit, Decimal::new(49_400, 0));
    }

    #[test]
    fn correct_rejects_overlay_that_breaks_shape_checks() {
        let engine = ReviewQueueEngine::new();
        let item = pending_item();

        let error = engine
            .decide(
                &item,
                ReviewDecision::Correct(PayloadCorrections {
                    client: None,
                    items: Some(vec![CandidateLineItem {
                        material_name: String::new(),
                        hsn_code: None,
                        quantity: Decimal::ZERO,
                        unit: "MT".to_string(),
                        rate_per_unit: Decimal::new(50_000, 0),
                        ex_works_terms: None,
                        confidence: 0.5,
                    }]),
                }),
                "admin-2",
                Utc::now(),
            )
            .expect_err("merged payload is invalid");

        match error {
            CoreError::Validation(validation) => {
                assert_eq!(validation.line_indices(), vec![0]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn terminal_items_reject_every_further_decision() {
        let engine = ReviewQueueEngine::new();
        let mut item = pending_item();
        item.status = ReviewStatus::Approved;

        for decision in [
            ReviewDecision::Approve,
            ReviewDecision::Reject,
            ReviewDecision::Correct(PayloadCorrections::default()),
        ] {
            let error = engine
                .decide(&item, decision, "admin-1", Utc::now())
                .expect_err("terminal item must not transition");
            assert!(matches!(
                error,
                CoreError::InvalidStateTransition { from: ReviewStatus::Approved, .. }
            ));
        }
    }

    #[test]
    fn audit_sink_records_applied_and_rejected_transitions() {
        let engine = ReviewQueueEngine::new();
        let sink = InMemoryAuditSink::default();
        let context = AuditContext::new(Some(ReviewItemId("RI-42".to_string())), "corr-1", "admin-1");

        let item = pending_item();
        engine
            .decide_with_audit(&item, ReviewDecision::Approve, "admin-1", Utc::now(), &sink, &context)
            .expect("approve");

        let mut terminal = item.clone();
        terminal.status = ReviewStatus::Approved;
        let _ = engine.decide_with_audit(
            &terminal,
            ReviewDecision::Reject,
            "admin-1",
            Utc::now(),
            &sink,
            &context,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "review.transition_applied");
        assert_eq!(events[0].outcome, AuditOutcome::Success);
        assert_eq!(events[1].event_type, "review.transition_rejected");
        assert_eq!(events[1].outcome, AuditOutcome::Rejected);
    }

    #[test]
    fn ingest_applies_boundary_validation() {
        let engine = ReviewQueueEngine::new();
        let mut payload = two_line_payload();
        payload.items[0].rate_per_unit = Decimal::ZERO;

        let error = engine
            .ingest(
                ReviewItemId("RI-43".to_string()),
                "msg-43",
                "thread-9",
                "RFQ",
                "sender@example.com",
                Utc::now(),
                ExtractionMethod::RuleBased,
                0.7,
                payload,
                Utc::now(),
            )
            .expect_err("invalid payload must not enter the store");
        assert!(matches!(error, CoreError::Validation(_)));
    }

    #[test]
    fn ingest_rejects_out_of_range_confidence() {
        let engine = ReviewQueueEngine::new();
        let error = engine
            .ingest(
                ReviewItemId("RI-44".to_string()),
                "msg-44",
                "thread-9",
                "RFQ",
                "sender@example.com",
                Utc::now(),
                ExtractionMethod::ModelBased,
                1.4,
                two_line_payload(),
                Utc::now(),
            )
            .expect_err("confidence above 1 is invalid");
        assert!(matches!(error, CoreError::Validation(_)));
    }
}
