//! Review-queue HTTP surface.
//!
//! Endpoints:
//! - `GET  /review-queue?status=&search=`      — list items (default: pending)
//! - `POST /review-queue`                      — ingest an extraction payload
//! - `POST /review-queue/{id}/approve`         — commit payload verbatim
//! - `POST /review-queue/{id}/reject`          — discard without side effects
//! - `POST /review-queue/{id}/correct`         — merge overlay, then commit

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use requote_core::domain::review::{
    ExtractionMethod, ExtractionPayload, PayloadCorrections, ReviewItem, ReviewItemId,
    ReviewStatus,
};
use requote_core::errors::{CoreError, ValidationError, ValidationIssue};
use requote_core::review::engine::{ReviewDecision, ReviewQueueEngine};
use requote_db::repositories::{
    RepositoryError, ReviewItemRepository, ReviewQueueFilter, SqlReviewItemRepository,
};
use requote_db::DbPool;

use crate::errors::{require_actor, ApiError};

#[derive(Clone)]
pub struct ReviewQueueState {
    repo: Arc<dyn ReviewItemRepository>,
    engine: ReviewQueueEngine,
}

impl ReviewQueueState {
    pub fn new(repo: Arc<dyn ReviewItemRepository>) -> Self {
        Self { repo, engine: ReviewQueueEngine::new() }
    }
}

pub fn router(db_pool: DbPool) -> Router {
    router_with_state(ReviewQueueState::new(Arc::new(SqlReviewItemRepository::new(db_pool))))
}

pub fn router_with_state(state: ReviewQueueState) -> Router {
    Router::new()
        .route("/review-queue", get(list_queue).post(ingest))
        .route("/review-queue/{id}/approve", post(approve))
        .route("/review-queue/{id}/reject", post(reject))
        .route("/review-queue/{id}/correct", post(correct))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQueueQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewItemSummary {
    pub id: String,
    pub subject: String,
    pub sender_address: String,
    pub received_at: DateTime<Utc>,
    pub extraction_method: ExtractionMethod,
    pub confidence: f64,
    pub status: ReviewStatus,
    pub client_name: String,
    pub item_count: usize,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

impl ReviewItemSummary {
    fn from_item(item: &ReviewItem) -> Self {
        Self {
            id: item.id.0.clone(),
            subject: item.subject.clone(),
            sender_address: item.sender_address.clone(),
            received_at: item.received_at,
            extraction_method: item.extraction_method,
            confidence: item.confidence,
            status: item.status,
            client_name: item.payload.client.name.clone(),
            item_count: item.payload.items.len(),
            decided_at: item.decided_at,
            decided_by: item.decided_by.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub source_message_id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender_address: String,
    pub received_at: DateTime<Utc>,
    pub extraction_method: ExtractionMethod,
    pub confidence: f64,
    pub payload: ExtractionPayload,
}

#[derive(Debug, Deserialize)]
pub struct CorrectRequest {
    pub corrections: PayloadCorrections,
}

#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: String,
}

/// `status=` query values: absent or empty means the pending tray, `all`
/// lifts the filter, anything else must parse as a known status.
fn parse_status_filter(raw: Option<&str>) -> Result<Option<ReviewStatus>, ApiError> {
    let normalized = raw.map(str::trim).map(str::to_lowercase);
    match normalized.as_deref() {
        None | Some("") => Ok(Some(ReviewStatus::Pending)),
        Some("all") => Ok(None),
        Some(other) => match ReviewStatus::parse(other) {
            Some(status) => Ok(Some(status)),
            None => Err(ApiError::Core(CoreError::Validation(ValidationError::new(vec![
                ValidationIssue::field("status", format!("unknown review status `{other}`")),
            ])))),
        },
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn list_queue(
    State(state): State<ReviewQueueState>,
    Query(query): Query<ReviewQueueQuery>,
) -> Result<Json<Vec<ReviewItemSummary>>, ApiError> {
    let filter = ReviewQueueFilter {
        status: parse_status_filter(query.status.as_deref())?,
        search: query.search,
    };
    let items = state.repo.list(filter).await?;
    Ok(Json(items.iter().map(ReviewItemSummary::from_item).collect()))
}

pub async fn ingest(
    State(state): State<ReviewQueueState>,
    headers: HeaderMap,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let actor = require_actor(&headers)?;

    let item = state.engine.ingest(
        ReviewItemId(Uuid::new_v4().to_string()),
        request.source_message_id,
        request.thread_id,
        request.subject,
        request.sender_address,
        request.received_at,
        request.extraction_method,
        request.confidence,
        request.payload,
        Utc::now(),
    )?;
    state.repo.insert(item.clone()).await?;

    info!(
        event_name = "review.item_ingested",
        review_item_id = %item.id,
        actor = %actor,
        extraction_method = item.extraction_method.as_str(),
        confidence = item.confidence,
        "extraction payload entered the review queue"
    );
    Ok((StatusCode::CREATED, Json(IdResponse { id: item.id.0 })))
}

pub async fn approve(
    State(state): State<ReviewQueueState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<IdResponse>, ApiError> {
    apply_decision(&state, id, ReviewDecision::Approve, &headers).await
}

pub async fn reject(
    State(state): State<ReviewQueueState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<IdResponse>, ApiError> {
    apply_decision(&state, id, ReviewDecision::Reject, &headers).await
}

pub async fn correct(
    State(state): State<ReviewQueueState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CorrectRequest>,
) -> Result<Json<IdResponse>, ApiError> {
    apply_decision(&state, id, ReviewDecision::Correct(request.corrections), &headers).await
}

async fn apply_decision(
    state: &ReviewQueueState,
    id: String,
    decision: ReviewDecision,
    headers: &HeaderMap,
) -> Result<Json<IdResponse>, ApiError> {
    let actor = require_actor(headers)?;
    let attempted = decision.target_status();
    let item_id = ReviewItemId(id.clone());

    let item = state
        .repo
        .find_by_id(&item_id)
        .await?
        .ok_or_else(|| CoreError::not_found("review item", &id))?;

    let outcome = state.engine.decide(&item, decision, &actor, Utc::now())?;

    match state.repo.commit_decision(outcome).await {
        Ok(()) => {
            info!(
                event_name = "review.decision_applied",
                review_item_id = %item_id,
                actor = %actor,
                status = attempted.as_str(),
                "review decision committed"
            );
            Ok(Json(IdResponse { id }))
        }
        // Lost the conditional update: re-check the current state rather
        // than retrying, so a double-click surfaces as a conflict.
        Err(RepositoryError::Conflict(_)) => {
            let current = state.repo.find_by_id(&item_id).await?;
            match current {
                Some(current) => Err(ApiError::Core(CoreError::InvalidStateTransition {
                    from: current.status,
                    attempted,
                })),
                None => Err(ApiError::Core(CoreError::not_found("review item", &id))),
            }
        }
        Err(other) => Err(other.into()),
    }
}
