//! Quote assembly HTTP surface.
//!
//! `POST /quotes` composes caller-supplied line items into a priced
//! document: rates left blank are pre-filled from price resolution (never
//! overriding an explicit rate), the total is recomputed server-side, and
//! the save appends one manual price-history record per line so the quote
//! immediately feeds future resolutions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use requote_core::domain::client::ClientId;
use requote_core::domain::material::MaterialId;
use requote_core::domain::quote::{Quote, QuoteId, QuoteLineItem};
use requote_core::errors::{CoreError, ValidationError, ValidationIssue};
use requote_db::repositories::{
    ClientRepository, MaterialRepository, QuoteRepository, SqlClientRepository,
    SqlMaterialRepository, SqlQuoteRepository,
};
use requote_db::DbPool;

use crate::errors::{require_actor, ApiError};
use crate::price_history::PriceResolver;

#[derive(Clone)]
pub struct QuotesState {
    quotes: Arc<dyn QuoteRepository>,
    clients: Arc<dyn ClientRepository>,
    materials: Arc<dyn MaterialRepository>,
    resolver: PriceResolver,
}

impl QuotesState {
    pub fn new(
        quotes: Arc<dyn QuoteRepository>,
        clients: Arc<dyn ClientRepository>,
        materials: Arc<dyn MaterialRepository>,
        resolver: PriceResolver,
    ) -> Self {
        Self { quotes, clients, materials, resolver }
    }
}

pub fn router(db_pool: DbPool, default_limit: u32) -> Router {
    let state = QuotesState::new(
        Arc::new(SqlQuoteRepository::new(db_pool.clone())),
        Arc::new(SqlClientRepository::new(db_pool.clone())),
        Arc::new(SqlMaterialRepository::new(db_pool.clone())),
        PriceResolver::from_pool(db_pool, default_limit),
    );
    router_with_state(state)
}

pub fn router_with_state(state: QuotesState) -> Router {
    Router::new()
        .route("/quotes", post(create_quote))
        .route("/quotes/{id}", get(get_quote))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct QuoteLineRequest {
    #[serde(rename = "materialId")]
    pub material_id: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    /// Absent means "pre-fill from price resolution"; an explicit value is
    /// never overridden.
    #[serde(rename = "ratePerUnit")]
    pub rate_per_unit: Option<Decimal>,
    #[serde(rename = "exWorks")]
    pub ex_works: Option<Decimal>,
    #[serde(rename = "deliveryTerms")]
    pub delivery_terms: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuoteRequest {
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub items: Vec<QuoteLineRequest>,
}

#[derive(Debug, Serialize)]
pub struct QuoteLineResponse {
    #[serde(rename = "materialId")]
    pub material_id: String,
    pub quantity: Decimal,
    pub unit: String,
    #[serde(rename = "ratePerUnit")]
    pub rate_per_unit: Decimal,
    #[serde(rename = "exWorks")]
    pub ex_works: Decimal,
    #[serde(rename = "deliveryTerms")]
    pub delivery_terms: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub id: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub items: Vec<QuoteLineResponse>,
    #[serde(rename = "totalAmount")]
    pub total_amount: Decimal,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl QuoteResponse {
    fn from_quote(quote: &Quote) -> Self {
        Self {
            id: quote.id.0.clone(),
            client_id: quote.client_id.0.clone(),
            items: quote
                .line_items
                .iter()
                .map(|line| QuoteLineResponse {
                    material_id: line.material_id.0.clone(),
                    quantity: line.quantity,
                    unit: line.unit.clone(),
                    rate_per_unit: line.rate_per_unit,
                    ex_works: line.ex_works,
                    delivery_terms: line.delivery_terms.clone(),
                })
                .collect(),
            total_amount: quote.total_amount,
            created_at: quote.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn create_quote(
    State(state): State<QuotesState>,
    headers: HeaderMap,
    Json(request): Json<CreateQuoteRequest>,
) -> Result<(StatusCode, Json<QuoteResponse>), ApiError> {
    let actor = require_actor(&headers)?;

    let client_id = ClientId(request.client_id.clone());
    if state.clients.find_by_id(&client_id).await?.is_none() {
        return Err(ApiError::Core(CoreError::not_found("client", &request.client_id)));
    }

    let lines = assemble_lines(&state, &client_id, &request.items).await?;
    Quote::validate_lines(&lines)?;

    let quote = Quote {
        id: QuoteId(Uuid::new_v4().to_string()),
        client_id,
        total_amount: Quote::compute_total(&lines),
        line_items: lines,
        created_at: Utc::now(),
    };
    state.quotes.save(quote.clone(), &actor).await?;

    info!(
        event_name = "quote.saved",
        quote_id = %quote.id,
        actor = %actor,
        line_count = quote.line_items.len(),
        total_amount = %quote.total_amount,
        "quote persisted with recomputed total"
    );
    Ok((StatusCode::CREATED, Json(QuoteResponse::from_quote(&quote))))
}

pub async fn get_quote(
    State(state): State<QuotesState>,
    Path(id): Path<String>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let quote = state
        .quotes
        .find_by_id(&QuoteId(id.clone()))
        .await?
        .ok_or_else(|| CoreError::not_found("quote", &id))?;
    Ok(Json(QuoteResponse::from_quote(&quote)))
}

/// Resolve each requested line into a full line item, collecting every
/// offending index: unknown materials and lines with neither an explicit
/// rate nor a resolvable suggestion.
async fn assemble_lines(
    state: &QuotesState,
    client_id: &ClientId,
    items: &[QuoteLineRequest],
) -> Result<Vec<QuoteLineItem>, ApiError> {
    let mut lines = Vec::with_capacity(items.len());
    let mut issues = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let material_id = MaterialId(item.material_id.clone());
        let material = state.materials.find_by_id(&material_id).await?;
        let Some(material) = material else {
            issues.push(ValidationIssue::line(
                "material_id",
                index,
                format!("unknown material `{}`", item.material_id),
            ));
            continue;
        };

        let rate_per_unit = match item.rate_per_unit {
            Some(rate) => rate,
            None => {
                let resolution =
                    state.resolver.resolve(&material_id, Some(client_id), None).await?;
                match resolution.suggestion {
                    Some(suggestion) => suggestion.rate_per_unit,
                    None => {
                        issues.push(ValidationIssue::line(
                            "rate_per_unit",
                            index,
                            "no rate supplied and no price history to suggest one",
                        ));
                        continue;
                    }
                }
            }
        };

        lines.push(QuoteLineItem {
            material_id,
            quantity: item.quantity,
            unit: item.unit.clone().unwrap_or_else(|| material.unit.clone()),
            rate_per_unit,
            ex_works: item.ex_works.unwrap_or(Decimal::ZERO),
            delivery_terms: item.delivery_terms.clone(),
        });
    }

    if issues.is_empty() {
        Ok(lines)
    } else {
        Err(ApiError::Core(CoreError::Validation(ValidationError::new(issues))))
    }
}
