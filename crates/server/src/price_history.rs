//! Price-history HTTP surface and the resolver service behind it.
//!
//! Endpoints:
//! - `GET /price-history/material/{material_id}?clientId=&limit=` — ranked
//!   history plus the suggestion
//! - `GET /price-history/latest/{material_id}?clientId=` — suggestion only
//!
//! Resolution is a pure read: client affinity first, then recency, ties
//! broken by record id. An empty history is a defined "no suggestion"
//! outcome, never an error.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use requote_core::domain::client::ClientId;
use requote_core::domain::material::MaterialId;
use requote_core::errors::CoreError;
use requote_core::pricing::{select_suggestion, PriceResolution, PriceSuggestion};
use requote_db::repositories::{
    ClientRepository, MaterialRepository, PriceHistoryRepository, SqlClientRepository,
    SqlMaterialRepository, SqlPriceHistoryRepository,
};
use requote_db::DbPool;

use crate::errors::ApiError;

/// Selects the most relevant historical price for a material, optionally
/// scoped to a client.
#[derive(Clone)]
pub struct PriceResolver {
    materials: Arc<dyn MaterialRepository>,
    clients: Arc<dyn ClientRepository>,
    history: Arc<dyn PriceHistoryRepository>,
    default_limit: u32,
}

impl PriceResolver {
    pub fn new(
        materials: Arc<dyn MaterialRepository>,
        clients: Arc<dyn ClientRepository>,
        history: Arc<dyn PriceHistoryRepository>,
        default_limit: u32,
    ) -> Self {
        Self { materials, clients, history, default_limit }
    }

    pub fn from_pool(db_pool: DbPool, default_limit: u32) -> Self {
        Self::new(
            Arc::new(SqlMaterialRepository::new(db_pool.clone())),
            Arc::new(SqlClientRepository::new(db_pool.clone())),
            Arc::new(SqlPriceHistoryRepository::new(db_pool)),
            default_limit,
        )
    }

    /// Ranked history and suggestion for one material. `NotFound` only when
    /// the material itself is unknown; empty history resolves to no
    /// suggestion.
    pub async fn resolve(
        &self,
        material_id: &MaterialId,
        client_id: Option<&ClientId>,
        limit: Option<u32>,
    ) -> Result<PriceResolution, ApiError> {
        if self.materials.find_by_id(material_id).await?.is_none() {
            return Err(ApiError::Core(CoreError::not_found("material", &material_id.0)));
        }

        let limit = limit.unwrap_or(self.default_limit);
        let history = self.history.list_for_material(material_id, limit).await?;

        let client_match = match client_id {
            Some(client_id) => self.history.latest_for_client(material_id, client_id).await?,
            None => None,
        };

        let mut suggestion = select_suggestion(&history, client_match.as_ref());
        if let Some(suggestion) = suggestion.as_mut() {
            suggestion.client_name = self.client_name(suggestion.client_id.as_ref()).await?;
        }

        Ok(PriceResolution { suggestion, history })
    }

    async fn client_name(&self, client_id: Option<&ClientId>) -> Result<Option<String>, ApiError> {
        let Some(client_id) = client_id else {
            return Ok(None);
        };
        Ok(self.clients.find_by_id(client_id).await?.map(|client| client.name))
    }
}

#[derive(Clone)]
pub struct PriceHistoryState {
    resolver: PriceResolver,
}

pub fn router(db_pool: DbPool, default_limit: u32) -> Router {
    router_with_resolver(PriceResolver::from_pool(db_pool, default_limit))
}

pub fn router_with_resolver(resolver: PriceResolver) -> Router {
    Router::new()
        .route("/price-history/material/{material_id}", get(material_history))
        .route("/price-history/latest/{material_id}", get(latest_price))
        .with_state(PriceHistoryState { resolver })
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveQuery {
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub material_id: String,
    pub suggestion: Option<PriceSuggestion>,
    pub history: Vec<requote_core::domain::price::PriceHistoryRecord>,
}

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub suggestion: Option<PriceSuggestion>,
}

fn client_id_from_query(query: &ResolveQuery) -> Option<ClientId> {
    query
        .client_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| ClientId(value.to_string()))
}

pub async fn material_history(
    State(state): State<PriceHistoryState>,
    Path(material_id): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let material_id = MaterialId(material_id);
    let client_id = client_id_from_query(&query);

    let resolution =
        state.resolver.resolve(&material_id, client_id.as_ref(), query.limit).await?;

    Ok(Json(ResolveResponse {
        material_id: material_id.0,
        suggestion: resolution.suggestion,
        history: resolution.history,
    }))
}

pub async fn latest_price(
    State(state): State<PriceHistoryState>,
    Path(material_id): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<LatestResponse>, ApiError> {
    let material_id = MaterialId(material_id);
    let client_id = client_id_from_query(&query);

    let resolution = state.resolver.resolve(&material_id, client_id.as_ref(), Some(1)).await?;
    Ok(Json(LatestResponse { suggestion: resolution.suggestion }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;

    use requote_core::domain::client::{Client, ClientId};
    use requote_core::domain::material::{Material, MaterialId};
    use requote_core::domain::price::{PriceHistoryId, PriceHistoryRecord, PriceSource};
    use requote_core::errors::CoreError;
    use requote_db::repositories::{
        ClientRepository, InMemoryClientRepository, InMemoryMaterialRepository,
        InMemoryPriceHistoryRepository, MaterialRepository, PriceHistoryRepository,
    };

    use crate::errors::ApiError;

    use super::PriceResolver;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).single().expect("timestamp")
    }

    async fn resolver_with_history(
        records: Vec<PriceHistoryRecord>,
    ) -> (PriceResolver, Arc<InMemoryPriceHistoryRepository>) {
        let materials = Arc::new(InMemoryMaterialRepository::default());
        materials
            .save(Material {
                id: MaterialId("MAT-M".to_string()),
                name: "MS Angle 50x50x6".to_string(),
                hsn_code: Some("7216".to_string()),
                unit: "MT".to_string(),
                created_at: ts(0),
            })
            .await
            .expect("save material");

        let clients = Arc::new(InMemoryClientRepository::default());
        for (id, name) in [("CL-A", "Client A"), ("CL-B", "Client B")] {
            clients
                .save(Client {
                    id: ClientId(id.to_string()),
                    name: name.to_string(),
                    email: None,
                    created_at: ts(0),
                })
                .await
                .expect("save client");
        }

        let history = Arc::new(InMemoryPriceHistoryRepository::default());
        for record in records {
            history.append(record).await.expect("append record");
        }

        (PriceResolver::new(materials, clients, history.clone(), 20), history)
    }

    fn record(id: &str, client: Option<&str>, rate: i64, hour: u32) -> PriceHistoryRecord {
        PriceHistoryRecord {
            id: PriceHistoryId(id.to_string()),
            material_id: MaterialId("MAT-M".to_string()),
            client_id: client.map(|value| ClientId(value.to_string())),
            quantity: Decimal::new(10, 0),
            unit: "MT".to_string(),
            rate_per_unit: Decimal::new(rate, 0),
            ex_works_location: None,
            source: PriceSource::Gmail,
            corrected: false,
            review_item_id: None,
            quoted_at: ts(hour),
        }
    }

    #[tokio::test]
    async fn client_affinity_wins_over_recency() {
        let (resolver, _history) = resolver_with_history(vec![
            record("ph-1", Some("CL-A"), 100, 1),
            record("ph-2", Some("CL-B"), 120, 2),
        ])
        .await;

        let with_client = resolver
            .resolve(&MaterialId("MAT-M".to_string()), Some(&ClientId("CL-A".to_string())), None)
            .await
            .expect("resolve");
        let suggestion = with_client.suggestion.expect("suggestion exists");
        assert_eq!(suggestion.rate_per_unit, Decimal::new(100, 0));
        assert!(suggestion.client_specific);
        assert_eq!(suggestion.client_name.as_deref(), Some("Client A"));

        let without_client = resolver
            .resolve(&MaterialId("MAT-M".to_string()), None, None)
            .await
            .expect("resolve");
        let suggestion = without_client.suggestion.expect("suggestion exists");
        assert_eq!(suggestion.rate_per_unit, Decimal::new(120, 0));
        assert!(!suggestion.client_specific);
        assert_eq!(suggestion.client_name.as_deref(), Some("Client B"));
    }

    #[tokio::test]
    async fn unknown_client_falls_back_to_general_history() {
        let (resolver, _history) =
            resolver_with_history(vec![record("ph-1", Some("CL-A"), 100, 1)]).await;

        let resolution = resolver
            .resolve(&MaterialId("MAT-M".to_string()), Some(&ClientId("CL-X".to_string())), None)
            .await
            .expect("resolve");
        let suggestion = resolution.suggestion.expect("falls back to history head");
        assert!(!suggestion.client_specific);
        assert_eq!(suggestion.rate_per_unit, Decimal::new(100, 0));
    }

    #[tokio::test]
    async fn empty_history_is_no_suggestion_not_an_error() {
        let (resolver, _history) = resolver_with_history(Vec::new()).await;

        let resolution = resolver
            .resolve(&MaterialId("MAT-M".to_string()), None, None)
            .await
            .expect("resolution succeeds");
        assert!(resolution.suggestion.is_none());
        assert!(resolution.history.is_empty());
    }

    #[tokio::test]
    async fn unknown_material_is_not_found() {
        let (resolver, _history) = resolver_with_history(Vec::new()).await;

        let error = resolver
            .resolve(&MaterialId("MAT-UNKNOWN".to_string()), None, None)
            .await
            .expect_err("material must exist");
        assert!(matches!(error, ApiError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn explicit_limit_bounds_history_depth() {
        let (resolver, _history) = resolver_with_history(vec![
            record("ph-1", None, 100, 1),
            record("ph-2", None, 110, 2),
            record("ph-3", None, 120, 3),
        ])
        .await;

        let resolution = resolver
            .resolve(&MaterialId("MAT-M".to_string()), None, Some(2))
            .await
            .expect("resolve");
        assert_eq!(resolution.history.len(), 2);
        assert_eq!(resolution.history[0].id.0, "ph-3");
    }
}
