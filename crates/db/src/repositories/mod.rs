use async_trait::async_trait;
use thiserror::Error;

use requote_core::domain::client::{Client, ClientId};
use requote_core::domain::material::{Material, MaterialId};
use requote_core::domain::price::PriceHistoryRecord;
use requote_core::domain::quote::{Quote, QuoteId};
use requote_core::domain::review::{ReviewItem, ReviewItemId, ReviewStatus};
use requote_core::review::engine::DecisionOutcome;

pub mod memory;
pub mod price_history;
pub mod quote;
pub mod reference;
pub mod review;

pub use memory::{
    InMemoryClientRepository, InMemoryMaterialRepository, InMemoryPriceHistoryRepository,
    InMemoryReviewItemRepository,
};
pub use price_history::SqlPriceHistoryRepository;
pub use quote::SqlQuoteRepository;
pub use reference::{SqlClientRepository, SqlMaterialRepository};
pub use review::SqlReviewItemRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("transition conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::Unavailable(error.to_string())
            }
            sqlx::Error::Io(_) => Self::Unavailable(error.to_string()),
            other => Self::Database(other),
        }
    }
}

/// Listing filter for the review queue. Defaults to the pending tray.
#[derive(Clone, Debug)]
pub struct ReviewQueueFilter {
    /// `None` lists every status.
    pub status: Option<ReviewStatus>,
    /// Case-insensitive substring match over subject and sender address.
    pub search: Option<String>,
}

impl Default for ReviewQueueFilter {
    fn default() -> Self {
        Self { status: Some(ReviewStatus::Pending), search: None }
    }
}

#[async_trait]
pub trait ReviewItemRepository: Send + Sync {
    async fn insert(&self, item: ReviewItem) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &ReviewItemId) -> Result<Option<ReviewItem>, RepositoryError>;

    /// Ordered by `received_at` descending. Pure read.
    async fn list(&self, filter: ReviewQueueFilter) -> Result<Vec<ReviewItem>, RepositoryError>;

    /// Persist a decision as one atomic unit: the status transition (guarded
    /// by a conditional update on the pending pre-state) together with the
    /// reference-data commit, if any. A lost guard returns
    /// `RepositoryError::Conflict` and leaves no partial state behind.
    async fn commit_decision(&self, outcome: DecisionOutcome) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PriceHistoryRepository: Send + Sync {
    async fn append(&self, record: PriceHistoryRecord) -> Result<(), RepositoryError>;

    /// Up to `limit` records for the material, most recent first, ties
    /// broken by record id descending.
    async fn list_for_material(
        &self,
        material_id: &MaterialId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryRecord>, RepositoryError>;

    /// The single most recent record for (material, client), same ordering.
    async fn latest_for_client(
        &self,
        material_id: &MaterialId,
        client_id: &ClientId,
    ) -> Result<Option<PriceHistoryRecord>, RepositoryError>;
}

#[async_trait]
pub trait MaterialRepository: Send + Sync {
    async fn find_by_id(&self, id: &MaterialId) -> Result<Option<Material>, RepositoryError>;

    /// Case-insensitive lookup, matching the create-or-reuse rule used on
    /// commit.
    async fn find_by_name(&self, name: &str) -> Result<Option<Material>, RepositoryError>;

    async fn save(&self, material: Material) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Client>, RepositoryError>;

    async fn save(&self, client: Client) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Persist the quote, its lines, and one manual price-history record per
    /// line in a single transaction.
    async fn save(&self, quote: Quote, actor: &str) -> Result<(), RepositoryError>;

    /// Read back with the total recomputed from lines, never the stored
    /// column.
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
}
