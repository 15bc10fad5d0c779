//! In-memory repositories for tests and handler-level wiring without a
//! database.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use requote_core::domain::client::{Client, ClientId};
use requote_core::domain::material::{Material, MaterialId};
use requote_core::domain::price::PriceHistoryRecord;
use requote_core::domain::review::{ReviewItem, ReviewItemId, ReviewStatus};
use requote_core::review::engine::{DecisionOutcome, ReferenceCommit};

use super::{
    ClientRepository, MaterialRepository, PriceHistoryRepository, RepositoryError,
    ReviewItemRepository, ReviewQueueFilter,
};

#[derive(Default)]
pub struct InMemoryReviewItemRepository {
    items: RwLock<HashMap<String, ReviewItem>>,
    commits: RwLock<Vec<ReferenceCommit>>,
}

impl InMemoryReviewItemRepository {
    /// Reference commits applied through `commit_decision`, in order.
    pub async fn commits(&self) -> Vec<ReferenceCommit> {
        self.commits.read().await.clone()
    }
}

#[async_trait]
impl ReviewItemRepository for InMemoryReviewItemRepository {
    async fn insert(&self, item: ReviewItem) -> Result<(), RepositoryError> {
        let mut items = self.items.write().await;
        items.insert(item.id.0.clone(), item);
        Ok(())
    }

    async fn find_by_id(&self, id: &ReviewItemId) -> Result<Option<ReviewItem>, RepositoryError> {
        let items = self.items.read().await;
        Ok(items.get(&id.0).cloned())
    }

    async fn list(&self, filter: ReviewQueueFilter) -> Result<Vec<ReviewItem>, RepositoryError> {
        let items = self.items.read().await;
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase);

        let mut matched: Vec<ReviewItem> = items
            .values()
            .filter(|item| filter.status.map_or(true, |status| item.status == status))
            .filter(|item| {
                search.as_deref().map_or(true, |needle| {
                    item.subject.to_lowercase().contains(needle)
                        || item.sender_address.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.received_at.cmp(&a.received_at).then(b.id.0.cmp(&a.id.0)));
        Ok(matched)
    }

    async fn commit_decision(&self, outcome: DecisionOutcome) -> Result<(), RepositoryError> {
        let mut items = self.items.write().await;
        let stored = items
            .get_mut(&outcome.item.id.0)
            .ok_or_else(|| RepositoryError::Conflict(format!(
                "review item {} does not exist",
                outcome.item.id
            )))?;

        // Same guard as the conditional UPDATE in the SQL repository.
        if stored.status != ReviewStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "review item {} is no longer pending",
                outcome.item.id
            )));
        }
        *stored = outcome.item;

        if let Some(commit) = outcome.commit {
            self.commits.write().await.push(commit);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPriceHistoryRepository {
    records: RwLock<Vec<PriceHistoryRecord>>,
}

#[async_trait]
impl PriceHistoryRepository for InMemoryPriceHistoryRepository {
    async fn append(&self, record: PriceHistoryRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }

    async fn list_for_material(
        &self,
        material_id: &MaterialId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matched: Vec<PriceHistoryRecord> =
            records.iter().filter(|record| &record.material_id == material_id).cloned().collect();
        matched.sort_by(|a, b| b.quoted_at.cmp(&a.quoted_at).then(b.id.0.cmp(&a.id.0)));
        matched.truncate(limit.clamp(1, 100) as usize);
        Ok(matched)
    }

    async fn latest_for_client(
        &self,
        material_id: &MaterialId,
        client_id: &ClientId,
    ) -> Result<Option<PriceHistoryRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matched: Vec<&PriceHistoryRecord> = records
            .iter()
            .filter(|record| {
                &record.material_id == material_id
                    && record.client_id.as_ref() == Some(client_id)
            })
            .collect();
        matched.sort_by(|a, b| b.quoted_at.cmp(&a.quoted_at).then(b.id.0.cmp(&a.id.0)));
        Ok(matched.first().map(|record| (*record).clone()))
    }
}

#[derive(Default)]
pub struct InMemoryMaterialRepository {
    materials: RwLock<HashMap<String, Material>>,
}

#[async_trait]
impl MaterialRepository for InMemoryMaterialRepository {
    async fn find_by_id(&self, id: &MaterialId) -> Result<Option<Material>, RepositoryError> {
        let materials = self.materials.read().await;
        Ok(materials.get(&id.0).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Material>, RepositoryError> {
        let materials = self.materials.read().await;
        let needle = name.trim().to_lowercase();
        Ok(materials.values().find(|material| material.name.to_lowercase() == needle).cloned())
    }

    async fn save(&self, material: Material) -> Result<(), RepositoryError> {
        let mut materials = self.materials.write().await;
        materials.insert(material.id.0.clone(), material);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryClientRepository {
    clients: RwLock<HashMap<String, Client>>,
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        let clients = self.clients.read().await;
        Ok(clients.get(&id.0).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Client>, RepositoryError> {
        let clients = self.clients.read().await;
        let needle = name.trim().to_lowercase();
        Ok(clients.values().find(|client| client.name.to_lowercase() == needle).cloned())
    }

    async fn save(&self, client: Client) -> Result<(), RepositoryError> {
        let mut clients = self.clients.write().await;
        clients.insert(client.id.0.clone(), client);
        Ok(())
    }
}
