use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

use requote_core::domain::price::{PriceHistoryId, PriceHistoryRecord};
use requote_core::domain::review::{
    ExtractionMethod, ExtractionPayload, ReviewItem, ReviewItemId, ReviewStatus,
};
use requote_core::review::engine::DecisionOutcome;

use super::price_history::insert_price_record;
use super::reference::{find_or_create_client, find_or_create_material, parse_rfc3339};
use super::{RepositoryError, ReviewItemRepository, ReviewQueueFilter};
use crate::DbPool;

pub struct SqlReviewItemRepository {
    pool: DbPool,
}

impl SqlReviewItemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewItemRepository for SqlReviewItemRepository {
    async fn insert(&self, item: ReviewItem) -> Result<(), RepositoryError> {
        let payload_json = encode_payload(&item.payload)?;

        sqlx::query(
            r#"
            INSERT INTO review_item (
                id, source_message_id, thread_id, subject, sender_address,
                received_at, extraction_method, confidence, payload_json,
                status, created_at, decided_at, decided_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id.0)
        .bind(&item.source_message_id)
        .bind(&item.thread_id)
        .bind(&item.subject)
        .bind(&item.sender_address)
        .bind(item.received_at.to_rfc3339())
        .bind(item.extraction_method.as_str())
        .bind(item.confidence)
        .bind(payload_json)
        .bind(item.status.as_str())
        .bind(item.created_at.to_rfc3339())
        .bind(item.decided_at.map(|value| value.to_rfc3339()))
        .bind(item.decided_by.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ReviewItemId) -> Result<Option<ReviewItem>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                id, source_message_id, thread_id, subject, sender_address,
                received_at, extraction_method, confidence, payload_json,
                status, created_at, decided_at, decided_by
            FROM review_item
            WHERE id = ?
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|value| review_item_from_row(&value)).transpose()
    }

    async fn list(&self, filter: ReviewQueueFilter) -> Result<Vec<ReviewItem>, RepositoryError> {
        let mut builder = QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT id, source_message_id, thread_id, subject, sender_address, \
             received_at, extraction_method, confidence, payload_json, \
             status, created_at, decided_at, decided_by \
             FROM review_item WHERE 1 = 1",
        );

        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        let search = filter.search.as_deref().map(str::trim).filter(|value| !value.is_empty());
        if let Some(search) = search {
            let pattern = format!("%{search}%");
            builder.push(" AND (subject LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" COLLATE NOCASE OR sender_address LIKE ");
            builder.push_bind(pattern);
            builder.push(" COLLATE NOCASE)");
        }
        builder.push(" ORDER BY received_at DESC, id DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(review_item_from_row).collect()
    }

    async fn commit_decision(&self, outcome: DecisionOutcome) -> Result<(), RepositoryError> {
        let item = &outcome.item;
        let payload_json = encode_payload(&item.payload)?;
        let decided_at = item.decided_at.map(|value| value.to_rfc3339());

        let mut tx = self.pool.begin().await?;

        // Conditional update on the pending pre-state: of two concurrent
        // decisions exactly one sees rows_affected == 1.
        let updated = sqlx::query(
            "UPDATE review_item \
             SET status = ?, payload_json = ?, decided_at = ?, decided_by = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(item.status.as_str())
        .bind(&payload_json)
        .bind(decided_at.as_deref())
        .bind(item.decided_by.as_deref())
        .bind(&item.id.0)
        .bind(ReviewStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "review item {} is no longer pending",
                item.id
            )));
        }

        if let Some(commit) = &outcome.commit {
            let now = item.decided_at.unwrap_or(commit.quoted_at);
            let client =
                find_or_create_client(&mut tx, &commit.client.name, commit.client.email.as_deref(), now)
                    .await?;

            for line in &commit.items {
                let material = find_or_create_material(
                    &mut tx,
                    &line.material_name,
                    line.hsn_code.as_deref(),
                    &line.unit,
                    now,
                )
                .await?;

                let record = PriceHistoryRecord {
                    id: PriceHistoryId(Uuid::new_v4().to_string()),
                    material_id: material.id,
                    client_id: Some(client.id.clone()),
                    quantity: line.quantity,
                    unit: line.unit.clone(),
                    rate_per_unit: line.rate_per_unit,
                    ex_works_location: line.ex_works_terms.clone(),
                    source: commit.source,
                    corrected: commit.corrected,
                    review_item_id: Some(commit.review_item_id.clone()),
                    quoted_at: commit.quoted_at,
                };
                insert_price_record(&mut tx, &record).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

fn encode_payload(payload: &ExtractionPayload) -> Result<String, RepositoryError> {
    serde_json::to_string(payload)
        .map_err(|err| RepositoryError::Decode(format!("encode extraction payload: {err}")))
}

fn review_item_from_row(row: &SqliteRow) -> Result<ReviewItem, RepositoryError> {
    let method_raw: String = row.try_get("extraction_method")?;
    let extraction_method = ExtractionMethod::parse(&method_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("invalid review item extraction_method: {}", method_raw))
    })?;

    let status_raw: String = row.try_get("status")?;
    let status = ReviewStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("invalid review item status: {}", status_raw))
    })?;

    let payload_raw: String = row.try_get("payload_json")?;
    let payload: ExtractionPayload = serde_json::from_str(&payload_raw)
        .map_err(|err| RepositoryError::Decode(format!("decode extraction payload: {err}")))?;

    let decided_at = row
        .try_get::<Option<String>, _>("decided_at")?
        .as_deref()
        .map(|ts| parse_rfc3339("review item decided_at", ts))
        .transpose()?;

    Ok(ReviewItem {
        id: ReviewItemId(row.try_get("id")?),
        source_message_id: row.try_get("source_message_id")?,
        thread_id: row.try_get("thread_id")?,
        subject: row.try_get("subject")?,
        sender_address: row.try_get("sender_address")?,
        received_at: parse_rfc3339(
            "review item received_at",
            &row.try_get::<String, _>("received_at")?,
        )?,
        extraction_method,
        confidence: row.try_get("confidence")?,
        payload,
        status,
        created_at: parse_rfc3339(
            "review item created_at",
            &row.try_get::<String, _>("created_at")?,
        )?,
        decided_at,
        decided_by: row.try_get("decided_by")?,
    })
}
