use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use requote_core::domain::client::ClientId;
use requote_core::domain::material::MaterialId;
use requote_core::domain::price::{PriceHistoryId, PriceHistoryRecord, PriceSource};
use requote_core::domain::review::ReviewItemId;

use super::reference::{parse_decimal, parse_rfc3339};
use super::{PriceHistoryRepository, RepositoryError};
use crate::DbPool;

const HISTORY_LIMIT_CEILING: u32 = 100;

pub struct SqlPriceHistoryRepository {
    pool: DbPool,
}

impl SqlPriceHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceHistoryRepository for SqlPriceHistoryRepository {
    async fn append(&self, record: PriceHistoryRecord) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_price_record(&mut conn, &record).await
    }

    async fn list_for_material(
        &self,
        material_id: &MaterialId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryRecord>, RepositoryError> {
        let limit = limit.clamp(1, HISTORY_LIMIT_CEILING);

        let rows = sqlx::query(
            r#"
            SELECT
                id, material_id, client_id, quantity, unit, rate_per_unit,
                ex_works_location, source, corrected, review_item_id, quoted_at
            FROM price_history
            WHERE material_id = ?
            ORDER BY quoted_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(&material_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(price_record_from_row).collect()
    }

    async fn latest_for_client(
        &self,
        material_id: &MaterialId,
        client_id: &ClientId,
    ) -> Result<Option<PriceHistoryRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                id, material_id, client_id, quantity, unit, rate_per_unit,
                ex_works_location, source, corrected, review_item_id, quoted_at
            FROM price_history
            WHERE material_id = ? AND client_id = ?
            ORDER BY quoted_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(&material_id.0)
        .bind(&client_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|value| price_record_from_row(&value)).transpose()
    }
}

/// Shared by the review-decision commit and the quote save so both append
/// inside their own transactions.
pub(crate) async fn insert_price_record(
    conn: &mut SqliteConnection,
    record: &PriceHistoryRecord,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO price_history (
            id, material_id, client_id, quantity, unit, rate_per_unit,
            ex_works_location, source, corrected, review_item_id, quoted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id.0)
    .bind(&record.material_id.0)
    .bind(record.client_id.as_ref().map(|id| id.0.as_str()))
    .bind(record.quantity.to_string())
    .bind(&record.unit)
    .bind(record.rate_per_unit.to_string())
    .bind(record.ex_works_location.as_deref())
    .bind(record.source.as_str())
    .bind(record.corrected)
    .bind(record.review_item_id.as_ref().map(|id| id.0.as_str()))
    .bind(record.quoted_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) fn price_record_from_row(row: &SqliteRow) -> Result<PriceHistoryRecord, RepositoryError> {
    let source_raw: String = row.try_get("source")?;
    let source = PriceSource::parse(&source_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("invalid price history source: {}", source_raw))
    })?;

    Ok(PriceHistoryRecord {
        id: PriceHistoryId(row.try_get("id")?),
        material_id: MaterialId(row.try_get("material_id")?),
        client_id: row.try_get::<Option<String>, _>("client_id")?.map(ClientId),
        quantity: parse_decimal("price history quantity", &row.try_get::<String, _>("quantity")?)?,
        unit: row.try_get("unit")?,
        rate_per_unit: parse_decimal(
            "price history rate_per_unit",
            &row.try_get::<String, _>("rate_per_unit")?,
        )?,
        ex_works_location: row.try_get("ex_works_location")?,
        source,
        corrected: row.try_get("corrected")?,
        review_item_id: row.try_get::<Option<String>, _>("review_item_id")?.map(ReviewItemId),
        quoted_at: parse_rfc3339(
            "price history quoted_at",
            &row.try_get::<String, _>("quoted_at")?,
        )?,
    })
}
