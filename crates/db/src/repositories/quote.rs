use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use requote_core::domain::client::ClientId;
use requote_core::domain::material::MaterialId;
use requote_core::domain::price::{PriceHistoryId, PriceHistoryRecord, PriceSource};
use requote_core::domain::quote::{Quote, QuoteId, QuoteLineItem};

use super::price_history::insert_price_record;
use super::reference::{parse_decimal, parse_rfc3339};
use super::{QuoteRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn save(&self, quote: Quote, actor: &str) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO quote (id, client_id, total_amount, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&quote.id.0)
        .bind(&quote.client_id.0)
        .bind(quote.total_amount.to_string())
        .bind(actor)
        .bind(quote.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
                return Err(RepositoryError::Conflict(format!(
                    "quote {} already exists",
                    quote.id
                )));
            }
            Err(other) => return Err(other.into()),
        }

        for (index, line) in quote.line_items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO quote_line (
                    id, quote_id, line_index, material_id, quantity, unit,
                    rate_per_unit, ex_works, delivery_terms
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&quote.id.0)
            .bind(index as i64)
            .bind(&line.material_id.0)
            .bind(line.quantity.to_string())
            .bind(&line.unit)
            .bind(line.rate_per_unit.to_string())
            .bind(line.ex_works.to_string())
            .bind(line.delivery_terms.as_deref())
            .execute(&mut *tx)
            .await?;

            // Every saved quote feeds future price resolution.
            let record = PriceHistoryRecord {
                id: PriceHistoryId(Uuid::new_v4().to_string()),
                material_id: line.material_id.clone(),
                client_id: Some(quote.client_id.clone()),
                quantity: line.quantity,
                unit: line.unit.clone(),
                rate_per_unit: line.rate_per_unit,
                ex_works_location: None,
                source: PriceSource::Manual,
                corrected: false,
                review_item_id: None,
                quoted_at: quote.created_at,
            };
            insert_price_record(&mut tx, &record).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quote_row =
            sqlx::query("SELECT id, client_id, created_at FROM quote WHERE id = ?")
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        let Some(quote_row) = quote_row else {
            return Ok(None);
        };

        let line_rows = sqlx::query(
            r#"
            SELECT material_id, quantity, unit, rate_per_unit, ex_works, delivery_terms
            FROM quote_line
            WHERE quote_id = ?
            ORDER BY line_index
            "#,
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        let line_items: Vec<QuoteLineItem> =
            line_rows.iter().map(quote_line_from_row).collect::<Result<_, _>>()?;

        // The stored total is never trusted on read.
        let total_amount = Quote::compute_total(&line_items);

        Ok(Some(Quote {
            id: QuoteId(quote_row.try_get("id")?),
            client_id: ClientId(quote_row.try_get("client_id")?),
            line_items,
            total_amount,
            created_at: parse_rfc3339(
                "quote created_at",
                &quote_row.try_get::<String, _>("created_at")?,
            )?,
        }))
    }
}

fn quote_line_from_row(row: &SqliteRow) -> Result<QuoteLineItem, RepositoryError> {
    Ok(QuoteLineItem {
        material_id: MaterialId(row.try_get("material_id")?),
        quantity: parse_decimal("quote line quantity", &row.try_get::<String, _>("quantity")?)?,
        unit: row.try_get("unit")?,
        rate_per_unit: parse_decimal(
            "quote line rate_per_unit",
            &row.try_get::<String, _>("rate_per_unit")?,
        )?,
        ex_works: parse_decimal("quote line ex_works", &row.try_get::<String, _>("ex_works")?)?,
        delivery_terms: row.try_get("delivery_terms")?,
    })
}
