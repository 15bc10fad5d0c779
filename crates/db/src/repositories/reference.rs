use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use requote_core::domain::client::{Client, ClientId};
use requote_core::domain::material::{Material, MaterialId};

use super::{ClientRepository, MaterialRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMaterialRepository {
    pool: DbPool,
}

impl SqlMaterialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MaterialRepository for SqlMaterialRepository {
    async fn find_by_id(&self, id: &MaterialId) -> Result<Option<Material>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, hsn_code, unit, created_at FROM material WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|value| material_from_row(&value)).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Material>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_material_by_name(&mut conn, name).await
    }

    async fn save(&self, material: Material) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO material (id, name, hsn_code, unit, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&material.id.0)
        .bind(&material.name)
        .bind(material.hsn_code.as_deref())
        .bind(&material.unit)
        .bind(material.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub struct SqlClientRepository {
    pool: DbPool,
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRepository for SqlClientRepository {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, created_at FROM client WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|value| client_from_row(&value)).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Client>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_client_by_name(&mut conn, name).await
    }

    async fn save(&self, client: Client) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO client (id, name, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(&client.id.0)
            .bind(&client.name)
            .bind(client.email.as_deref())
            .bind(client.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

pub(crate) async fn find_material_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Material>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, name, hsn_code, unit, created_at FROM material \
         WHERE name = ? COLLATE NOCASE",
    )
    .bind(name.trim())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|value| material_from_row(&value)).transpose()
}

/// Create-or-reuse by case-insensitive name. An existing material keeps its
/// stored HSN code and unit; the commit never rewrites reference data.
pub(crate) async fn find_or_create_material(
    conn: &mut SqliteConnection,
    name: &str,
    hsn_code: Option<&str>,
    unit: &str,
    now: DateTime<Utc>,
) -> Result<Material, RepositoryError> {
    if let Some(existing) = find_material_by_name(conn, name).await? {
        return Ok(existing);
    }

    let material = Material {
        id: MaterialId(Uuid::new_v4().to_string()),
        name: name.trim().to_string(),
        hsn_code: hsn_code.map(str::to_string),
        unit: unit.to_string(),
        created_at: now,
    };
    sqlx::query(
        "INSERT INTO material (id, name, hsn_code, unit, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&material.id.0)
    .bind(&material.name)
    .bind(material.hsn_code.as_deref())
    .bind(&material.unit)
    .bind(material.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(material)
}

pub(crate) async fn find_client_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Client>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, name, email, created_at FROM client WHERE name = ? COLLATE NOCASE",
    )
    .bind(name.trim())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|value| client_from_row(&value)).transpose()
}

pub(crate) async fn find_or_create_client(
    conn: &mut SqliteConnection,
    name: &str,
    email: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Client, RepositoryError> {
    if let Some(existing) = find_client_by_name(conn, name).await? {
        return Ok(existing);
    }

    let client = Client {
        id: ClientId(Uuid::new_v4().to_string()),
        name: name.trim().to_string(),
        email: email.map(str::to_string),
        created_at: now,
    };
    sqlx::query("INSERT INTO client (id, name, email, created_at) VALUES (?, ?, ?, ?)")
        .bind(&client.id.0)
        .bind(&client.name)
        .bind(client.email.as_deref())
        .bind(client.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;

    Ok(client)
}

pub(crate) fn material_from_row(row: &SqliteRow) -> Result<Material, RepositoryError> {
    Ok(Material {
        id: MaterialId(row.try_get("id")?),
        name: row.try_get("name")?,
        hsn_code: row.try_get("hsn_code")?,
        unit: row.try_get("unit")?,
        created_at: parse_rfc3339("material created_at", &row.try_get::<String, _>("created_at")?)?,
    })
}

pub(crate) fn client_from_row(row: &SqliteRow) -> Result<Client, RepositoryError> {
    Ok(Client {
        id: ClientId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: parse_rfc3339("client created_at", &row.try_get::<String, _>("created_at")?)?,
    })
}

pub(crate) fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)).map_err(|err| {
        RepositoryError::Decode(format!("invalid {} timestamp '{}': {}", field, value, err))
    })
}

pub(crate) fn parse_decimal(
    field: &str,
    value: &str,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    value.parse().map_err(|err| {
        RepositoryError::Decode(format!("invalid {} decimal '{}': {}", field, value, err))
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use requote_core::domain::material::{Material, MaterialId};

    use super::{SqlClientRepository, SqlMaterialRepository};
    use crate::repositories::{ClientRepository, MaterialRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn material_round_trip_and_case_insensitive_lookup() {
        let pool = setup_pool().await;
        let repo = SqlMaterialRepository::new(pool.clone());

        let material = Material {
            id: MaterialId("MAT-1".to_string()),
            name: "MS Angle 50x50x6".to_string(),
            hsn_code: Some("7216".to_string()),
            unit: "MT".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).single().expect("timestamp"),
        };
        repo.save(material.clone()).await.expect("save material");

        let by_id = repo.find_by_id(&material.id).await.expect("find by id");
        assert_eq!(by_id, Some(material.clone()));

        let by_name = repo.find_by_name("ms angle 50X50X6").await.expect("find by name");
        assert_eq!(by_name, Some(material));

        assert!(repo.find_by_name("HR Coil 2mm").await.expect("lookup").is_none());
        pool.close().await;
    }

    #[tokio::test]
    async fn duplicate_material_names_violate_the_unique_constraint() {
        let pool = setup_pool().await;
        let repo = SqlMaterialRepository::new(pool.clone());

        let first = Material {
            id: MaterialId("MAT-1".to_string()),
            name: "TMT Bar 12mm".to_string(),
            hsn_code: None,
            unit: "MT".to_string(),
            created_at: Utc::now(),
        };
        let mut second = first.clone();
        second.id = MaterialId("MAT-2".to_string());
        second.name = "tmt bar 12MM".to_string();

        repo.save(first).await.expect("first save");
        assert!(repo.save(second).await.is_err(), "case-folded duplicate must be rejected");
        pool.close().await;
    }

    #[tokio::test]
    async fn client_round_trip() {
        let pool = setup_pool().await;
        let repo = SqlClientRepository::new(pool.clone());

        let client = requote_core::domain::client::Client {
            id: requote_core::domain::client::ClientId("CL-1".to_string()),
            name: "Sharma Steels".to_string(),
            email: Some("purchase@sharmasteels.example".to_string()),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).single().expect("timestamp"),
        };
        repo.save(client.clone()).await.expect("save client");

        let found = repo.find_by_name("SHARMA STEELS").await.expect("find by name");
        assert_eq!(found, Some(client));
        pool.close().await;
    }
}
