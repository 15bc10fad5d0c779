//! Master price-book import: deterministic materials, clients, and
//! price-history rows with `source = master`. Safe to rerun; an already
//! seeded database is left untouched.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use requote_core::domain::client::{Client, ClientId};
use requote_core::domain::material::{Material, MaterialId};
use requote_core::domain::price::{PriceHistoryId, PriceHistoryRecord, PriceSource};
use requote_db::repositories::{
    ClientRepository, MaterialRepository, PriceHistoryRepository, SqlClientRepository,
    SqlMaterialRepository, SqlPriceHistoryRepository,
};
use requote_core::config::{AppConfig, LoadOptions};
use requote_db::{connect_with_settings, migrations, DbPool};

use crate::commands::CommandResult;

struct MaterialSeed {
    id: &'static str,
    name: &'static str,
    hsn_code: &'static str,
    unit: &'static str,
}

const MATERIAL_SEEDS: &[MaterialSeed] = &[
    MaterialSeed { id: "MAT-0001", name: "MS Angle 50x50x6", hsn_code: "7216", unit: "MT" },
    MaterialSeed { id: "MAT-0002", name: "HR Coil 2mm", hsn_code: "7208", unit: "MT" },
    MaterialSeed { id: "MAT-0003", name: "CR Sheet 1mm", hsn_code: "7209", unit: "MT" },
    MaterialSeed { id: "MAT-0004", name: "TMT Bar 12mm", hsn_code: "7214", unit: "MT" },
    MaterialSeed { id: "MAT-0005", name: "GI Pipe 2in", hsn_code: "7306", unit: "MT" },
];

struct ClientSeed {
    id: &'static str,
    name: &'static str,
    email: &'static str,
}

const CLIENT_SEEDS: &[ClientSeed] = &[
    ClientSeed { id: "CL-0001", name: "Sharma Steels", email: "purchase@sharmasteels.example" },
    ClientSeed { id: "CL-0002", name: "Mehta Alloys", email: "buyer@mehta.example" },
    ClientSeed { id: "CL-0003", name: "Verma Infra", email: "procurement@vermainfra.example" },
];

struct PriceSeed {
    id: &'static str,
    material_id: &'static str,
    client_id: Option<&'static str>,
    quantity: i64,
    rate_per_unit: i64,
    day: u32,
}

const PRICE_SEEDS: &[PriceSeed] = &[
    PriceSeed { id: "PH-0001", material_id: "MAT-0001", client_id: Some("CL-0001"), quantity: 12, rate_per_unit: 54_500, day: 3 },
    PriceSeed { id: "PH-0002", material_id: "MAT-0001", client_id: Some("CL-0002"), quantity: 8, rate_per_unit: 54_900, day: 9 },
    PriceSeed { id: "PH-0003", material_id: "MAT-0002", client_id: Some("CL-0002"), quantity: 20, rate_per_unit: 51_200, day: 5 },
    PriceSeed { id: "PH-0004", material_id: "MAT-0002", client_id: None, quantity: 15, rate_per_unit: 50_800, day: 2 },
    PriceSeed { id: "PH-0005", material_id: "MAT-0003", client_id: Some("CL-0003"), quantity: 6, rate_per_unit: 58_000, day: 7 },
    PriceSeed { id: "PH-0006", material_id: "MAT-0004", client_id: Some("CL-0001"), quantity: 25, rate_per_unit: 48_900, day: 8 },
    PriceSeed { id: "PH-0007", material_id: "MAT-0005", client_id: None, quantity: 10, rate_per_unit: 61_300, day: 4 },
];

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let outcome = seed_master_price_book(&pool)
            .await
            .map_err(|error| ("seed", error, 6u8))?;
        pool.close().await;
        Ok::<SeedOutcome, (&'static str, String, u8)>(outcome)
    });

    match result {
        Ok(SeedOutcome::AlreadySeeded) => {
            CommandResult::success("seed", "master price book already present; nothing to do")
        }
        Ok(SeedOutcome::Seeded { materials, clients, price_records }) => CommandResult::success(
            "seed",
            format!(
                "imported master price book: {materials} materials, {clients} clients, {price_records} price records"
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

pub enum SeedOutcome {
    AlreadySeeded,
    Seeded { materials: usize, clients: usize, price_records: usize },
}

pub async fn seed_master_price_book(pool: &DbPool) -> Result<SeedOutcome, String> {
    let materials = SqlMaterialRepository::new(pool.clone());
    let clients = SqlClientRepository::new(pool.clone());
    let history = SqlPriceHistoryRepository::new(pool.clone());

    let sentinel = materials
        .find_by_id(&MaterialId(MATERIAL_SEEDS[0].id.to_string()))
        .await
        .map_err(|error| format!("probe seeded materials: {error}"))?;
    if sentinel.is_some() {
        return Ok(SeedOutcome::AlreadySeeded);
    }

    let seeded_at = Utc
        .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| "construct seed timestamp".to_string())?;

    for seed in MATERIAL_SEEDS {
        materials
            .save(Material {
                id: MaterialId(seed.id.to_string()),
                name: seed.name.to_string(),
                hsn_code: Some(seed.hsn_code.to_string()),
                unit: seed.unit.to_string(),
                created_at: seeded_at,
            })
            .await
            .map_err(|error| format!("seed material {}: {error}", seed.id))?;
    }

    for seed in CLIENT_SEEDS {
        clients
            .save(Client {
                id: ClientId(seed.id.to_string()),
                name: seed.name.to_string(),
                email: Some(seed.email.to_string()),
                created_at: seeded_at,
            })
            .await
            .map_err(|error| format!("seed client {}: {error}", seed.id))?;
    }

    for seed in PRICE_SEEDS {
        let quoted_at = Utc
            .with_ymd_and_hms(2026, 1, seed.day, 10, 0, 0)
            .single()
            .ok_or_else(|| format!("construct quoted_at for {}", seed.id))?;
        history
            .append(PriceHistoryRecord {
                id: PriceHistoryId(seed.id.to_string()),
                material_id: MaterialId(seed.material_id.to_string()),
                client_id: seed.client_id.map(|id| ClientId(id.to_string())),
                quantity: Decimal::new(seed.quantity, 0),
                unit: "MT".to_string(),
                rate_per_unit: Decimal::new(seed.rate_per_unit, 0),
                ex_works_location: None,
                source: PriceSource::Master,
                corrected: false,
                review_item_id: None,
                quoted_at,
            })
            .await
            .map_err(|error| format!("seed price record {}: {error}", seed.id))?;
    }

    Ok(SeedOutcome::Seeded {
        materials: MATERIAL_SEEDS.len(),
        clients: CLIENT_SEEDS.len(),
        price_records: PRICE_SEEDS.len(),
    })
}

#[cfg(test)]
mod tests {
    use requote_core::domain::material::MaterialId;
    use requote_db::repositories::{MaterialRepository, SqlMaterialRepository};
    use requote_db::{connect_with_settings, migrations};

    use super::{seed_master_price_book, SeedOutcome};

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = seed_master_price_book(&pool).await.expect("first seed");
        assert!(matches!(first, SeedOutcome::Seeded { materials: 5, clients: 3, price_records: 7 }));

        let second = seed_master_price_book(&pool).await.expect("second seed");
        assert!(matches!(second, SeedOutcome::AlreadySeeded));

        let materials = SqlMaterialRepository::new(pool.clone());
        let angle = materials
            .find_by_id(&MaterialId("MAT-0001".to_string()))
            .await
            .expect("lookup")
            .expect("seeded material exists");
        assert_eq!(angle.name, "MS Angle 50x50x6");

        let master_rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM price_history WHERE source = 'master'")
                .fetch_one(&pool)
                .await
                .expect("count master rows");
        assert_eq!(master_rows, 7);
        pool.close().await;
    }
}
