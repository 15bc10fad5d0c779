use serde::Serialize;

use requote_core::config::{AppConfig, LoadOptions};
use requote_db::connect_with_settings;

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: &'static str,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    status: &'static str,
    checks: Vec<DoctorCheck>,
}

pub fn run(json: bool) -> String {
    let report = build_report();
    if json {
        serde_json::to_string_pretty(&report)
            .unwrap_or_else(|error| format!("{{\"status\":\"error\",\"detail\":\"{error}\"}}"))
    } else {
        render_text(&report)
    }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config",
                status: "ok",
                detail: format!("database.url = {}", config.database.url),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config",
                status: "fail",
                detail: error.to_string(),
            });
            None
        }
    };

    if let Some(config) = config {
        let detail = check_database(&config);
        checks.push(detail);
    } else {
        checks.push(DoctorCheck {
            name: "database",
            status: "skipped",
            detail: "configuration did not load".to_string(),
        });
    }

    let status = if checks.iter().all(|check| check.status == "ok") { "ready" } else { "degraded" };
    DoctorReport { status, checks }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database",
                status: "fail",
                detail: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await?;
        let probe = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await;
        pool.close().await;
        probe.map(|_| ())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database",
            status: "ok",
            detail: "connection and probe query succeeded".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "database",
            status: "fail",
            detail: format!("database check failed: {error}"),
        },
    }
}

fn render_text(report: &DoctorReport) -> String {
    let mut lines = vec![format!("status: {}", report.status)];
    for check in &report.checks {
        lines.push(format!("  {:<10} {:<8} {}", check.name, check.status, check.detail));
    }
    lines.join("\n")
}
