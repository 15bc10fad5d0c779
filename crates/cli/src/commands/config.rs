use serde::Serialize;

use requote_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Serialize)]
struct EffectiveConfig {
    database: DatabaseSection,
    server: ServerSection,
    pricing: PricingSection,
    logging: LoggingSection,
}

#[derive(Debug, Serialize)]
struct DatabaseSection {
    url: String,
    max_connections: u32,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct ServerSection {
    bind_address: String,
    port: u16,
    health_check_port: u16,
}

#[derive(Debug, Serialize)]
struct PricingSection {
    history_limit: u32,
}

#[derive(Debug, Serialize)]
struct LoggingSection {
    level: String,
    format: &'static str,
}

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let effective = EffectiveConfig {
                database: DatabaseSection {
                    url: config.database.url,
                    max_connections: config.database.max_connections,
                    timeout_secs: config.database.timeout_secs,
                },
                server: ServerSection {
                    bind_address: config.server.bind_address,
                    port: config.server.port,
                    health_check_port: config.server.health_check_port,
                },
                pricing: PricingSection { history_limit: config.pricing.history_limit },
                logging: LoggingSection {
                    level: config.logging.level,
                    format: match config.logging.format {
                        LogFormat::Compact => "compact",
                        LogFormat::Pretty => "pretty",
                        LogFormat::Json => "json",
                    },
                },
            };
            serde_json::to_string_pretty(&effective)
                .unwrap_or_else(|error| format!("failed to render configuration: {error}"))
        }
        Err(error) => format!("configuration issue: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn effective_config_renders_every_section() {
        let output = run();
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("config emits JSON");
        for section in ["database", "server", "pricing", "logging"] {
            assert!(parsed.get(section).is_some(), "missing section `{section}`");
        }
        assert_eq!(parsed["pricing"]["history_limit"], 20);
    }
}
