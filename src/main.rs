use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::Level;

use concierge_core::provider::LlmProvider;
use concierge_core::security::ApiKey;
use concierge_engine::{
    CoordinatorConfig, ReservationLedger, RoomCatalog, SessionServices, SessionStore, SystemClock,
};
use concierge_llm::{OpenAiConfig, OpenAiProvider, UnconfiguredProvider};
use concierge_settings::{expand_home, ConciergeSettings};
use concierge_store::seed::seed_catalog;
use concierge_store::{Database, ReservationRepo, RoomTypeRepo};
use concierge_telemetry::{init_telemetry, TelemetryConfig};

/// Conversational hotel booking server.
#[derive(Debug, Parser)]
#[command(name = "concierge", version)]
struct Cli {
    /// Settings file (defaults to ~/.concierge/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    port: Option<u16>,

    /// Room catalog seed file.
    #[arg(long)]
    catalog: Option<String>,

    /// SQLite ledger database.
    #[arg(long)]
    database: Option<String>,
}

impl Cli {
    fn load_settings(&self) -> anyhow::Result<ConciergeSettings> {
        let mut settings = match &self.settings {
            Some(path) => concierge_settings::load_settings_from_path(path)?,
            None => concierge_settings::load_settings()?,
        };
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(catalog) = &self.catalog {
            settings.storage.catalog_path = catalog.clone();
        }
        if let Some(database) = &self.database {
            settings.storage.database_path = database.clone();
        }
        Ok(settings)
    }
}

fn build_provider(settings: &ConciergeSettings) -> Arc<dyn LlmProvider> {
    let key_env = &settings.llm.api_key_env;
    match std::env::var(key_env) {
        Ok(key) if !key.trim().is_empty() => Arc::new(OpenAiProvider::new(OpenAiConfig {
            api_key: ApiKey::new(key),
            base_url: settings.llm.base_url.clone(),
            model: settings.llm.model.clone(),
            temperature: settings.llm.temperature,
        })),
        _ => {
            tracing::warn!(env = %key_env, "No API key set, general questions get the fallback reply");
            Arc::new(UnconfiguredProvider::new(format!("{key_env} is not set")))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings().context("loading settings")?;

    let _telemetry = init_telemetry(TelemetryConfig {
        log_level: settings.logging.level.parse().unwrap_or(Level::INFO),
        log_to_sqlite: settings.logging.log_to_sqlite,
        log_db_path: expand_home(&settings.logging.log_database_path),
        ..Default::default()
    });

    tracing::info!("Starting concierge server");

    let db_path = expand_home(&settings.storage.database_path);
    let db = Database::open(&db_path).context("opening database")?;

    let room_types = seed_catalog(
        &RoomTypeRepo::new(db.clone()),
        &expand_home(&settings.storage.catalog_path),
    )
    .context("loading room catalog")?;
    let catalog = Arc::new(RoomCatalog::new(room_types)?);
    tracing::info!(room_types = catalog.len(), "Room catalog ready");

    let ledger = Arc::new(
        ReservationLedger::open(catalog, Arc::new(ReservationRepo::new(db)))
            .context("rebuilding reservation ledger")?
            .with_max_stay_nights(settings.booking.max_stay_nights),
    );

    let services = SessionServices::new(
        ledger,
        build_provider(&settings),
        Arc::new(SystemClock),
        CoordinatorConfig {
            history_window: settings.session.history_window,
            llm_timeout: Duration::from_secs(settings.session.llm_timeout_secs),
            hotel_name: settings.hotel_name.clone(),
        },
    );
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(
        settings.session.idle_timeout_secs,
    )));

    let config = concierge_server::ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        max_send_queue: settings.server.max_send_queue,
        heartbeat_interval: Duration::from_secs(settings.server.heartbeat_interval_secs),
        inbox_capacity: settings.session.inbox_capacity,
        reap_interval: Duration::from_secs(settings.session.reap_interval_secs),
    };
    let handle = concierge_server::start(config, services, sessions)
        .await
        .context("starting server")?;

    tracing::info!(port = handle.port, "Concierge server ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;

    tracing::info!("Shutting down");
    handle.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9000}, "hotelName": "Mar Azul"}"#).unwrap();

        let cli = Cli::parse_from([
            "concierge",
            "--settings",
            path.to_str().unwrap(),
            "--port",
            "9100",
            "--database",
            "/tmp/ledger.db",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.hotel_name, "Mar Azul");
        assert_eq!(settings.storage.database_path, "/tmp/ledger.db");
        assert_eq!(settings.storage.catalog_path, "hotel_data.json");
        assert_eq!(settings.booking.max_stay_nights, 30);
    }
}
