mod cli;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use waypoint_core::{Settings, SharedSettings};
use waypoint_gateway::{App, AppState, GatewayConfig, Store};
use waypoint_storage::{InMemoryStore, MySqlStore};
use waypoint_telemetry::{LogFormat, TelemetryConfig};
use waypoint_tracker::RetentionJob;

use crate::cli::{LogFormatArg, StorageBackendArg, CLI};

const RETENTION_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;

    let telemetry = TelemetryConfig::builder()
        .service_name("waypoint-gateway")
        .format(match config.log_format {
            LogFormatArg::Plain => LogFormat::Plain,
            LogFormatArg::Json => LogFormat::Json,
        });
    let _telemetry = match config.otlp_endpoint.clone() {
        Some(endpoint) => waypoint_telemetry::init(telemetry.otlp_endpoint(endpoint).build())?,
        None => waypoint_telemetry::init(telemetry.build())?,
    };

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        "starting waypoint gateway"
    );

    let exclude_patterns = match &config.exclude_patterns_file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => String::new(),
    };
    let settings = SharedSettings::new(Settings {
        logging_enabled: config.not_found_logging,
        retention_days: config.retention_days,
        exclude_patterns,
        auto_delete_on_conversion: config.auto_delete_on_conversion,
    });
    let gateway = GatewayConfig {
        ip_hash_salt: config.ip_hash_salt.clone(),
        ..GatewayConfig::builder()
            .cache_ttl(Duration::from_secs(config.cache_ttl_secs))
            .build()
    };

    match config.storage {
        StorageBackendArg::InMemory => {
            run_server(
                config.listen_addr,
                config.site_dir,
                InMemoryStore::new(),
                settings,
                gateway,
            )
            .await?;
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .ok_or("mysql dsn is required when storage backend is mysql")?;
            let store = MySqlStore::connect(&mysql_dsn).await?;
            store.ensure_schema().await?;
            run_server(config.listen_addr, config.site_dir, store, settings, gateway).await?;
        }
    }

    Ok(())
}

async fn run_server<S: Store>(
    listen_addr: SocketAddr,
    site_dir: Option<PathBuf>,
    store: S,
    settings: SharedSettings,
    config: GatewayConfig,
) -> std::io::Result<()> {
    let store = Arc::new(store);

    let retention = Arc::new(RetentionJob::new(Arc::clone(&store), settings.clone()))
        .spawn(RETENTION_PERIOD);

    let state = AppState::new(store, settings, config);
    let app = App::router(state, site_dir);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    retention.abort();
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
