//! NDR Core server
//!
//! Commands:
//! - `ndr-core init`: write a default configuration and the data directory
//! - `ndr-core clean [--yes]`: delete the SQLite database after confirmation
//! - `ndr-core import-manifests <dir>`: import IIIF manifest files
//! - `ndr-core` or `ndr-core serve`: run the server

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ndr_core::{
    api::{self, middleware::RequestStats, AppState},
    commands::{self, CleanOutcome},
    config::Config,
    db::{
        self,
        repositories::{SqlxCorrectionRepository, SqlxManifestRepository, SqlxStatisticsRepository},
    },
    services::{CorrectionService, SearchService},
};

const CONFIG_FILE: &str = "config.yml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ndr_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = Path::new(CONFIG_FILE);
    match args.first().map(String::as_str).unwrap_or("serve") {
        "init" => {
            commands::write_default_config(config_path)?;
            let config = Config::load_with_env(config_path)?;
            commands::prepare_data_dir(&config.database)?;
            Ok(())
        }
        "clean" => {
            let confirmed = args[1..].iter().any(|a| a == "--yes" || a == "-y");
            let config = Config::load_with_env(config_path)?;
            let stdin = std::io::stdin();
            let outcome = commands::clean(
                &config.database,
                confirmed,
                &mut stdin.lock(),
                &mut std::io::stdout(),
            )?;
            if outcome == CleanOutcome::Aborted {
                tracing::info!("Clean aborted");
            }
            Ok(())
        }
        "import-manifests" => {
            let Some(dir) = args.get(1) else {
                anyhow::bail!("Usage: ndr-core import-manifests <directory>");
            };
            let config = Config::load_with_env(config_path)?;
            let report = commands::import_manifests(&config, Path::new(dir)).await?;
            for manifest in &report.imported {
                println!("Created: {}: {}", manifest.identifier, manifest.title);
            }
            for (file, reason) in &report.skipped {
                println!("Skipped: {}: {}", file, reason);
            }
            Ok(())
        }
        "serve" => serve(config_path).await,
        other => anyhow::bail!(
            "Unknown command '{}'; expected init, clean, import-manifests or serve",
            other
        ),
    }
}

async fn serve(config_path: &Path) -> Result<()> {
    tracing::info!("Starting NDR Core...");

    let config = Config::load_with_env(config_path)?;
    tracing::info!(
        "Configuration loaded: {} APIs, {} searches",
        config.catalog.apis.len(),
        config.catalog.searches.len()
    );

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let catalog = Arc::new(config.catalog);
    let search_service = SearchService::new(catalog.clone(), config.search.clone())?
        .with_statistics(SqlxStatisticsRepository::boxed(pool.clone()))
        .with_manifests(SqlxManifestRepository::boxed(pool.clone()));
    let correction_service = CorrectionService::new(
        SqlxCorrectionRepository::boxed(pool.clone()),
        catalog,
        config.search.correction_feature,
    );

    let state = AppState {
        pool: pool.clone(),
        search_service: Arc::new(search_service),
        correction_service: Arc::new(correction_service),
        request_stats: Arc::new(RequestStats::new()),
    };

    let app = api::build_router(state, &config.server.cors_origin)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
