use crate::config::AppConfig;
use crate::db::connection::{init_db, Database};
use crate::pipeline::{FetchOrchestrator, Scheduler};
use crate::responses::error_response;
use crate::router::handle;
use crate::state::AppState;
use crate::uploads::DiskImageStore;
use anyhow::Context;
use astra::Server;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod domain;
mod errors;
mod moderation;
mod notify;
mod pipeline;
mod query;
mod responses;
mod router;
mod scraper;
mod state;
mod uploads;

#[cfg(test)]
mod tests;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        tracing::error!(error = %format!("{e:#}"), "startup failed");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = Arc::new(AppConfig::from_env().context("loading configuration")?);

    let db = Database::new(config.database_path.clone());
    init_db(&db, &config.schema_path).context("initializing database")?;

    let adapters = scraper::default_adapters(&config.fetch).context("building HTTP client")?;
    let orchestrator = Arc::new(FetchOrchestrator::new(
        db.clone(),
        adapters,
        config.cities.clone(),
        config.fetch.max_parallel,
        config.fetch.call_timeout,
    ));
    let notifier = notify::from_token(config.telegram_token.as_deref()).context("building notifier")?;
    let images = DiskImageStore::new(&config.upload_dir).context("preparing upload directory")?;

    let state = AppState {
        db,
        config: Arc::clone(&config),
        orchestrator: Arc::clone(&orchestrator),
        notifier: Arc::from(notifier),
        images: Arc::new(images),
    };

    let scheduler = Scheduler::start(orchestrator, config.fetch.interval).context("starting scheduler")?;

    tracing::info!(addr = %config.bind_addr, workers = config.server_workers, "starting server");
    let server = Server::bind(&config.bind_addr).max_workers(config.server_workers);

    let result = server.serve(move |req, _info| match handle(req, &state) {
        Ok(resp) => resp,
        Err(err) => error_response(err),
    });

    scheduler.stop();
    result.context("server ended with error")?;
    tracing::info!("server shut down cleanly");
    Ok(())
}
