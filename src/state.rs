use crate::config::AppConfig;
use crate::db::connection::Database;
use crate::notify::Notifier;
use crate::pipeline::FetchOrchestrator;
use crate::uploads::ImageStore;
use std::sync::Arc;

/// Everything a request handler needs. Cloned into every server worker.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<FetchOrchestrator>,
    pub notifier: Arc<dyn Notifier>,
    pub images: Arc<dyn ImageStore>,
}
