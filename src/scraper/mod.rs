mod adapter;
mod client;
mod fetch_error;
mod kufar;
mod models;
mod onliner;

pub use adapter::SourceAdapter;
pub use client::PoliteClient;
pub use fetch_error::FetchError;
pub use kufar::KufarAdapter;
pub use onliner::OnlinerAdapter;

use crate::config::FetchConfig;
use std::sync::Arc;

/// The production adapter set, sharing one HTTP client configuration.
pub fn default_adapters(cfg: &FetchConfig) -> Result<Vec<Arc<dyn SourceAdapter>>, FetchError> {
    Ok(vec![
        Arc::new(KufarAdapter::new(PoliteClient::new(cfg)?, cfg.per_fetch_limit)),
        Arc::new(OnlinerAdapter::new(PoliteClient::new(cfg)?, cfg.per_fetch_limit)),
    ])
}
