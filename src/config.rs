// src/config.rs
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CITIES: &[&str] = &["minsk", "brest", "grodno", "gomel", "vitebsk", "mogilev"];

/// Immutable application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub server_workers: usize,
    pub database_path: String,
    pub schema_path: String,
    pub upload_dir: PathBuf,
    /// Prefix for identity URLs of approved user submissions.
    pub public_base_url: String,
    pub cities: Vec<String>,
    pub moderator_ids: Vec<i64>,
    pub telegram_token: Option<String>,
    pub fetch: FetchConfig,
    pub pages: PageSizes,
    pub max_images: usize,
}

/// Knobs for the scraping side.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub interval: Duration,
    /// Time limit for one adapter x city call.
    pub call_timeout: Duration,
    pub max_parallel: usize,
    pub request_timeout: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    pub per_fetch_limit: usize,
}

/// Per-source page sizes: bigger first page, smaller "load more" pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    pub initial: usize,
    pub more: usize,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self { initial: 7, more: 5 }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            call_timeout: Duration::from_secs(60),
            max_parallel: 4,
            request_timeout: Duration::from_secs(15),
            jitter_min: Duration::from_millis(500),
            jitter_max: Duration::from_millis(2500),
            per_fetch_limit: 20,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            server_workers: 8,
            database_path: "listings.sqlite3".to_string(),
            schema_path: "sql/schema.sql".to_string(),
            upload_dir: PathBuf::from("uploads"),
            public_base_url: "http://127.0.0.1:3000".to_string(),
            cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
            moderator_ids: Vec::new(),
            telegram_token: None,
            fetch: FetchConfig::default(),
            pages: PageSizes::default(),
            max_images: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let d = Self::default();

        let fetch = FetchConfig {
            interval: fetch_interval(parse_var("FETCH_INTERVAL_MINS", 30u64)?)?,
            call_timeout: Duration::from_secs(parse_var("FETCH_TIMEOUT_SECS", 60u64)?),
            max_parallel: parse_var("MAX_PARALLEL_FETCHES", d.fetch.max_parallel)?.max(1),
            request_timeout: Duration::from_secs(parse_var("REQUEST_TIMEOUT_SECS", 15u64)?),
            jitter_min: Duration::from_millis(parse_var("JITTER_MIN_MS", 500u64)?),
            jitter_max: Duration::from_millis(parse_var("JITTER_MAX_MS", 2500u64)?),
            per_fetch_limit: parse_var("PER_FETCH_LIMIT", d.fetch.per_fetch_limit)?,
        };
        if fetch.jitter_max < fetch.jitter_min {
            anyhow::bail!("JITTER_MAX_MS must be >= JITTER_MIN_MS");
        }

        let pages = PageSizes {
            initial: parse_var("INITIAL_PAGE_SIZE", d.pages.initial)?.max(1),
            more: parse_var("MORE_PAGE_SIZE", d.pages.more)?.max(1),
        };

        let cities = match env::var("CITIES") {
            Ok(raw) => split_list(&raw).map(|c| c.to_lowercase()).collect(),
            Err(_) => d.cities,
        };

        let moderator_ids = match env::var("MODERATOR_IDS") {
            Ok(raw) => split_list(&raw)
                .map(|id| {
                    id.parse::<i64>()
                        .with_context(|| format!("MODERATOR_IDS contains a non-numeric id: {id}"))
                })
                .collect::<Result<Vec<_>>>()?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            bind_addr: parse_var("BIND_ADDR", d.bind_addr)?,
            server_workers: parse_var("SERVER_WORKERS", d.server_workers)?.max(1),
            database_path: env::var("DATABASE_PATH").unwrap_or(d.database_path),
            schema_path: env::var("SCHEMA_PATH").unwrap_or(d.schema_path),
            upload_dir: env::var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(d.upload_dir),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(d.public_base_url),
            cities,
            moderator_ids,
            telegram_token: env::var("TELEGRAM_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            fetch,
            pages,
            max_images: parse_var("MAX_IMAGES", d.max_images)?,
        })
    }

    pub fn is_moderator(&self, actor_id: i64) -> bool {
        self.moderator_ids.contains(&actor_id)
    }

    pub fn is_known_city(&self, city: &str) -> bool {
        self.cities.iter().any(|c| c == city)
    }
}

/// Minutes between scheduled cycles; zero would run cycles back to back.
fn fetch_interval(mins: u64) -> Result<Duration> {
    if mins == 0 {
        anyhow::bail!("FETCH_INTERVAL_MINS must be at least 1");
    }
    let secs = mins
        .checked_mul(60)
        .with_context(|| format!("FETCH_INTERVAL_MINS is too large: {mins}"))?;
    Ok(Duration::from_secs(secs))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
