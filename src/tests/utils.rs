use crate::config::AppConfig;
use crate::db::connection::{init_db, Database};
use crate::db::listings::upsert_batch;
use crate::domain::listing::{Candidate, RoomCount, Source};
use crate::notify::RecordingNotifier;
use crate::pipeline::FetchOrchestrator;
use crate::responses::error_response;
use crate::router::handle;
use crate::scraper::SourceAdapter;
use crate::state::AppState;
use crate::uploads::DiskImageStore;
use astra::{Body, Response};
use chrono::{DateTime, Utc};
use http::{Method, Request};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

pub const MODERATOR: i64 = 500;
pub const BOUNDARY: &str = "----rent-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    _dir: tempfile::TempDir,
}

/// Fresh database, upload dir and recording notifier in a temp directory.
pub fn test_app() -> TestApp {
    test_app_with(vec![])
}

pub fn test_app_with(adapters: Vec<Arc<dyn SourceAdapter>>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("app.sqlite3").to_string_lossy().to_string());
    init_db(&db, "sql/schema.sql")
        .unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    let config = AppConfig {
        moderator_ids: vec![MODERATOR],
        public_base_url: "https://rent.test".into(),
        upload_dir: dir.path().join("uploads"),
        ..Default::default()
    };
    let orchestrator = Arc::new(FetchOrchestrator::new(
        db.clone(),
        adapters,
        config.cities.clone(),
        2,
        Duration::from_secs(2),
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let images = Arc::new(DiskImageStore::new(&config.upload_dir).unwrap());

    TestApp {
        state: AppState {
            db,
            config: Arc::new(config),
            orchestrator,
            notifier: notifier.clone(),
            images,
        },
        notifier,
        _dir: dir,
    }
}

impl TestApp {
    /// Route a request the way the server closure does, errors included.
    pub fn send(&self, req: Request<Body>) -> Response {
        match handle(req, &self.state) {
            Ok(resp) => resp,
            Err(err) => error_response(err),
        }
    }

    pub fn get(&self, uri: &str) -> Response {
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(req)
    }

    pub fn post_json(&self, uri: &str, value: serde_json::Value) -> Response {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap();
        self.send(req)
    }

    /// `fields` are plain text parts; `files` are (file name, bytes) under `images`.
    pub fn post_multipart(&self, uri: &str, fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> Response {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(fields, files)))
            .unwrap();
        self.send(req)
    }

    pub fn seed(&self, candidates: &[Candidate], now: DateTime<Utc>) {
        upsert_batch(&self.state.db, candidates, now).unwrap();
    }
}

pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    for (file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn body_json(resp: Response) -> serde_json::Value {
    let mut body = String::new();
    resp.into_body().reader().read_to_string(&mut body).unwrap();
    serde_json::from_str(&body).unwrap_or_else(|e| panic!("not JSON ({e}): {body}"))
}

pub fn candidate(source: Source, url: &str, city: &str, price: Option<i64>, rooms: RoomCount) -> Candidate {
    Candidate {
        identity_url: url.to_string(),
        source,
        city: city.to_string(),
        price,
        rooms,
        address: "Nemiga 3".into(),
        image_ref: None,
        title: Some("flat".into()),
        description: "flat".into(),
        area: None,
        owner_ref: None,
    }
}
