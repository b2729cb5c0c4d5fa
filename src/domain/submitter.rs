// src/domain/submitter.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A chat-platform user who may submit listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submitter {
    pub id: i64,
    pub display_name: String,
    pub registered_at: DateTime<Utc>,
}
