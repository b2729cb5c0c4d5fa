// src/domain/listing.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder stored when a source gives no usable address.
pub const UNSPECIFIED_ADDRESS: &str = "unspecified";

/// Where a catalog row came from. One tag per external adapter plus user submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "kufar")]
    Kufar,
    #[serde(rename = "onliner")]
    Onliner,
    #[serde(rename = "user")]
    UserSubmitted,
}

impl Source {
    /// Fixed presentation order; also the order pages are concatenated in.
    pub const ALL: [Source; 3] = [Source::Kufar, Source::Onliner, Source::UserSubmitted];

    /// Stable key used in the database, query params and JSON.
    pub fn key(self) -> &'static str {
        match self {
            Source::Kufar => "kufar",
            Source::Onliner => "onliner",
            Source::UserSubmitted => "user",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Source::ALL.into_iter().find(|s| s.key() == key)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Normalized room count. Everything from four rooms up collapses into `FourPlus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomCount {
    #[serde(rename = "studio")]
    Studio,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4+")]
    FourPlus,
    #[serde(rename = "unknown")]
    Unknown,
}

impl RoomCount {
    pub fn from_number(n: u32) -> Self {
        match n {
            0 => RoomCount::Studio,
            1 => RoomCount::One,
            2 => RoomCount::Two,
            3 => RoomCount::Three,
            _ => RoomCount::FourPlus,
        }
    }

    /// Column value in `listings.rooms` / `pending_submissions.rooms`.
    pub fn as_str(self) -> &'static str {
        match self {
            RoomCount::Studio => "studio",
            RoomCount::One => "1",
            RoomCount::Two => "2",
            RoomCount::Three => "3",
            RoomCount::FourPlus => "4+",
            RoomCount::Unknown => "unknown",
        }
    }

    /// Parse a client-supplied token: `studio`, `4+`, or a plain number.
    /// Returns `None` for anything else.
    pub fn parse_token(raw: &str) -> Option<Self> {
        let token = raw.trim().to_lowercase();
        match token.as_str() {
            "studio" => Some(RoomCount::Studio),
            "4+" => Some(RoomCount::FourPlus),
            "unknown" => Some(RoomCount::Unknown),
            other => other.parse::<u32>().ok().map(RoomCount::from_number),
        }
    }

    /// Read back a stored column value. Legacy numeric values >= 4 map to `FourPlus`.
    pub fn from_db(raw: &str) -> Self {
        RoomCount::parse_token(raw).unwrap_or(RoomCount::Unknown)
    }
}

impl fmt::Display for RoomCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unpersisted record produced by a source adapter (or by an approved submission).
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub identity_url: String,
    pub source: Source,
    pub city: String,
    pub price: Option<i64>,
    pub rooms: RoomCount,
    pub address: String,
    pub image_ref: Option<String>,
    pub title: Option<String>,
    pub description: String,
    pub area: Option<f64>,
    pub owner_ref: Option<i64>,
}

/// Canonical catalog row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub identity_url: String,
    pub source: Source,
    pub city: String,
    pub price: Option<i64>,
    pub room_count: RoomCount,
    pub address: String,
    pub image_ref: Option<String>,
    pub title: Option<String>,
    pub description: String,
    pub area: Option<f64>,
    pub owner_ref: Option<i64>,
    pub is_new: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Price/room constraints shared by adapters (post-fetch check) and the query layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub city: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub rooms: Option<RoomCount>,
}

impl SearchFilter {
    /// Closed post-fetch check: no price never passes, and an unknown room
    /// count fails any room constraint.
    pub fn admits(&self, price: Option<i64>, rooms: RoomCount) -> bool {
        let Some(price) = price else {
            return false;
        };
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        match self.rooms {
            None => true,
            Some(_) if rooms == RoomCount::Unknown => false,
            Some(wanted) => wanted == rooms,
        }
    }
}
