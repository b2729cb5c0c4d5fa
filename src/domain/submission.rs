// src/domain/submission.rs

use crate::domain::listing::{Candidate, RoomCount, Source, UNSPECIFIED_ADDRESS};
use crate::errors::FieldErrors;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub fn from_db(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(SubmissionStatus::Pending),
            "approved" => Some(SubmissionStatus::Approved),
            "rejected" => Some(SubmissionStatus::Rejected),
            _ => None,
        }
    }
}

/// Moderator decision on a pending submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "approve" => Some(ModerationAction::Approve),
            "reject" => Some(ModerationAction::Reject),
            _ => None,
        }
    }

    pub fn target_status(self) -> SubmissionStatus {
        match self {
            ModerationAction::Approve => SubmissionStatus::Approved,
            ModerationAction::Reject => SubmissionStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmission {
    pub id: i64,
    pub submitter_ref: i64,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub room_count: RoomCount,
    pub area: Option<f64>,
    pub city: String,
    pub address: String,
    pub image_filenames: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
}

impl PendingSubmission {
    /// Identity of the catalog row an approved submission turns into.
    /// Derived from the surrogate id only, so it can never collide with a scraped URL
    /// or with another submission.
    pub fn identity_url(&self, public_base_url: &str) -> String {
        format!("{}/listing_{}", public_base_url.trim_end_matches('/'), self.id)
    }

    pub fn to_candidate(&self, public_base_url: &str) -> Candidate {
        Candidate {
            identity_url: self.identity_url(public_base_url),
            source: Source::UserSubmitted,
            city: self.city.clone(),
            price: Some(self.price),
            rooms: self.room_count,
            address: self.address.clone(),
            image_ref: self.image_filenames.first().cloned(),
            title: Some(self.title.clone()),
            description: self.description.clone(),
            area: self.area,
            owner_ref: Some(self.submitter_ref),
        }
    }
}

/// Raw form values as received from the client. Everything is text.
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub submitter_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub rooms: Option<String>,
    pub area: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
}

/// A submission that passed validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub submitter_ref: i64,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub room_count: RoomCount,
    pub area: Option<f64>,
    pub city: String,
    pub address: String,
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl SubmissionForm {
    /// Validate every field at once so the client gets all problems in one round trip.
    pub fn validate(&self, is_known_city: impl Fn(&str) -> bool) -> Result<NewSubmission, FieldErrors> {
        let mut errors = FieldErrors::new();

        let submitter_ref = match non_blank(&self.submitter_id).map(str::parse::<i64>) {
            Some(Ok(id)) => Some(id),
            Some(Err(_)) => {
                errors.insert("submitterId".into(), "must be a numeric user id".into());
                None
            }
            None => {
                errors.insert("submitterId".into(), "is required".into());
                None
            }
        };

        let title = match non_blank(&self.title) {
            Some(t) if t.chars().count() > TITLE_MAX_CHARS => {
                errors.insert("title".into(), format!("must be at most {TITLE_MAX_CHARS} characters"));
                None
            }
            Some(t) => Some(t.to_string()),
            None => {
                errors.insert("title".into(), "is required".into());
                None
            }
        };

        let description = non_blank(&self.description).unwrap_or_default().to_string();
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            errors.insert(
                "description".into(),
                format!("must be at most {DESCRIPTION_MAX_CHARS} characters"),
            );
        }

        let price = match non_blank(&self.price).map(str::parse::<i64>) {
            Some(Ok(p)) if p >= 0 => Some(p),
            Some(_) => {
                errors.insert("price".into(), "must be a non-negative whole number".into());
                None
            }
            None => {
                errors.insert("price".into(), "is required".into());
                None
            }
        };

        let room_count = match non_blank(&self.rooms).map(RoomCount::parse_token) {
            Some(Some(r)) if r != RoomCount::Unknown => Some(r),
            Some(_) => {
                errors.insert("rooms".into(), "must be a number, \"4+\" or \"studio\"".into());
                None
            }
            None => {
                errors.insert("rooms".into(), "is required".into());
                None
            }
        };

        let area = match non_blank(&self.area).map(|a| a.replace(',', ".").parse::<f64>()) {
            Some(Ok(a)) if a > 0.0 && a.is_finite() => Some(a),
            Some(_) => {
                errors.insert("area".into(), "must be a positive number".into());
                None
            }
            None => None,
        };

        let city = match non_blank(&self.city).map(str::to_lowercase) {
            Some(c) if is_known_city(&c) => Some(c),
            Some(_) => {
                errors.insert("city".into(), "is not a supported city".into());
                None
            }
            None => {
                errors.insert("city".into(), "is required".into());
                None
            }
        };

        let address = non_blank(&self.address)
            .unwrap_or(UNSPECIFIED_ADDRESS)
            .to_string();

        match (submitter_ref, title, price, room_count, city) {
            (Some(submitter_ref), Some(title), Some(price), Some(room_count), Some(city))
                if errors.is_empty() =>
            {
                Ok(NewSubmission {
                    submitter_ref,
                    title,
                    description,
                    price,
                    room_count,
                    area,
                    city,
                    address,
                })
            }
            _ => Err(errors),
        }
    }
}
