// errors.rs
use std::collections::BTreeMap;

/// Errors originating from either the server logic
/// (routing, validation, moderation) or downstream layers (DB).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Not Found")]
    NotFound,
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),
    #[error("Forbidden")]
    Forbidden,
    #[error("A fetch cycle is already running")]
    Busy,
    #[error("Database Error: {0}")]
    DbError(String),
    #[error("Internal Server Error")]
    InternalError,
}

/// Field name -> human readable message. Ordered so responses are stable.
pub type FieldErrors = BTreeMap<String, String>;

impl ServerError {
    /// Stable error kind surfaced to API callers.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::NotFound => "not_found",
            ServerError::BadRequest(_) => "bad_request",
            ServerError::Validation(_) => "validation",
            ServerError::Forbidden => "forbidden",
            ServerError::Busy => "busy",
            ServerError::DbError(_) | ServerError::InternalError => "internal",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ServerError::NotFound => 404,
            ServerError::BadRequest(_) | ServerError::Validation(_) => 400,
            ServerError::Forbidden => 403,
            ServerError::Busy => 409,
            ServerError::DbError(_) | ServerError::InternalError => 500,
        }
    }
}

impl From<rusqlite::Error> for ServerError {
    fn from(e: rusqlite::Error) -> Self {
        ServerError::DbError(e.to_string())
    }
}
