/// Why one adapter x city call produced nothing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Anti-automation challenge or refusal (403/429, captcha page).
    #[error("Blocked by site: {0}")]
    Blocked(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timed out")]
    Timeout,
    /// The page was fine and simply had no matching listings.
    #[error("No listings matched")]
    EmptyResult,
    /// The page arrived but its envelope could not be read at all.
    #[error("Malformed page: {0}")]
    Malformed(String),
    #[error("City not covered by this source: {0}")]
    UnsupportedCity(String),
}

impl FetchError {
    /// Short label used in logs and the fetch-run summary.
    pub fn label(&self) -> &'static str {
        match self {
            FetchError::Blocked(_) => "blocked",
            FetchError::Network(_) => "network",
            FetchError::Timeout => "timeout",
            FetchError::EmptyResult => "empty",
            FetchError::Malformed(_) => "malformed",
            FetchError::UnsupportedCity(_) => "unsupported_city",
        }
    }

    /// Outcomes that are expected in normal operation and should not page anyone.
    pub fn is_benign(&self) -> bool {
        matches!(self, FetchError::EmptyResult | FetchError::UnsupportedCity(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(e.to_string())
        }
    }
}
