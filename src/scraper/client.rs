// client.rs
use crate::config::FetchConfig;
use crate::scraper::FetchError;
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, REFERER};
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use url::Url;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

/// Lower-cased fragments that only show up on challenge / interstitial pages.
const CHALLENGE_MARKERS: &[&str] = &[
    "captcha",
    "cf-chl",
    "challenge-platform",
    "just a moment...",
    "are you a robot",
    "access denied",
];

/// HTTP client shared by every adapter. Applies the same jittered pause before
/// each request and maps refusals to `FetchError::Blocked`.
pub struct PoliteClient {
    client: Client,
    request_timeout: Duration,
    jitter_min: Duration,
    jitter_max: Duration,
}

impl PoliteClient {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ru-RU,ru;q=0.9,en;q=0.8"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            request_timeout: cfg.request_timeout,
            jitter_min: cfg.jitter_min,
            jitter_max: cfg.jitter_max,
        })
    }

    /// Random pause in `[jitter_min, jitter_max]`.
    pub fn jitter_delay(&self) -> Duration {
        jitter_between(&mut rand::thread_rng(), self.jitter_min, self.jitter_max)
    }

    /// GET `url` after the jittered pause. Neither the pause nor the request
    /// outlives `deadline`.
    pub fn get_text(&self, url: &Url, deadline: Instant) -> Result<String, FetchError> {
        std::thread::sleep(self.jitter_delay().min(time_left(deadline)?));

        let allowed = time_left(deadline)?.min(self.request_timeout);
        let start = Instant::now();
        let resp = self.client.get(url.clone()).timeout(allowed).send()?;
        let status = resp.status();
        let text = resp.text()?;

        tracing::debug!(%url, %status, elapsed = ?start.elapsed(), bytes = text.len(), "fetched page");

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Blocked(format!("HTTP {status} from {url}")));
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP {status} from {url}")));
        }
        Ok(text)
    }
}

pub fn jitter_between<R: Rng>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    Duration::from_millis(rng.gen_range(min_ms..=max_ms))
}

/// Time until `deadline`, or `Timeout` once it has passed.
pub fn time_left(deadline: Instant) -> Result<Duration, FetchError> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
        .ok_or(FetchError::Timeout)
}

/// Does this body look like an anti-bot interstitial instead of content?
pub fn looks_like_challenge(body: &str) -> bool {
    let lower = body.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
}
