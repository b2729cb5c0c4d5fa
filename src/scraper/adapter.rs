use crate::domain::listing::{Candidate, SearchFilter, Source};
use crate::scraper::FetchError;
use std::time::Instant;

/// One external listing source. Everything site-specific (URLs, payload
/// shapes, which field holds the price) lives behind this trait.
///
/// Implementations must:
/// - skip items that fail to parse instead of failing the whole call
/// - re-apply `filter` to parsed items via [`SearchFilter::admits`]
/// - report a challenge page as `Blocked`, and a clean zero-result page as `EmptyResult`
/// - start no request once `deadline` has passed; the caller has stopped waiting by then
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    fn fetch(&self, city: &str, filter: &SearchFilter, deadline: Instant) -> Result<Vec<Candidate>, FetchError>;
}

/// Apply the shared post-fetch rules to parsed items: closed filter, then the per-call cap.
pub fn finish_candidates(
    parsed: Vec<Candidate>,
    filter: &SearchFilter,
    limit: usize,
) -> Result<Vec<Candidate>, FetchError> {
    let kept: Vec<Candidate> = parsed
        .into_iter()
        .filter(|c| {
            let ok = filter.admits(c.price, c.rooms);
            if !ok {
                tracing::trace!(identity_url = %c.identity_url, price = ?c.price, rooms = %c.rooms, "filtered out");
            }
            ok
        })
        .take(limit)
        .collect();

    if kept.is_empty() {
        return Err(FetchError::EmptyResult);
    }
    Ok(kept)
}
