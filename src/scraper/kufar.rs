// kufar.rs
use crate::domain::listing::{Candidate, RoomCount, SearchFilter, Source, UNSPECIFIED_ADDRESS};
use crate::domain::parse::{clean_text, first_price, parse_area, parse_room_count};
use crate::scraper::adapter::{finish_candidates, SourceAdapter};
use crate::scraper::client::{looks_like_challenge, PoliteClient};
use crate::scraper::models::KufarAd;
use crate::scraper::FetchError;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Instant;
use url::Url;

const BASE_URL: &str = "https://re.kufar.by/l";
const IMAGE_BASE: &str = "https://rms.kufar.by/v1/gallery";

pub struct KufarAdapter {
    client: PoliteClient,
    limit: usize,
}

impl KufarAdapter {
    pub fn new(client: PoliteClient, limit: usize) -> Self {
        Self { client, limit }
    }

    /// Search URL for a city. Filters are passed as a hint only; results are re-checked locally.
    pub fn search_url(city: &str, filter: &SearchFilter) -> Result<Url, FetchError> {
        let mut path = format!("{BASE_URL}/{city}/snyat/kvartiru-dolgosrochno");
        match filter.rooms {
            Some(RoomCount::One) => path.push_str("/1k"),
            Some(RoomCount::Two) => path.push_str("/2k"),
            Some(RoomCount::Three) => path.push_str("/3k"),
            _ => {}
        }

        let mut url = Url::parse(&path).map_err(|e| FetchError::Malformed(e.to_string()))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("cur", "USD");
            q.append_pair("sort", "lst.d");
            if filter.min_price.is_some() || filter.max_price.is_some() {
                let min = filter.min_price.map(|p| p.to_string()).unwrap_or_default();
                let max = filter.max_price.map(|p| p.to_string()).unwrap_or_default();
                q.append_pair("prc", &format!("r:{min},{max}"));
            }
        }
        Ok(url)
    }

    /// Pull the `__NEXT_DATA__` blob out of the page.
    fn extract_next_data(html: &str) -> Result<Value, FetchError> {
        let document = Html::parse_document(html);
        let selector = Selector::parse(r#"script[id="__NEXT_DATA__"]"#)
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        let Some(element) = document.select(&selector).next() else {
            if looks_like_challenge(html) {
                return Err(FetchError::Blocked("challenge page instead of listings".into()));
            }
            return Err(FetchError::Malformed("__NEXT_DATA__ not found".into()));
        };

        let json_text: String = element.text().collect();
        serde_json::from_str(&json_text).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    /// Parse every ad on the page, skipping the ones that don't fit the model.
    pub fn parse_page(html: &str, city: &str) -> Result<Vec<Candidate>, FetchError> {
        let data = Self::extract_next_data(html)?;
        let Some(ads) = data["props"]["initialState"]["listing"]["ads"].as_array() else {
            return Err(FetchError::Malformed("listing.ads missing".into()));
        };
        if ads.is_empty() {
            return Err(FetchError::EmptyResult);
        }

        let mut out = Vec::with_capacity(ads.len());
        for (i, raw) in ads.iter().enumerate() {
            let parsed = serde_json::from_value::<KufarAd>(raw.clone())
                .map_err(|e| e.to_string())
                .and_then(|ad| to_candidate(&ad, city));
            match parsed {
                Ok(c) => out.push(c),
                Err(e) => tracing::debug!(source = "kufar", index = i, error = %e, "skipping unparseable ad"),
            }
        }
        Ok(out)
    }
}

fn param_text(ad: &KufarAd, key: &str) -> Option<String> {
    ad.ad_parameters
        .iter()
        .chain(ad.account_parameters.iter())
        .find(|p| p.p == key)
        .and_then(|p| p.text())
}

fn to_candidate(ad: &KufarAd, city: &str) -> Result<Candidate, String> {
    let link = ad.ad_link.trim();
    if link.is_empty() {
        return Err("empty ad_link".into());
    }

    let price = first_price([ad.price_usd.as_deref(), ad.price_byn.as_deref()]);

    let rooms = match param_text(ad, "rooms") {
        Some(text) => parse_room_count(&text),
        None => ad
            .subject
            .as_deref()
            .map(parse_room_count)
            .unwrap_or(RoomCount::Unknown),
    };

    let area = param_text(ad, "size")
        .and_then(|s| s.replace(',', ".").split_whitespace().next()?.parse::<f64>().ok())
        .filter(|a| *a > 0.0)
        .or_else(|| ad.subject.as_deref().and_then(parse_area));

    let address = clean_text(param_text(ad, "address").as_deref())
        .unwrap_or_else(|| UNSPECIFIED_ADDRESS.to_string());

    let image_ref = ad
        .images
        .iter()
        .find_map(|i| i.path.as_deref())
        .map(|p| format!("{IMAGE_BASE}/{}", p.trim_start_matches('/')));

    let title = clean_text(ad.subject.as_deref());
    let description = clean_text(ad.body_short.as_deref())
        .or_else(|| title.clone())
        .unwrap_or_default();

    Ok(Candidate {
        identity_url: link.to_string(),
        source: Source::Kufar,
        city: city.to_string(),
        price,
        rooms,
        address,
        image_ref,
        title,
        description,
        area,
        owner_ref: None,
    })
}

impl SourceAdapter for KufarAdapter {
    fn source(&self) -> Source {
        Source::Kufar
    }

    fn fetch(&self, city: &str, filter: &SearchFilter, deadline: Instant) -> Result<Vec<Candidate>, FetchError> {
        let url = Self::search_url(city, filter)?;
        tracing::info!(source = "kufar", city, %url, "requesting listings");

        let html = self.client.get_text(&url, deadline)?;
        let parsed = Self::parse_page(&html, city)?;
        let found = parsed.len();
        let kept = finish_candidates(parsed, filter, self.limit)?;

        tracing::info!(source = "kufar", city, found, kept = kept.len(), "parsed listings");
        Ok(kept)
    }
}
