// onliner.rs
use crate::domain::listing::{Candidate, RoomCount, SearchFilter, Source, UNSPECIFIED_ADDRESS};
use crate::domain::parse::{clean_text, first_price, parse_room_count};
use crate::scraper::adapter::{finish_candidates, SourceAdapter};
use crate::scraper::client::{looks_like_challenge, PoliteClient};
use crate::scraper::models::{OnlinerApartment, OnlinerPage};
use crate::scraper::FetchError;
use std::time::Instant;
use url::Url;

const SEARCH_URL: &str = "https://r.onliner.by/sdapi/ak.api/search/apartments";
const LISTING_URL: &str = "https://r.onliner.by/ak/apartments";

/// Map bounds per city: (lat_sw, long_sw, lat_ne, long_ne).
const CITY_BOUNDS: &[(&str, [f64; 4])] = &[
    ("minsk", [53.7, 27.3, 54.1, 27.8]),
    ("brest", [52.0, 23.55, 52.16, 23.85]),
    ("grodno", [53.6, 23.7, 53.75, 23.95]),
    ("gomel", [52.35, 30.85, 52.5, 31.1]),
    ("vitebsk", [55.12, 30.1, 55.26, 30.35]),
    ("mogilev", [53.83, 30.2, 53.97, 30.45]),
];

pub struct OnlinerAdapter {
    client: PoliteClient,
    limit: usize,
}

impl OnlinerAdapter {
    pub fn new(client: PoliteClient, limit: usize) -> Self {
        Self { client, limit }
    }

    pub fn search_url(city: &str, filter: &SearchFilter) -> Result<Url, FetchError> {
        let Some((_, [lat_sw, long_sw, lat_ne, long_ne])) =
            CITY_BOUNDS.iter().find(|(name, _)| *name == city)
        else {
            return Err(FetchError::UnsupportedCity(city.to_string()));
        };

        let mut url = Url::parse(SEARCH_URL).map_err(|e| FetchError::Malformed(e.to_string()))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("currency", "usd");
            q.append_pair("order", "created_at:desc");
            q.append_pair("bounds[lb][lat]", &lat_sw.to_string());
            q.append_pair("bounds[lb][long]", &long_sw.to_string());
            q.append_pair("bounds[rt][lat]", &lat_ne.to_string());
            q.append_pair("bounds[rt][long]", &long_ne.to_string());
            if let Some(min) = filter.min_price {
                q.append_pair("price[min]", &min.to_string());
            }
            if let Some(max) = filter.max_price {
                q.append_pair("price[max]", &max.to_string());
            }
            let rent_type = match filter.rooms {
                Some(RoomCount::One) => Some("1_room"),
                Some(RoomCount::Two) => Some("2_rooms"),
                Some(RoomCount::Three) => Some("3_rooms"),
                Some(RoomCount::FourPlus) => Some("4_rooms"),
                _ => None,
            };
            if let Some(rt) = rent_type {
                q.append_pair("rent_type[]", rt);
            }
        }
        Ok(url)
    }

    pub fn parse_response(body: &str, city: &str) -> Result<Vec<Candidate>, FetchError> {
        let page: OnlinerPage = match serde_json::from_str(body) {
            Ok(p) => p,
            Err(e) if looks_like_challenge(body) => {
                return Err(FetchError::Blocked(format!("non-JSON challenge response: {e}")))
            }
            Err(e) => return Err(FetchError::Malformed(e.to_string())),
        };

        if page.apartments.is_empty() {
            return Err(FetchError::EmptyResult);
        }
        tracing::debug!(source = "onliner", city, total = ?page.total, on_page = page.apartments.len(), "search response");

        let mut out = Vec::with_capacity(page.apartments.len());
        for (i, raw) in page.apartments.into_iter().enumerate() {
            match serde_json::from_value::<OnlinerApartment>(raw) {
                Ok(apt) => out.push(to_candidate(apt, city)),
                Err(e) => tracing::debug!(source = "onliner", index = i, error = %e, "skipping unparseable apartment"),
            }
        }
        Ok(out)
    }
}

fn to_candidate(apt: OnlinerApartment, city: &str) -> Candidate {
    let identity_url = apt
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{LISTING_URL}/{}", apt.id));

    let price = apt.price.as_ref().and_then(|p| {
        let usd = p.converted.get("USD").and_then(|a| a.amount.as_deref());
        let own = p
            .currency
            .as_deref()
            .filter(|c| c.eq_ignore_ascii_case("usd"))
            .and(p.amount.as_deref());
        first_price([usd, own])
    });

    let rooms = apt
        .rent_type
        .as_deref()
        .map(parse_room_count)
        .unwrap_or(RoomCount::Unknown);

    let (address, user_address) = match apt.location {
        Some(loc) => (loc.address, loc.user_address),
        None => (None, None),
    };
    let address = clean_text(user_address.as_deref())
        .or_else(|| clean_text(address.as_deref()))
        .unwrap_or_else(|| UNSPECIFIED_ADDRESS.to_string());

    let title = apt
        .rent_type
        .as_deref()
        .map(|rt| format!("Apartment, {}", rt.replace('_', " ")));

    Candidate {
        identity_url,
        source: Source::Onliner,
        city: city.to_string(),
        price,
        rooms,
        description: address.clone(),
        address,
        image_ref: clean_text(apt.photo.as_deref()),
        title,
        area: None,
        owner_ref: None,
    }
}

impl SourceAdapter for OnlinerAdapter {
    fn source(&self) -> Source {
        Source::Onliner
    }

    fn fetch(&self, city: &str, filter: &SearchFilter, deadline: Instant) -> Result<Vec<Candidate>, FetchError> {
        let url = Self::search_url(city, filter)?;
        tracing::info!(source = "onliner", city, %url, "requesting listings");

        let body = self.client.get_text(&url, deadline)?;
        let parsed = Self::parse_response(&body, city)?;
        let found = parsed.len();
        let kept = finish_candidates(parsed, filter, self.limit)?;

        tracing::info!(source = "onliner", city, found, kept = kept.len(), "parsed listings");
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "apartments": [
            {"id": 101, "url": "https://r.onliner.by/ak/apartments/101",
             "price": {"amount": "1500.00", "currency": "BYN", "converted": {"USD": {"amount": "460.00"}}},
             "rent_type": "2_rooms",
             "location": {"address": "Минск, Притыцкого 10", "user_address": "Притыцкого 10"},
             "photo": "https://content.onliner.by/apartment_rentals/1.jpeg"},
            {"url": "missing id"},
            {"id": 103, "price": {"amount": "300.00", "currency": "USD"}, "rent_type": "room"},
            {"id": 104, "rent_type": "5_rooms"}
        ],
        "total": 3
    }"#;

    #[test]
    fn parses_apartments() {
        let out = OnlinerAdapter::parse_response(BODY, "minsk").unwrap();
        assert_eq!(out.len(), 3);

        let a = &out[0];
        assert_eq!(a.identity_url, "https://r.onliner.by/ak/apartments/101");
        assert_eq!(a.price, Some(460));
        assert_eq!(a.rooms, RoomCount::Two);
        assert_eq!(a.address, "Притыцкого 10");
        assert!(a.image_ref.is_some());

        let b = &out[1];
        assert_eq!(b.identity_url, "https://r.onliner.by/ak/apartments/103");
        assert_eq!(b.price, Some(300));
        assert_eq!(b.rooms, RoomCount::Unknown);
        assert_eq!(b.address, UNSPECIFIED_ADDRESS);

        assert_eq!(out[2].rooms, RoomCount::FourPlus);
        assert_eq!(out[2].price, None);
    }

    #[test]
    fn empty_list_is_empty_result() {
        assert_eq!(
            OnlinerAdapter::parse_response(r#"{"apartments": [], "total": 0}"#, "minsk"),
            Err(FetchError::EmptyResult)
        );
    }

    #[test]
    fn html_challenge_is_blocked() {
        let body = "<html><title>Just a moment...</title></html>";
        assert!(matches!(
            OnlinerAdapter::parse_response(body, "minsk"),
            Err(FetchError::Blocked(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            OnlinerAdapter::parse_response("not json", "minsk"),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_city_is_unsupported() {
        assert_eq!(
            OnlinerAdapter::search_url("pinsk", &SearchFilter::default()),
            Err(FetchError::UnsupportedCity("pinsk".into()))
        );
    }

    #[test]
    fn search_url_has_price_and_rooms() {
        let filter = SearchFilter {
            max_price: Some(500),
            rooms: Some(RoomCount::One),
            ..Default::default()
        };
        let url = OnlinerAdapter::search_url("minsk", &filter).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("price[max]".into(), "500".into())));
        assert!(pairs.contains(&("rent_type[]".into(), "1_room".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "price[min]"));
    }
}
