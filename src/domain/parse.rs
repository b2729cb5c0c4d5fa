// src/domain/parse.rs
//
// Text normalization shared by every source adapter. Site-specific code only
// decides *which* strings to hand in here.

use crate::domain::listing::RoomCount;
use regex::Regex;
use std::sync::OnceLock;

fn trailing_fraction() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.,]\d{1,2}\D*$").expect("valid regex"))
}

fn numbered_rooms() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s*[-_]?\s*(?:rooms?|комн|bedrooms?|br\b)").expect("valid regex")
    })
}

fn area_value() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:[.,]\d+)?)\s*(?:m²|m2|м²|м2|sq\.?\s?m)").expect("valid regex")
    })
}

/// Extract a price by stripping every non-digit character.
///
/// A trailing one- or two-digit decimal fraction ("450.00", "$99,5") is cut
/// off first so cents never inflate the amount. Thousands separators are
/// three digits wide and survive that step.
pub fn parse_price(text: &str) -> Option<i64> {
    let text = text.trim();
    let whole = match trailing_fraction().find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    };
    let digits: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok()
}

/// Price from the first field that actually carries digits.
pub fn first_price<'a, I>(fields: I) -> Option<i64>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    fields
        .into_iter()
        .flatten()
        .find(|f| f.chars().any(|c| c.is_ascii_digit()))
        .and_then(parse_price)
}

/// Ordered matching: studio marker, then "N-room" style, then a bare number / "4+".
pub fn parse_room_count(text: &str) -> RoomCount {
    let lower = text.trim().to_lowercase();
    if lower.contains("studio") || lower.contains("студи") {
        return RoomCount::Studio;
    }
    if let Some(n) = numbered_rooms()
        .captures(&lower)
        .and_then(|c| c[1].parse::<u32>().ok())
    {
        return RoomCount::from_number(n);
    }
    if lower == "4+" {
        return RoomCount::FourPlus;
    }
    lower
        .parse::<u32>()
        .map(RoomCount::from_number)
        .unwrap_or(RoomCount::Unknown)
}

/// Living area in square metres, if the text mentions one.
pub fn parse_area(text: &str) -> Option<f64> {
    let caps = area_value().captures(text)?;
    let value: f64 = caps[1].replace(',', ".").parse().ok()?;
    (value > 0.0).then_some(value)
}

/// Trimmed non-empty text, or `None`.
pub fn clean_text(text: Option<&str>) -> Option<String> {
    let joined = text?.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}
