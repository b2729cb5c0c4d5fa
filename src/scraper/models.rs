use serde::Deserialize;
use std::collections::HashMap;

// Kufar page: <script id="__NEXT_DATA__"> JSON
//
// props
//  └── initialState
//       └── listing
//            └── ads[]
//                 ├── ad_link
//                 ├── subject
//                 ├── body_short
//                 ├── price_usd / price_byn
//                 ├── ad_parameters[]      { p, v, vl }
//                 ├── account_parameters[] { p, v }
//                 └── images[]             { path }

#[derive(Debug, Deserialize)]
pub struct KufarAd {
    pub ad_link: String,
    pub subject: Option<String>,
    pub body_short: Option<String>,
    pub price_usd: Option<String>,
    pub price_byn: Option<String>,
    #[serde(default)]
    pub ad_parameters: Vec<KufarParam>,
    #[serde(default)]
    pub account_parameters: Vec<KufarParam>,
    #[serde(default)]
    pub images: Vec<KufarImage>,
}

#[derive(Debug, Deserialize)]
pub struct KufarParam {
    pub p: String,
    /// Raw value; may be a string, number or list depending on the parameter.
    pub v: Option<serde_json::Value>,
    /// Human readable label ("2 комнаты", "45 м²").
    pub vl: Option<serde_json::Value>,
}

impl KufarParam {
    /// Best text rendering of the parameter: label first, raw value second.
    pub fn text(&self) -> Option<String> {
        [self.vl.as_ref(), self.v.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|v| match v {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct KufarImage {
    pub path: Option<String>,
}

// Onliner search API: { apartments: [...], total, page }

#[derive(Debug, Deserialize)]
pub struct OnlinerPage {
    #[serde(default)]
    pub apartments: Vec<serde_json::Value>,
    pub total: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OnlinerApartment {
    pub id: i64,
    pub url: Option<String>,
    pub price: Option<OnlinerPrice>,
    pub rent_type: Option<String>,
    pub location: Option<OnlinerLocation>,
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OnlinerPrice {
    pub amount: Option<String>,
    pub currency: Option<String>,
    #[serde(default)]
    pub converted: HashMap<String, OnlinerAmount>,
}

#[derive(Debug, Deserialize)]
pub struct OnlinerAmount {
    pub amount: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OnlinerLocation {
    pub address: Option<String>,
    pub user_address: Option<String>,
}
