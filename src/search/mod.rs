use color_eyre::eyre::Result;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::fetch::{get_json, Fetcher};

/// The fields of a search hit the cli shows. The api envelope itself is
/// handed back untouched by [`search`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    pub id: Option<u64>,
    pub title: String,
    pub session: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub episodes: Option<u32>,
    pub year: Option<u32>,
}

pub fn search_url(origin: &str, title: &str) -> Result<Url> {
    Ok(Url::parse_with_params(
        &format!("{origin}/api"),
        &[("m", "search"), ("q", title)],
    )?)
}

/// Query the search api once. Any failure is logged and yields `None`.
pub async fn search(fetcher: &dyn Fetcher, origin: &str, title: &str) -> Option<Value> {
    let result = match search_url(origin, title) {
        Ok(url) => get_json::<Value>(fetcher, url.as_str(), &format!("{origin}/")).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!("search {title:?} failed: {e}");
            None
        }
    }
}

/// Hits in an envelope, skipping entries that lack a title or session.
pub fn hits(envelope: &Value) -> Vec<SearchHit> {
    envelope
        .get("data")
        .and_then(Value::as_array)
        .map(|data| {
            data.iter()
                .filter_map(|hit| serde_json::from_value(hit.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
