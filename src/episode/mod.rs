use color_eyre::eyre::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::fetch::{get_json, Fetcher};

/// One entry of the release api, kept exactly as the site sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeRecord(pub Value);

impl EpisodeRecord {
    /// The episode number, numeric strings included.
    pub fn episode(&self) -> Option<f64> {
        match self.0.get("episode")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Id of the episode's player page.
    pub fn session(&self) -> Option<&str> {
        self.0.get("session").and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct ReleasePage {
    #[serde(default)]
    data: Option<Vec<EpisodeRecord>>,
    #[serde(default)]
    last_page: Value,
}

impl ReleasePage {
    /// Reported page count, 1 when missing or unusable.
    fn last_page(&self) -> u64 {
        let last_page = match &self.last_page {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        last_page.filter(|n| *n > 0).unwrap_or(1)
    }
}

pub fn release_url(origin: &str, id: &str, page: u64) -> Result<Url> {
    Ok(Url::parse_with_params(
        &format!("{origin}/api"),
        &[
            ("m", "release"),
            ("id", id),
            ("sort", "episode_asc"),
            ("page", page.to_string().as_str()),
        ],
    )?)
}

/// Walk the release api page by page and collect every episode.
///
/// A failing page ends the walk; what was collected before it is returned.
pub async fn episodes(fetcher: &dyn Fetcher, origin: &str, id: &str) -> Vec<EpisodeRecord> {
    let referer = format!("{origin}/anime/{id}");
    let mut records = Vec::new();
    let mut page = 1;
    loop {
        let result = match release_url(origin, id, page) {
            Ok(url) => get_json::<ReleasePage>(fetcher, url.as_str(), &referer).await,
            Err(e) => Err(e),
        };
        let release = match result {
            Ok(release) => release,
            Err(e) => {
                warn!("release page {page} of {id} failed: {e}");
                break;
            }
        };
        let total = release.last_page();
        records.extend(release.data.unwrap_or_default());
        page += 1;
        if page > total {
            break;
        }
    }
    info!("{} episodes found for {id}", records.len());
    records
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::fetch::testing::FakeFetcher;

    const ORIGIN: &str = "https://animepahe.ru";

    fn url(page: u64) -> String {
        release_url(ORIGIN, "abc", page).unwrap().to_string()
    }

    fn page_body(episodes: &[u32], last_page: Value) -> String {
        let data: Vec<Value> = episodes
            .iter()
            .map(|ep| json!({ "episode": ep, "session": format!("s{ep}"), "filler": 0 }))
            .collect();
        json!({ "total": 6, "per_page": 2, "data": data, "last_page": last_page }).to_string()
    }

    fn numbers(records: &[EpisodeRecord]) -> Vec<f64> {
        records.iter().filter_map(EpisodeRecord::episode).collect()
    }

    #[test]
    fn test_release_url() {
        assert_eq!(
            url(2),
            "https://animepahe.ru/api?m=release&id=abc&sort=episode_asc&page=2"
        );
    }

    #[tokio::test]
    async fn test_all_pages_in_order() {
        let fetcher = FakeFetcher::default()
            .with(&url(1), &page_body(&[1, 2], json!(3)))
            .with(&url(2), &page_body(&[3, 4], json!(3)))
            .with(&url(3), &page_body(&[5, 6], json!(3)))
            .with(&url(4), &page_body(&[7], json!(3)));
        let records = episodes(&fetcher, ORIGIN, "abc").await;
        assert_eq!(numbers(&records), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(fetcher.requested(), vec![url(1), url(2), url(3)]);
        assert!(fetcher
            .requests
            .lock()
            .unwrap()
            .iter()
            .all(|(_, referer)| referer == "https://animepahe.ru/anime/abc"));
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_pages() {
        let fetcher = FakeFetcher::default()
            .with(&url(1), &page_body(&[1, 2], json!(3)))
            .with(&url(3), &page_body(&[5, 6], json!(3)));
        let records = episodes(&fetcher, ORIGIN, "abc").await;
        assert_eq!(numbers(&records), vec![1.0, 2.0]);
        assert_eq!(fetcher.requested(), vec![url(1), url(2)]);

        let fetcher = FakeFetcher::default()
            .with(&url(1), &page_body(&[1, 2], json!(2)))
            .with(&url(2), "<html>ddos-guard</html>");
        let records = episodes(&fetcher, ORIGIN, "abc").await;
        assert_eq!(numbers(&records), vec![1.0, 2.0]);

        let records = episodes(&FakeFetcher::default(), ORIGIN, "abc").await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_last_page_defaults_to_one() {
        for last_page in [Value::Null, json!("x"), json!(0), json!(-2)] {
            let fetcher = FakeFetcher::default()
                .with(&url(1), &page_body(&[1], last_page))
                .with(&url(2), &page_body(&[2], json!(2)));
            let records = episodes(&fetcher, ORIGIN, "abc").await;
            assert_eq!(numbers(&records), vec![1.0]);
        }
    }

    #[tokio::test]
    async fn test_last_page_reread_each_page() {
        let fetcher = FakeFetcher::default()
            .with(&url(1), &page_body(&[1], json!("2")))
            .with(&url(2), &page_body(&[2], json!(3)))
            .with(&url(3), &page_body(&[3], json!(3)));
        let records = episodes(&fetcher, ORIGIN, "abc").await;
        assert_eq!(numbers(&records), vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_odd_records_are_kept() {
        let fetcher = FakeFetcher::default()
            .with(&url(1), r#"{"last_page":2,"data":[{"episode":1},{"episode":2},7]}"#)
            .with(&url(2), &page_body(&[3], json!(2)));
        let records = episodes(&fetcher, ORIGIN, "abc").await;
        assert_eq!(records.len(), 4);
        assert_eq!(records[2], EpisodeRecord(json!(7)));
        assert_eq!(records[2].episode(), None);
        assert_eq!(numbers(&records), vec![1.0, 2.0, 3.0]);
        assert_eq!(fetcher.requested(), vec![url(1), url(2)]);
    }

    #[tokio::test]
    async fn test_missing_data() {
        let fetcher = FakeFetcher::default().with(&url(1), r#"{"total":0,"data":null}"#);
        assert!(episodes(&fetcher, ORIGIN, "abc").await.is_empty());
    }

    #[test]
    fn test_record_passes_through() {
        let raw = json!({
            "id": 1,
            "anime_id": 4,
            "episode": "12.5",
            "session": "5f2e",
            "snapshot": "https://i.animepahe.ru/snapshots/x.jpg",
            "audio": "jpn"
        });
        let record: EpisodeRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.episode(), Some(12.5));
        assert_eq!(record.session(), Some("5f2e"));
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }
}
