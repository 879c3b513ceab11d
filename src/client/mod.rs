use std::sync::Arc;

use color_eyre::eyre::Result;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    config::Config,
    episode::{self, EpisodeRecord},
    fetch::{Fetcher, HttpFetcher},
    manifest, search,
    source::{self, ResultSet},
};

/// Entry point for the whole pipeline: search, list episodes, resolve sources.
#[derive(Clone)]
pub struct Pahe {
    fetcher: Arc<dyn Fetcher>,
    origin: String,
    concurrency: Option<usize>,
}

impl Pahe {
    pub fn new(fetcher: Arc<dyn Fetcher>, base_url: &str, concurrency: Option<usize>) -> Self {
        Pahe {
            fetcher,
            origin: base_url.trim_end_matches('/').to_string(),
            concurrency,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::from_config(config)?;
        Ok(Pahe::new(
            Arc::new(fetcher),
            &config.base_url,
            config.concurrency,
        ))
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub async fn search(&self, title: &str) -> Option<Value> {
        search::search(self.fetcher.as_ref(), &self.origin, title).await
    }

    pub async fn episodes(&self, id: &str) -> Vec<EpisodeRecord> {
        episode::episodes(self.fetcher.as_ref(), &self.origin, id).await
    }

    /// Fetch an episode's player page and resolve all of its sources.
    pub async fn sources(&self, episode_id: &str) -> Option<ResultSet> {
        let url = format!("{}/play/{episode_id}", self.origin);
        let html = match self.fetcher.get_text(&url, &self.origin).await {
            Ok(html) => html,
            Err(e) => {
                warn!("player page {url} failed: {e}");
                return None;
            }
        };
        let result = source::extract(
            self.fetcher.as_ref(),
            &html,
            &self.referer(),
            self.concurrency,
        )
        .await;
        info!(
            "{episode_id}: {} native, {} dubbed sources",
            result.native.len(),
            result.dubbed.as_ref().map_or(0, |d| d.len())
        );
        Some(result)
    }

    pub async fn resolve_manifest(&self, redirect_url: &str) -> Option<String> {
        manifest::resolve(self.fetcher.as_ref(), redirect_url, &self.referer()).await
    }

    fn referer(&self) -> String {
        format!("{}/", self.origin)
    }
}
