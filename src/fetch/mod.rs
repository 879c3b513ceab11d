use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use color_eyre::eyre::Result;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, USER_AGENT,
};
use serde::de::DeserializeOwned;

use crate::config::Config;

/// Supplies the session cookie the site wants for ddos-guard continuity.
pub trait CredentialProvider: Send + Sync {
    fn cookie(&self) -> Option<String>;
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body as text. Non-success statuses are errors.
    async fn get_text(&self, url: &str, referer: &str) -> Result<String>;
}

pub async fn get_json<T: DeserializeOwned>(
    fetcher: &dyn Fetcher,
    url: &str,
    referer: &str,
) -> Result<T> {
    let text = fetcher.get_text(url, referer).await?;
    Ok(serde_json::from_str(&text)?)
}

pub struct HttpFetcher {
    client: reqwest::Client,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl HttpFetcher {
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.7"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);

        let mut client_builder = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true);
        if let Some(proxy_config) = &config.proxy {
            let mut proxy = reqwest::Proxy::all(&proxy_config.scheme)?;
            if let (Some(username), Some(password)) =
                (&proxy_config.username, &proxy_config.password)
            {
                proxy = proxy.basic_auth(username, password);
            }
            client_builder = client_builder.proxy(proxy);
        }
        if let Some(secs) = config.timeout {
            client_builder = client_builder.timeout(Duration::from_secs(secs));
        }

        Ok(HttpFetcher {
            client: client_builder.build()?,
            credentials: config
                .credentials
                .clone()
                .map(|c| Arc::new(c) as Arc<dyn CredentialProvider>),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str, referer: &str) -> Result<String> {
        let mut request = self.client.get(url).header(REFERER, referer);
        if let Some(cookie) = self.credentials.as_ref().and_then(|c| c.cookie()) {
            request = request.header(COOKIE, cookie);
        }
        let text = request.send().await?.error_for_status()?.text().await?;
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{collections::HashMap, sync::Mutex};

    use async_trait::async_trait;
    use color_eyre::eyre::{eyre, Result};

    use super::Fetcher;

    /// Serves canned bodies per url and records every request made.
    #[derive(Default)]
    pub struct FakeFetcher {
        bodies: HashMap<String, String>,
        pub requests: Mutex<Vec<(String, String)>>,
    }

    impl FakeFetcher {
        pub fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.to_string());
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn get_text(&self, url: &str, referer: &str) -> Result<String> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), referer.to_string()));
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| eyre!("HTTP status client error (404 Not Found) for url ({url})"))
        }
    }
}
