use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{fetch::CredentialProvider, get_data_dir};

pub const DEFAULT_BASE_URL: &str = "https://animepahe.ru";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// max manifest lookups in flight per player page, unlimited when absent
    pub concurrency: Option<usize>,
    /// per request timeout in seconds
    pub timeout: Option<u64>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub proxy: Option<Proxy>,
    pub credentials: Option<Credentials>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            concurrency: None,
            timeout: None,
            port: default_port(),
            proxy: None,
            credentials: None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Proxy {
    pub scheme: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Where the session cookie for the site comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(
    tag = "type",
    rename_all(deserialize = "lowercase", serialize = "lowercase")
)]
pub enum Credentials {
    Static { cookie: String },
    Env { var: String },
}

impl CredentialProvider for Credentials {
    fn cookie(&self) -> Option<String> {
        let cookie = match self {
            Credentials::Static { cookie } => Some(cookie.clone()),
            Credentials::Env { var } => std::env::var(var).ok(),
        };
        cookie.filter(|c| !c.trim().is_empty())
    }
}

const CONFIG_FILE_NAME: &str = "pahe-stream.toml";

impl Config {
    pub fn load() -> Result<Config> {
        let path = get_data_dir().join(CONFIG_FILE_NAME);
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let config_str = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&config_str)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(eyre!("base_url must be an http(s) url: {}", self.base_url));
        }
        if self.concurrency == Some(0) {
            return Err(eyre!("concurrency must be at least 1, omit it for no limit"));
        }
        Ok(())
    }

    /// Site origin without trailing slash.
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
