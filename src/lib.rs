pub mod client;
pub mod config;
pub mod episode;
pub mod fetch;
pub mod manifest;
pub mod search;
pub mod serve;
pub mod source;
pub mod unpack;

pub use client::Pahe;

use color_eyre::eyre::Result;
use std::sync::LazyLock;

use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::warn;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, Layer};

pub static PROJECT_NAME: LazyLock<String> =
    LazyLock::new(|| env!("CARGO_CRATE_NAME").to_uppercase().to_string());
pub static DATA_FOLDER: LazyLock<Option<PathBuf>> = LazyLock::new(|| {
    std::env::var(format!("{}_DATA", PROJECT_NAME.clone()))
        .ok()
        .map(PathBuf::from)
});
fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", env!("CARGO_PKG_NAME"))
}

pub fn get_data_dir() -> PathBuf {
    let directory = if let Some(s) = DATA_FOLDER.clone() {
        s
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    };

    if !directory.exists() {
        if let Err(e) = std::fs::create_dir_all(&directory) {
            warn!("can't create data dir {}: {e}", directory.display());
        }
    }

    directory
}

pub static LOG_ENV: LazyLock<String> =
    LazyLock::new(|| format!("{}_LOGLEVEL", PROJECT_NAME.clone()));

pub fn initialize_logging_from_crate_name() -> Result<()> {
    initialize_logging(env!("CARGO_CRATE_NAME"))
}

pub fn initialize_logging(target: &str) -> Result<()> {
    let filter = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV.clone()))
        .unwrap_or_else(|_| format!("{target}=info"));
    let stderr_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::EnvFilter::try_new(filter)?);
    tracing_subscriber::registry()
        .with(stderr_subscriber)
        .with(ErrorLayer::default())
        .try_init()?;
    Ok(())
}
