use color_eyre::eyre::{eyre, Result};
use tracing::{debug, warn};

use crate::{fetch::Fetcher, unpack};

/// Follow a kwik redirect url to its hls manifest.
///
/// Every failure is logged and reported as `None`, so one broken source never
/// takes down the rest of the page.
pub async fn resolve(fetcher: &dyn Fetcher, redirect_url: &str, referer: &str) -> Option<String> {
    match try_resolve(fetcher, redirect_url, referer).await {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!("resolve manifest from {redirect_url} failed: {e}");
            None
        }
    }
}

async fn try_resolve(
    fetcher: &dyn Fetcher,
    redirect_url: &str,
    referer: &str,
) -> Result<Option<String>> {
    let text = fetcher.get_text(redirect_url, referer).await?;
    let Some(script) = unpack::packed_script(&text) else {
        debug!("no packed script at {redirect_url}");
        return Ok(None);
    };
    let decoded = unpack::unpack(script).map_err(|e| eyre!("{redirect_url}: {e}"))?;
    let manifest = unpack::find_manifest(&decoded).map(str::to_string);
    if manifest.is_none() {
        debug!("packed script at {redirect_url} has no manifest");
    }
    Ok(manifest)
}
