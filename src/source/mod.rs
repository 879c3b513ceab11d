use std::{collections::BTreeMap, sync::LazyLock};

use futures::{
    future::{join_all, BoxFuture},
    stream, FutureExt, StreamExt,
};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{fetch::Fetcher, manifest};

static BUTTON_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#resolutionMenu button").unwrap());
static DOWNLOAD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#pickDownload a").unwrap());

/// Marker the download list puts on dubbed entries.
const DUB_MARKER: &str = "eng";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Quality {
    pub fn from_tag(tag: &str) -> Option<Quality> {
        match tag {
            "360p" => Some(Quality::P360),
            "480p" => Some(Quality::P480),
            "720p" => Some(Quality::P720),
            "1080p" => Some(Quality::P1080),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audio {
    /// japanese audio with subtitles
    Native,
    /// english dub
    Dubbed,
}

impl Audio {
    pub fn from_code(code: &str) -> Option<Audio> {
        match code {
            "jpn" => Some(Audio::Native),
            "eng" => Some(Audio::Dubbed),
            _ => None,
        }
    }
}

/// One button of the player's resolution menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub quality: Quality,
    pub audio: Audio,
    pub fansub: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub descriptor: SourceDescriptor,
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

pub type QualityMap = BTreeMap<Quality, ResolvedSource>;

/// `dubbed` is `None` unless at least one dubbed source resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub native: QualityMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dubbed: Option<QualityMap>,
}

/// Resolve every source on a player page.
///
/// `concurrency` caps the manifest lookups in flight, `None` runs them all at
/// once. Either way every lookup settles before the result is assembled.
pub async fn extract(
    fetcher: &dyn Fetcher,
    html: &str,
    referer: &str,
    concurrency: Option<usize>,
) -> ResultSet {
    let candidates = candidates(html);
    let lookups: Vec<BoxFuture<'_, Option<String>>> = candidates
        .iter()
        .map(|c| manifest::resolve(fetcher, &c.descriptor.redirect_url, referer).boxed())
        .collect();
    let manifests: Vec<Option<String>> = match concurrency {
        None => join_all(lookups).await,
        Some(limit) => stream::iter(lookups).buffered(limit.max(1)).collect().await,
    };
    assemble(candidates.into_iter().zip(manifests))
}

/// Read the resolution menu, skipping buttons that can't be played.
pub fn candidates(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let anchors: Vec<(String, Option<String>)> = document
        .select(&DOWNLOAD_SELECTOR)
        .map(|a| {
            (
                a.text().collect::<String>(),
                a.value().attr("href").map(str::to_string),
            )
        })
        .collect();

    document
        .select(&BUTTON_SELECTOR)
        .filter_map(|button| {
            let attr = |name: &str| button.value().attr(name).unwrap_or("");
            let redirect_url = attr("data-src");
            let fansub = attr("data-fansub");
            let resolution = attr("data-resolution");
            let audio_code = attr("data-audio");

            let Some(quality) = Quality::from_tag(&format!("{resolution}p")) else {
                debug!("skip source with resolution {resolution:?}");
                return None;
            };
            if redirect_url.is_empty() {
                debug!("skip {fansub} {} without data-src", quality.tag());
                return None;
            }
            let Some(audio) = Audio::from_code(audio_code) else {
                debug!("skip {fansub} {} with audio {audio_code:?}", quality.tag());
                return None;
            };

            Some(Candidate {
                download_url: download_link(&anchors, fansub, quality, audio).map(str::to_string),
                descriptor: SourceDescriptor {
                    quality,
                    audio,
                    fansub: fansub.to_string(),
                    redirect_url: redirect_url.to_string(),
                },
            })
        })
        .collect()
}

/// The href of the first download anchor whose text mentions the fansub and the
/// quality, with the dub marker present exactly when `audio` is dubbed.
///
/// Plain substring tests, so overlapping labels can pick a neighbour's link.
pub fn download_link<'a>(
    anchors: &'a [(String, Option<String>)],
    fansub: &str,
    quality: Quality,
    audio: Audio,
) -> Option<&'a str> {
    anchors
        .iter()
        .find(|(text, _)| {
            text.contains(fansub)
                && text.contains(quality.tag())
                && text.contains(DUB_MARKER) == (audio == Audio::Dubbed)
        })
        .and_then(|(_, href)| href.as_deref())
        .filter(|href| !href.is_empty())
}

/// Later buttons win when two resolve to the same audio and quality.
fn assemble(resolved: impl IntoIterator<Item = (Candidate, Option<String>)>) -> ResultSet {
    let mut result = ResultSet::default();
    for (candidate, manifest) in resolved {
        let Some(manifest_url) = manifest else {
            continue;
        };
        let Candidate {
            descriptor,
            download_url,
        } = candidate;
        let source = ResolvedSource {
            manifest_url: Some(manifest_url),
            download_url,
        };
        match descriptor.audio {
            Audio::Native => {
                result.native.insert(descriptor.quality, source);
            }
            Audio::Dubbed => {
                result
                    .dubbed
                    .get_or_insert_with(QualityMap::new)
                    .insert(descriptor.quality, source);
            }
        }
    }
    result.dubbed = result.dubbed.filter(|dubbed| !dubbed.is_empty());
    result
}
