// src/source/rss.rs
//! Poller for the channel's public Atom feed at
//! `https://www.youtube.com/feeds/videos.xml?channel_id=…`. Needs no API
//! key; YouTube serves the most recent uploads (roughly the last fifteen).

use std::time::Duration;

use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::video::{SourceKind, VideoCandidate, VideoSource};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "videoId", alias = "yt:videoId")]
    video_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    published: Option<String>,
    #[serde(rename = "group", alias = "media:group")]
    media: Option<MediaGroup>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaGroup {
    #[serde(rename = "thumbnail", alias = "media:thumbnail")]
    thumbnail: Option<MediaThumbnail>,
}

#[derive(Debug, Deserialize)]
struct MediaThumbnail {
    #[serde(rename = "@url")]
    url: Option<String>,
}

pub struct RssSource {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssSource {
    pub fn for_channel(channel_id: &str) -> Self {
        Self {
            mode: Mode::Http {
                url: format!("https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}"),
                client: reqwest::Client::new(),
            },
        }
    }

    /// Parse a canned feed instead of fetching. For tests.
    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    /// Turn a feed document into candidates. A malformed entry (no video id)
    /// is skipped, never surfaced as a half-parsed candidate.
    pub fn parse_feed(xml: &str) -> Result<Vec<VideoCandidate>, SourceError> {
        let feed: Feed = from_str(xml).map_err(|e| SourceError::Parse(e.to_string()))?;

        let mut out = Vec::with_capacity(feed.entries.len());
        let mut skipped = 0usize;
        for entry in feed.entries {
            let Some(video_id) = entry.video_id.filter(|id| !id.is_empty()) else {
                skipped += 1;
                debug!(title = ?entry.title, "skipping feed entry with no video id");
                continue;
            };

            let url = entry
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .and_then(|l| l.href.clone())
                .unwrap_or_else(|| VideoCandidate::watch_url(&video_id));

            out.push(VideoCandidate {
                title: entry.title.unwrap_or_else(|| "Unknown Title".to_string()),
                url,
                thumbnail_url: entry.media.and_then(|g| g.thumbnail).and_then(|t| t.url),
                published_at: entry
                    .published
                    .as_deref()
                    .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
                    .map(|dt| dt.with_timezone(&chrono::Utc)),
                source: SourceKind::Rss,
                video_id,
            });
        }

        if skipped > 0 {
            warn!(skipped, "feed entries without a video id were dropped");
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl VideoSource for RssSource {
    async fn fetch_latest(&self) -> Result<Vec<VideoCandidate>, SourceError> {
        match &self.mode {
            Mode::Fixture(xml) => Self::parse_feed(xml),
            Mode::Http { url, client } => {
                let resp = client.get(url).timeout(FETCH_TIMEOUT).send().await?;
                let body = resp.error_for_status()?.text().await?;
                let candidates = Self::parse_feed(&body)?;
                debug!(count = candidates.len(), "rss feed fetched");
                Ok(candidates)
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}
