// src/source/api.rs
//! Poller for the YouTube Data API v3. Reads the channel's uploads playlist
//! (`playlistItems`), paginating until `max_results` videos are collected or
//! the playlist ends. More reliable than the Atom feed and able to look
//! further back, at the cost of an API key and quota.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::video::{SourceKind, VideoCandidate, VideoSource};

const ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/playlistItems";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE_LIMIT: usize = 50;
const PAGE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    items: Vec<Item>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    snippet: Option<Snippet>,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    published_at: Option<String>,
    resource_id: Option<ResourceId>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumb>,
    high: Option<Thumb>,
    medium: Option<Thumb>,
    #[serde(rename = "default")]
    fallback: Option<Thumb>,
}

#[derive(Debug, Deserialize)]
struct Thumb {
    url: Option<String>,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        [self.maxres, self.high, self.medium, self.fallback]
            .into_iter()
            .flatten()
            .find_map(|t| t.url)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct ApiSource {
    client: reqwest::Client,
    api_key: String,
    playlist_id: String,
    max_results: usize,
    no_cache: bool,
}

impl ApiSource {
    pub fn new(
        channel_id: &str,
        api_key: impl Into<String>,
        max_results: usize,
        no_cache: bool,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            playlist_id: uploads_playlist_id(channel_id)?,
            max_results: max_results.max(1),
            no_cache,
        })
    }

    /// Convert one `playlistItems` response body into candidates plus the
    /// continuation token. Items without a video id are dropped.
    pub fn parse_page(body: &str) -> Result<(Vec<VideoCandidate>, Option<String>), SourceError> {
        let page: Page =
            serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

        let mut out = Vec::with_capacity(page.items.len());
        let mut skipped = 0usize;
        for item in page.items {
            let snippet = item.snippet;
            let video_id = item
                .content_details
                .and_then(|cd| cd.video_id)
                .or_else(|| {
                    snippet
                        .as_ref()
                        .and_then(|s| s.resource_id.as_ref())
                        .and_then(|r| r.video_id.clone())
                })
                .filter(|id| !id.is_empty());
            let Some(video_id) = video_id else {
                skipped += 1;
                continue;
            };

            let (title, published_at, thumbnail_url) = match snippet {
                Some(s) => (
                    s.title.unwrap_or_else(|| "Unknown Title".to_string()),
                    s.published_at
                        .as_deref()
                        .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
                        .map(|dt| dt.with_timezone(&chrono::Utc)),
                    s.thumbnails.and_then(Thumbnails::best),
                ),
                None => ("Unknown Title".to_string(), None, None),
            };

            out.push(VideoCandidate {
                url: VideoCandidate::watch_url(&video_id),
                title,
                thumbnail_url,
                published_at,
                source: SourceKind::Api,
                video_id,
            });
        }

        if skipped > 0 {
            warn!(skipped, "playlist items without a video id were dropped");
        }
        Ok((out, page.next_page_token))
    }

    async fn fetch_page(
        &self,
        per_page: usize,
        page_token: Option<&str>,
    ) -> Result<(Vec<VideoCandidate>, Option<String>), SourceError> {
        let mut params: Vec<(&str, String)> = vec![
            ("part", "snippet,contentDetails".to_string()),
            ("playlistId", self.playlist_id.clone()),
            ("maxResults", per_page.to_string()),
            ("key", self.api_key.clone()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let mut req = self
            .client
            .get(ENDPOINT)
            .timeout(FETCH_TIMEOUT)
            .query(&params);
        if self.no_cache {
            // Stale playlist responses are a known Data API wart; bust both
            // shared caches and any URL-keyed cache.
            req = req
                .header("Cache-Control", "no-cache, no-store, must-revalidate")
                .header("Pragma", "no-cache")
                .query(&[("_nocache", chrono::Utc::now().timestamp().to_string())]);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|env| env.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Self::parse_page(&body)
    }
}

#[async_trait::async_trait]
impl VideoSource for ApiSource {
    async fn fetch_latest(&self) -> Result<Vec<VideoCandidate>, SourceError> {
        let mut collected: Vec<VideoCandidate> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let remaining = self.max_results.saturating_sub(collected.len());
            if remaining == 0 {
                break;
            }
            let per_page = remaining.min(PAGE_SIZE_LIMIT);

            let (mut videos, next) = match self.fetch_page(per_page, page_token.as_deref()).await {
                Ok(page) => page,
                Err(e) if collected.is_empty() => return Err(e),
                Err(e) => {
                    // A later page failing should not discard what we have;
                    // the partial window is still a valid poll result.
                    warn!(error = %e, fetched = collected.len(), "pagination aborted, keeping partial results");
                    break;
                }
            };

            let empty_page = videos.is_empty();
            collected.append(&mut videos);
            debug!(total = collected.len(), "playlist page fetched");

            page_token = next;
            if page_token.is_none() || empty_page {
                break;
            }
            tokio::time::sleep(PAGE_DELAY).await;
        }

        Ok(collected)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    fn name(&self) -> &'static str {
        "api"
    }
}

/// A channel `UCxxxx` owns the auto-generated uploads playlist `UUxxxx`.
pub fn uploads_playlist_id(channel_id: &str) -> Result<String, SourceError> {
    match channel_id.strip_prefix("UC") {
        Some(rest) if !rest.is_empty() => Ok(format!("UU{rest}")),
        _ => Err(SourceError::InvalidChannel(channel_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = include_str!("../../tests/fixtures/playlist_items.json");

    #[test]
    fn channel_id_maps_to_uploads_playlist() {
        assert_eq!(uploads_playlist_id("UCabc123").unwrap(), "UUabc123");
        assert!(uploads_playlist_id("HCabc123").is_err());
        assert!(uploads_playlist_id("UC").is_err());
        assert!(uploads_playlist_id("").is_err());
    }

    #[test]
    fn parses_page_and_picks_best_thumbnail() {
        let (videos, token) = ApiSource::parse_page(PAGE).unwrap();
        assert_eq!(token.as_deref(), Some("NEXT_PAGE_TOKEN"));
        // Three items in the fixture, one lacks a video id everywhere.
        assert_eq!(videos.len(), 2);

        let first = &videos[0];
        assert_eq!(first.video_id, "dQw4w9WgXcQ");
        assert_eq!(first.title, "First upload");
        assert_eq!(first.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(
            first.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg")
        );
        assert_eq!(first.source, SourceKind::Api);

        // Second item has no maxres; the quality ladder falls through.
        assert_eq!(
            videos[1].thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/jNQXAC9IVRw/hqdefault.jpg")
        );
    }

    #[test]
    fn video_id_from_resource_id_when_content_details_missing() {
        let body = r#"{
            "items": [
                {"snippet": {"title": "Only snippet", "resourceId": {"videoId": "abc123def45"}}}
            ]
        }"#;
        let (videos, token) = ApiSource::parse_page(body).unwrap();
        assert!(token.is_none());
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].video_id, "abc123def45");
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        assert!(matches!(
            ApiSource::parse_page("<html>quota page</html>"),
            Err(SourceError::Parse(_))
        ));
    }
}
