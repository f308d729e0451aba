// src/video.rs
use crate::error::SourceError;
use chrono::{DateTime, Utc};

/// Which poller a candidate came from. Only used to resolve metadata
/// conflicts during reconciliation; irrelevant afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Api,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Rss => f.write_str("rss"),
            SourceKind::Api => f.write_str("api"),
        }
    }
}

/// A video reported by a source in the current poll, not yet confirmed
/// announced. `video_id` is the natural key for deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCandidate {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: SourceKind,
}

impl VideoCandidate {
    /// Canonical watch URL for a video id.
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={video_id}")
    }
}

/// One poll of a channel. Implementations must never surface a
/// partially-parsed entry as a valid candidate; malformed entries are
/// skipped, not fatal to the batch.
#[async_trait::async_trait]
pub trait VideoSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<VideoCandidate>, SourceError>;
    fn kind(&self) -> SourceKind;
    fn name(&self) -> &'static str;
}
