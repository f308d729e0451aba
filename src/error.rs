// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Per-source, cycle-local failure. The engine treats a failing source as
/// having contributed zero candidates this cycle and retries next interval.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("invalid channel id {0:?}: expected a 'UC…' channel id")]
    InvalidChannel(String),

    #[error("api rejected request (http {status}): {message}")]
    Api { status: u16, message: String },
}

/// Per-video, cycle-local publish failure. The failed video stays unseen and
/// is retried on the next cycle as long as the source still reports it.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("authentication rejected: {0}")]
    AuthFailure(String),

    #[error("rate limited by the publishing service")]
    RateLimited,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("publish failed: {0}")]
    Unknown(String),
}

/// Seen-store failures. Both variants are treated as fatal by the binary:
/// continuing with a broken store risks duplicate or lost announcements.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seen-video file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to persist seen-video file {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
