// src/config.rs
//! Typed TOML configuration, constructed once at startup and passed by
//! reference into the engine. Secrets can be overridden from the
//! environment (`.env` is loaded by the binary before this runs).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::reconcile::SourcePreference;
use crate::store::CorruptPolicy;

const PLACEHOLDERS: &[&str] = &[
    "YOUR_CHANNEL_ID_HERE",
    "yourhandle.bsky.social",
    "your-app-password-here",
    "YOUR_YOUTUBE_API_KEY_HERE",
];

pub const EXAMPLE_CONFIG: &str = r#"# skytube configuration
# =====================

# Your YouTube channel id (the part after /channel/ in the channel URL).
youtube_channel_id = "YOUR_CHANNEL_ID_HERE"

# Bluesky credentials. Use an App Password from Bluesky settings, not your
# main password. Both may instead come from the environment:
#   BLUESKY_HANDLE / BLUESKY_APP_PASSWORD (a .env file is honored).
bluesky_handle = "yourhandle.bsky.social"
bluesky_password = "your-app-password-here"

# Post text; {title} and {url} are substituted per video.
post_template = "🎬 New video: {title}"

# Seconds between poll cycles.
check_interval_seconds = 600

# Durable record of already-announced videos.
seen_videos_file = "skytube_seen.json"

# What to do when the seen-videos file is unreadable at startup:
# "fail" (recommended) or "reset" (back it up and start empty).
on_corrupt_seen_file = "fail"

# Whose metadata wins when RSS and the Data API both report a video:
# "api" or "rss".
source_preference = "api"

# YouTube Data API v3 key, required for --use-api / --dual.
# May also come from the environment as YOUTUBE_API_KEY.
# youtube_api_key = "YOUR_YOUTUBE_API_KEY_HERE"

# How many videos to request from the Data API per cycle.
api_max_results = 15
"#;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub youtube_channel_id: String,
    #[serde(default)]
    pub bluesky_handle: String,
    #[serde(default)]
    pub bluesky_password: String,
    #[serde(default = "default_post_template")]
    pub post_template: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_seen_file")]
    pub seen_videos_file: PathBuf,
    #[serde(default)]
    pub on_corrupt_seen_file: CorruptPolicy,
    #[serde(default)]
    pub source_preference: SourcePreference,
    #[serde(default)]
    pub youtube_api_key: Option<String>,
    #[serde(default = "default_api_max_results")]
    pub api_max_results: usize,
}

fn default_post_template() -> String {
    "🎬 New video: {title}".to_string()
}

fn default_check_interval() -> u64 {
    600
}

fn default_seen_file() -> PathBuf {
    PathBuf::from("skytube_seen.json")
}

fn default_api_max_results() -> usize {
    15
}

impl Config {
    /// Parse the config file at `path`. When the file is missing, write a
    /// commented example next to the requested path and return an error
    /// telling the operator to fill it in.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            std::fs::write(path, EXAMPLE_CONFIG)
                .with_context(|| format!("writing example config to {}", path.display()))?;
            bail!(
                "config file {} not found; an example was written there — fill in your \
                 channel id and Bluesky credentials, then run again",
                path.display()
            );
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: Config =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Secrets may come from the environment instead of the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(handle) = std::env::var("BLUESKY_HANDLE") {
            if !handle.is_empty() {
                self.bluesky_handle = handle;
            }
        }
        if let Ok(password) = std::env::var("BLUESKY_APP_PASSWORD") {
            if !password.is_empty() {
                self.bluesky_password = password;
            }
        }
        if let Ok(key) = std::env::var("YOUTUBE_API_KEY") {
            if !key.is_empty() {
                self.youtube_api_key = Some(key);
            }
        }
    }

    /// Reject missing or placeholder values before any network call.
    /// `require_credentials` is false in build mode (no posting happens);
    /// `require_api_key` is set when the Data API source is enabled.
    pub fn validate(&self, require_credentials: bool, require_api_key: bool) -> Result<()> {
        let mut missing: Vec<&str> = Vec::new();

        if is_unset(&self.youtube_channel_id) {
            missing.push("youtube_channel_id");
        }
        if require_credentials {
            if is_unset(&self.bluesky_handle) {
                missing.push("bluesky_handle");
            }
            if is_unset(&self.bluesky_password) {
                missing.push("bluesky_password");
            }
        }
        if require_api_key && self.youtube_api_key.as_deref().map_or(true, is_unset) {
            missing.push("youtube_api_key");
        }
        if !missing.is_empty() {
            bail!("missing or placeholder config values: {}", missing.join(", "));
        }

        if self.check_interval_seconds == 0 {
            bail!("check_interval_seconds must be a positive number of seconds");
        }
        if self.api_max_results == 0 {
            bail!("api_max_results must be at least 1");
        }
        Ok(())
    }
}

fn is_unset<S: AsRef<str>>(value: S) -> bool {
    let v = value.as_ref();
    v.is_empty() || PLACEHOLDERS.contains(&v)
}
