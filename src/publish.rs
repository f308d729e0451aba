// src/publish.rs
//! Posting to Bluesky over the atproto XRPC HTTP API: createSession for
//! auth, uploadBlob for the thumbnail, createRecord for the post itself
//! with an `app.bsky.embed.external` preview card.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::PublishError;
use crate::video::VideoCandidate;

const DEFAULT_SERVICE: &str = "https://bsky.social";
const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(10);
// Placeholder images served for unavailable thumbnail qualities are tiny.
const MIN_THUMBNAIL_BYTES: usize = 1000;
// Bluesky rejects posts over 300 graphemes; we warn rather than truncate.
const POST_TEXT_LIMIT: usize = 300;

/// A thing that can announce one video. Success means the post is live;
/// the caller marks the video seen only after a success.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, video: &VideoCandidate) -> Result<(), PublishError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Clone)]
pub struct BlueskyPublisher {
    client: Client,
    service: String,
    handle: String,
    app_password: String,
    post_template: String,
    timeout: Duration,
    max_retries: u8,
}

impl BlueskyPublisher {
    pub fn new(
        handle: impl Into<String>,
        app_password: impl Into<String>,
        post_template: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            service: DEFAULT_SERVICE.to_string(),
            handle: handle.into(),
            app_password: app_password.into(),
            post_template: post_template.into(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    /// Point at a different PDS (self-hosted or a test server).
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{method}", self.service)
    }

    async fn create_session(&self) -> Result<Session, PublishError> {
        let req = self
            .client
            .post(self.xrpc_url("com.atproto.server.createSession"))
            .json(&json!({ "identifier": self.handle, "password": self.app_password }));
        let value = self.execute(req).await?;
        serde_json::from_value(value)
            .map_err(|e| PublishError::Unknown(format!("unexpected createSession response: {e}")))
    }

    /// Issue a request with bounded retries. Rate limits and server errors
    /// back off and retry; auth rejections and other client errors do not.
    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<serde_json::Value, PublishError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let this_try = req
                .try_clone()
                .ok_or_else(|| PublishError::Unknown("request body is not replayable".into()))?;

            match this_try.timeout(self.timeout).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json().await.map_err(PublishError::Network);
                    }
                    let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
                    if retryable && attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    return Err(classify_status(status, &body));
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(PublishError::Network(e));
                }
            }
        }
    }

    /// Try the candidate's reported thumbnail, then the predictable
    /// img.youtube.com quality ladder. Returns the uploaded blob ref, or
    /// None if every attempt failed — a post without a thumbnail is fine.
    async fn upload_thumbnail(
        &self,
        session: &Session,
        video: &VideoCandidate,
    ) -> Option<serde_json::Value> {
        let mut urls: Vec<String> = Vec::new();
        if let Some(url) = &video.thumbnail_url {
            urls.push(url.clone());
        }
        for quality in ["maxresdefault", "hqdefault", "mqdefault"] {
            let url = format!("https://img.youtube.com/vi/{}/{quality}.jpg", video.video_id);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }

        for url in &urls {
            let bytes = match self.download_image(url).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    debug!(%url, "thumbnail looks like a placeholder, trying next quality");
                    continue;
                }
                Err(e) => {
                    warn!(%url, error = %e, "thumbnail download failed, trying next quality");
                    continue;
                }
            };
            match self.upload_blob(session, bytes).await {
                Ok(blob) => return Some(blob),
                Err(e) => {
                    warn!(%url, error = %e, "thumbnail upload to Bluesky failed");
                    return None;
                }
            }
        }

        warn!(video_id = %video.video_id, "no usable thumbnail; posting without a preview image");
        None
    }

    async fn download_image(&self, url: &str) -> Result<Option<Vec<u8>>, PublishError> {
        let resp = self
            .client
            .get(url)
            .timeout(THUMBNAIL_TIMEOUT)
            .send()
            .await?
            .error_for_status()
            .map_err(PublishError::Network)?;
        let bytes = resp.bytes().await?;
        if bytes.len() <= MIN_THUMBNAIL_BYTES {
            return Ok(None);
        }
        Ok(Some(bytes.to_vec()))
    }

    async fn upload_blob(
        &self,
        session: &Session,
        bytes: Vec<u8>,
    ) -> Result<serde_json::Value, PublishError> {
        let req = self
            .client
            .post(self.xrpc_url("com.atproto.repo.uploadBlob"))
            .bearer_auth(&session.access_jwt)
            .header("Content-Type", "image/jpeg")
            .body(bytes);
        let mut value = self.execute(req).await?;
        match value.get_mut("blob") {
            Some(blob) => Ok(blob.take()),
            None => Err(PublishError::Unknown(
                "uploadBlob response carried no blob ref".into(),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Publisher for BlueskyPublisher {
    async fn publish(&self, video: &VideoCandidate) -> Result<(), PublishError> {
        let session = self.create_session().await?;
        debug!(handle = %self.handle, "bluesky session established");

        let thumb = self.upload_thumbnail(&session, video).await;

        let text = render_post_text(&self.post_template, video);
        if text.chars().count() > POST_TEXT_LIMIT {
            warn!(
                len = text.chars().count(),
                video_id = %video.video_id,
                "post text exceeds the Bluesky limit and may be rejected"
            );
        }

        let mut external = json!({
            "uri": video.url,
            "title": video.title,
            "description": "Watch on YouTube",
        });
        if let Some(blob) = thumb {
            external["thumb"] = blob;
        }

        let record = json!({
            "$type": "app.bsky.feed.post",
            "text": text,
            "createdAt": chrono::Utc::now().to_rfc3339(),
            "embed": {
                "$type": "app.bsky.embed.external",
                "external": external,
            },
        });

        let req = self
            .client
            .post(self.xrpc_url("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": "app.bsky.feed.post",
                "record": record,
            }));
        self.execute(req).await?;

        debug!(video_id = %video.video_id, "post created");
        Ok(())
    }
}

pub fn render_post_text(template: &str, video: &VideoCandidate) -> String {
    template
        .replace("{title}", &video.title)
        .replace("{url}", &video.url)
}

fn classify_status(status: StatusCode, body: &str) -> PublishError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishError::AuthFailure(message),
        StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimited,
        _ => PublishError::Unknown(format!("http {}: {message}", status.as_u16())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::SourceKind;

    fn video() -> VideoCandidate {
        VideoCandidate {
            video_id: "dQw4w9WgXcQ".into(),
            title: "First upload".into(),
            url: VideoCandidate::watch_url("dQw4w9WgXcQ"),
            thumbnail_url: None,
            published_at: None,
            source: SourceKind::Rss,
        }
    }

    #[test]
    fn template_substitutes_title_and_url() {
        let text = render_post_text("🎬 New video: {title}\n{url}", &video());
        assert_eq!(
            text,
            "🎬 New video: First upload\nhttps://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn unknown_placeholders_are_left_verbatim() {
        let text = render_post_text("{nonexistent} {title}", &video());
        assert_eq!(text, "{nonexistent} First upload");
    }

    #[test]
    fn auth_and_rate_limit_statuses_classify_distinctly() {
        let err = classify_status(
            StatusCode::UNAUTHORIZED,
            r#"{"error":"AuthenticationRequired","message":"Invalid identifier or password"}"#,
        );
        assert!(matches!(err, PublishError::AuthFailure(m) if m.contains("Invalid identifier")));

        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            PublishError::RateLimited
        ));

        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "upstream sad"),
            PublishError::Unknown(_)
        ));
    }
}
