// tests/store_persistence.rs
// Restart-survival behavior of the seen-store through the public API:
// the same engine state must come back after a process restart.

use std::time::Duration;

use skytube::engine::run_cycle;
use skytube::error::{PublishError, SourceError, StoreError};
use skytube::publish::Publisher;
use skytube::reconcile::SourcePreference;
use skytube::store::{CorruptPolicy, SeenStore};
use skytube::video::{SourceKind, VideoCandidate, VideoSource};

struct OneShotSource(Vec<VideoCandidate>);

#[async_trait::async_trait]
impl VideoSource for OneShotSource {
    async fn fetch_latest(&self) -> Result<Vec<VideoCandidate>, SourceError> {
        Ok(self.0.clone())
    }
    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }
    fn name(&self) -> &'static str {
        "rss"
    }
}

struct CountingPublisher(std::sync::Mutex<usize>);

#[async_trait::async_trait]
impl Publisher for CountingPublisher {
    async fn publish(&self, _video: &VideoCandidate) -> Result<(), PublishError> {
        *self.0.lock().unwrap() += 1;
        Ok(())
    }
}

fn cand(id: &str) -> VideoCandidate {
    VideoCandidate {
        video_id: id.to_string(),
        title: format!("video {id}"),
        url: VideoCandidate::watch_url(id),
        thumbnail_url: None,
        published_at: None,
        source: SourceKind::Rss,
    }
}

#[tokio::test]
async fn seen_state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.json");
    let sources: Vec<Box<dyn VideoSource>> =
        vec![Box::new(OneShotSource(vec![cand("v1"), cand("v3"), cand("v9")]))];
    let publisher = CountingPublisher(std::sync::Mutex::new(0));

    {
        let mut store = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
        let report = run_cycle(&sources, &mut store, &publisher, SourcePreference::Api, false, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(report.announced, 3);
    }

    // "Restart": reload from disk and poll the same window again.
    let mut store = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
    assert_eq!(store.len(), 3);
    let report = run_cycle(&sources, &mut store, &publisher, SourcePreference::Api, false, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(report.announced, 0);
    assert_eq!(report.skipped, 3);
    assert_eq!(*publisher.0.lock().unwrap(), 3);
}

#[test]
fn membership_roundtrips_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.json");

    let mut store = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
    store.record_all(["v1", "v3", "v9"]).unwrap();

    let reloaded = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
    assert_eq!(reloaded.len(), 3);
    for id in ["v1", "v3", "v9"] {
        assert!(reloaded.contains(id));
    }
}

#[tokio::test]
async fn persist_failure_is_fatal_to_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    // Missing parent directory makes every seen-file write fail.
    let path = dir.path().join("missing").join("seen.json");
    let sources: Vec<Box<dyn VideoSource>> = vec![Box::new(OneShotSource(vec![cand("v1")]))];
    let publisher = CountingPublisher(std::sync::Mutex::new(0));

    let mut store = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
    let err = run_cycle(&sources, &mut store, &publisher, SourcePreference::Api, false, Duration::ZERO)
        .await
        .unwrap_err();

    // The cycle must not continue as if the video were durably seen.
    assert!(matches!(err, StoreError::Persist { .. }));
    // The post itself went live before the store write; that is the
    // documented at-least-once edge, not a silent success.
    assert_eq!(*publisher.0.lock().unwrap(), 1);
}

#[test]
fn corrupt_store_refuses_to_load_under_fail_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.json");
    std::fs::write(&path, "[\"v1\", truncated").unwrap();

    let err = SeenStore::load(&path, CorruptPolicy::Fail).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));

    // Reset policy quarantines the broken file and starts empty.
    let store = SeenStore::load(&path, CorruptPolicy::Reset).unwrap();
    assert!(store.is_empty());
    assert!(dir.path().join("seen.json.corrupt.bak").exists());
}
