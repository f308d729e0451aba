// src/engine.rs
//! One poll cycle: query every configured source, reconcile, filter against
//! the seen-store, announce what's left. Marking seen happens strictly after
//! a confirmed publish success (or unconditionally in build mode), never
//! before — that ordering is what makes announcements at-most-once.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::publish::Publisher;
use crate::reconcile::{reconcile, SourcePreference};
use crate::store::SeenStore;
use crate::video::VideoSource;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Videos announced (or, in build mode, registered) this cycle.
    pub announced: usize,
    /// Candidates dropped because they were already seen.
    pub skipped: usize,
    /// Publish attempts that failed; retried next cycle.
    pub failed: usize,
}

/// Run a single poll-reconcile-publish pass.
///
/// A source failing to fetch contributes zero candidates and does not abort
/// the cycle; only when every source fails does the cycle end early. A
/// publish failure for one video never blocks the rest of the batch. Store
/// persistence failure is the one fatal path and propagates to the caller.
pub async fn run_cycle(
    sources: &[Box<dyn VideoSource>],
    store: &mut SeenStore,
    publisher: &dyn Publisher,
    preference: SourcePreference,
    build_only: bool,
    post_delay: Duration,
) -> Result<CycleReport, StoreError> {
    let mut batches = Vec::with_capacity(sources.len());
    let mut reachable = 0usize;
    for source in sources {
        match source.fetch_latest().await {
            Ok(videos) => {
                debug!(source = source.name(), count = videos.len(), "source polled");
                reachable += 1;
                batches.push(videos);
            }
            Err(e) => {
                warn!(source = source.name(), error = %e, "source unavailable this cycle");
            }
        }
    }
    if reachable == 0 {
        warn!("every configured source failed; ending cycle early");
        return Ok(CycleReport::default());
    }

    let candidates = reconcile(batches, preference);
    debug!(count = candidates.len(), "candidates after reconciliation");

    let mut report = CycleReport::default();
    let mut published_any = false;
    for video in candidates {
        if store.contains(&video.video_id) {
            report.skipped += 1;
            continue;
        }

        if build_only {
            store.mark_seen(&video.video_id)?;
            info!(video_id = %video.video_id, title = %video.title, "registered without posting");
            report.announced += 1;
            continue;
        }

        // Pause between consecutive posts; Bluesky rate-limits bursts.
        if published_any && post_delay > Duration::ZERO {
            tokio::time::sleep(post_delay).await;
        }
        published_any = true;

        match publisher.publish(&video).await {
            Ok(()) => {
                store.mark_seen(&video.video_id)?;
                info!(video_id = %video.video_id, title = %video.title, "announced");
                report.announced += 1;
            }
            Err(e) => {
                warn!(
                    video_id = %video.video_id,
                    title = %video.title,
                    source = %video.source,
                    error = %e,
                    "publish failed; will retry next cycle"
                );
                report.failed += 1;
            }
        }
    }

    info!(
        announced = report.announced,
        skipped = report.skipped,
        failed = report.failed,
        "cycle finished"
    );
    Ok(report)
}
