// src/reconcile.rs
//! Merges candidate batches from one or two pollers into a deduplicated,
//! order-stable sequence. When both sources report the same video id with
//! differing metadata, the preferred source's candidate wins wholesale;
//! fields are never merged.

use std::collections::HashMap;

use crate::video::{SourceKind, VideoCandidate};

/// Whose metadata wins when a video id is reported by both sources.
/// Never affects which video ids are considered new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePreference {
    Api,
    Rss,
}

impl Default for SourcePreference {
    fn default() -> Self {
        SourcePreference::Api
    }
}

impl SourcePreference {
    pub fn kind(self) -> SourceKind {
        match self {
            SourcePreference::Api => SourceKind::Api,
            SourcePreference::Rss => SourceKind::Rss,
        }
    }
}

/// Deduplicate by `video_id` across batches, keeping first-seen order.
///
/// The first batch is walked fully before the second, so output order is
/// deterministic for unchanged inputs. A source repeating an id within its
/// own batch keeps the first occurrence; the same id across sources keeps
/// the candidate whose provenance matches `preference`.
pub fn reconcile(
    batches: Vec<Vec<VideoCandidate>>,
    preference: SourcePreference,
) -> Vec<VideoCandidate> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, VideoCandidate> = HashMap::new();

    for batch in batches {
        for cand in batch {
            match by_id.get(&cand.video_id) {
                None => {
                    order.push(cand.video_id.clone());
                    by_id.insert(cand.video_id.clone(), cand);
                }
                Some(existing) => {
                    // Same source twice: defensive dedup, first wins.
                    // Cross-source duplicate: preferred metadata replaces.
                    if existing.source != cand.source && cand.source == preference.kind() {
                        by_id.insert(cand.video_id.clone(), cand);
                    }
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}
