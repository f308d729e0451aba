// src/store.rs
//! Durable record of which video ids have already been announced. This file
//! is the program's only persistent state: it is loaded once at startup and
//! rewritten in full (write-temp + rename) after every successful addition,
//! so a crash loses at most the in-flight, not-yet-confirmed announcement.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;

/// What to do when the persisted seen-file cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptPolicy {
    /// Refuse to start. Continuing with an unknown seen-set risks
    /// re-announcing every video in the feed window.
    Fail,
    /// Back the corrupt file up to `<file>.corrupt.bak`, warn loudly, and
    /// start from an empty set.
    Reset,
}

impl Default for CorruptPolicy {
    fn default() -> Self {
        CorruptPolicy::Fail
    }
}

#[derive(Debug)]
pub struct SeenStore {
    ids: HashSet<String>,
    path: Option<PathBuf>,
}

impl SeenStore {
    /// Non-durable store for tests and dry experiments.
    pub fn in_memory() -> Self {
        Self {
            ids: HashSet::new(),
            path: None,
        }
    }

    /// Load the seen-set from `path`. A missing file is a fresh start, not
    /// an error. Unreadable or malformed contents are handled per `policy`.
    pub fn load(path: impl Into<PathBuf>, policy: CorruptPolicy) -> Result<Self, StoreError> {
        let path = path.into();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no seen-video file yet, starting empty");
                return Ok(Self {
                    ids: HashSet::new(),
                    path: Some(path),
                });
            }
            Err(e) => {
                return Err(StoreError::Corrupt {
                    path,
                    reason: format!("unreadable: {e}"),
                })
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(list) => {
                let ids: HashSet<String> = list.into_iter().collect();
                debug!(count = ids.len(), path = %path.display(), "loaded seen-video file");
                Ok(Self {
                    ids,
                    path: Some(path),
                })
            }
            Err(e) => match policy {
                CorruptPolicy::Fail => Err(StoreError::Corrupt {
                    path,
                    reason: e.to_string(),
                }),
                CorruptPolicy::Reset => {
                    let backup = quarantine_path(&path);
                    match std::fs::rename(&path, &backup) {
                        Ok(()) => warn!(
                            path = %path.display(),
                            backup = %backup.display(),
                            error = %e,
                            "seen-video file is corrupt; backed up and starting empty"
                        ),
                        Err(rename_err) => warn!(
                            path = %path.display(),
                            error = %e,
                            rename_error = %rename_err,
                            "seen-video file is corrupt and could not be backed up; starting empty"
                        ),
                    }
                    Ok(Self {
                        ids: HashSet::new(),
                        path: Some(path),
                    })
                }
            },
        }
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.ids.contains(video_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Record one announced video and persist before returning. Returns
    /// whether the id was newly inserted. On persist failure the addition is
    /// not durable and the error must be treated as fatal by the caller.
    pub fn mark_seen(&mut self, video_id: &str) -> Result<bool, StoreError> {
        if !self.ids.insert(video_id.to_string()) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Bulk-seed the store without announcing, for build mode. Persists once
    /// after all insertions and returns how many ids were new.
    pub fn record_all<I, S>(&mut self, video_ids: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0usize;
        for id in video_ids {
            if self.ids.insert(id.as_ref().to_string()) {
                added += 1;
            }
        }
        if added > 0 {
            self.persist()?;
        }
        Ok(added)
    }

    /// Full rewrite via a sibling temp file and atomic rename, so a crash
    /// mid-write can never leave a truncated seen-file behind.
    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut list: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        list.sort_unstable();
        let body = serde_json::to_string(&list).map_err(|e| StoreError::Persist {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;

        let tmp = tmp_path(path);
        std::fs::write(&tmp, body).map_err(|e| StoreError::Persist {
            path: path.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, path).map_err(|e| StoreError::Persist {
            path: path.clone(),
            source: e,
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt.bak");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_marks_and_queries() {
        let mut store = SeenStore::in_memory();
        assert!(!store.contains("v1"));
        assert!(store.mark_seen("v1").unwrap());
        assert!(store.contains("v1"));
        // Re-marking is a no-op, not an error.
        assert!(!store.mark_seen("v1").unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn roundtrip_preserves_exact_membership() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");

        let mut store = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
        for id in ["v1", "v3", "v9"] {
            store.mark_seen(id).unwrap();
        }

        let reloaded = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
        assert_eq!(reloaded.len(), 3);
        for id in ["v1", "v3", "v9"] {
            assert!(reloaded.contains(id));
        }
        assert!(!reloaded.contains("v2"));
    }

    #[test]
    fn missing_file_is_a_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::load(dir.path().join("nope.json"), CorruptPolicy::Fail).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_fails_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = SeenStore::load(&path, CorruptPolicy::Fail).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn corrupt_file_is_quarantined_under_reset_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        std::fs::write(&path, "\"a string, not a list\"").unwrap();

        let store = SeenStore::load(&path, CorruptPolicy::Reset).unwrap();
        assert!(store.is_empty());
        assert!(dir.path().join("seen.json.corrupt.bak").exists());
    }

    #[test]
    fn record_all_seeds_in_bulk_and_counts_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");

        let mut store = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
        store.mark_seen("v7").unwrap();
        let added = store.record_all(["v7", "v8"]).unwrap();
        assert_eq!(added, 1);

        let reloaded = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
        assert!(reloaded.contains("v7"));
        assert!(reloaded.contains("v8"));
    }

    #[test]
    fn persist_failure_surfaces_instead_of_claiming_durability() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so the temp-file write must fail.
        let path = dir.path().join("missing").join("seen.json");

        let mut store = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
        let err = store.mark_seen("v1").unwrap_err();
        assert!(matches!(err, StoreError::Persist { .. }));
    }

    #[test]
    fn persist_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");

        let mut store = SeenStore::load(&path, CorruptPolicy::Fail).unwrap();
        store.mark_seen("v1").unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("seen.json.tmp").exists());
    }
}
