// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod engine;
pub mod error;
pub mod publish;
pub mod reconcile;
pub mod source;
pub mod store;
pub mod video;

// ---- Re-exports for stable public API ----
pub use crate::engine::{run_cycle, CycleReport};
pub use crate::error::{PublishError, SourceError, StoreError};
pub use crate::publish::{BlueskyPublisher, Publisher};
pub use crate::reconcile::{reconcile, SourcePreference};
pub use crate::store::{CorruptPolicy, SeenStore};
pub use crate::video::{SourceKind, VideoCandidate, VideoSource};
