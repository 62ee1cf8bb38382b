//! Bidirectional local/cloud synchronization engine.
//!
//! Reconciles the local `SQLite` store against the per-account remote
//! document store: last-write-wins merge by `lastUpdated`, tombstone-free
//! deletion detection via set difference against full remote listings,
//! incremental pulls bounded by a persisted per-account watermark, and
//! idempotent chunked pushes.
//!
//! Known limitation: deletion detection assumes the full remote listing
//! fetched during a pass is mutually consistent with the local listing
//! fetched in the same pass. There is no cross-device mutual exclusion,
//! so two devices syncing at the same instant can interleave passes and
//! resurrect a record deleted on one of them. The same holds without any
//! race: because a pass uploads local records before reading the remote
//! listing it checks deletions against, a remote-side deletion reaches
//! another device only when that device's copy is old enough to stay out
//! of the upload set; a device still holding the record re-uploads it
//! instead of observing the deletion. Callers must serialize their own
//! invocations;
//! concurrent multi-device passes are accepted as racy.

use serde::Serialize;
use thiserror::Error;

use crate::models::SyncRecord;

mod http;
mod orchestrator;
mod reconciler;
mod remote;

pub use http::HttpRemoteStore;
pub use orchestrator::SyncOrchestrator;
pub use remote::{MemoryRemoteStore, RemoteError, RemoteResult, RemoteStore};

/// Upper bound on documents per batched remote write, below typical
/// document-store multi-write limits.
pub const REMOTE_BATCH_LIMIT: usize = 400;

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that abort a sync pass
#[derive(Error, Debug)]
pub enum SyncError {
    /// No authenticated account id; nothing was read or written
    #[error("No authenticated account; sync aborted")]
    Unauthenticated,

    /// The local store failed during a read or write
    #[error("Local store unavailable: {0}")]
    LocalStore(#[from] crate::error::Error),

    /// The remote store failed during a read or write
    #[error("Remote store unavailable: {0}")]
    RemoteStore(#[from] RemoteError),
}

impl SyncError {
    /// Whether the scheduling host should retry the pass later
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }
}

/// Counts reported by a completed sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Records written local -> remote
    pub pushed: usize,
    /// Records written remote -> local
    pub pulled: usize,
    /// Local rows removed because they vanished remotely
    pub deleted_local: usize,
    /// Remote documents removed because they vanished locally
    pub deleted_remote: usize,
    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: i64,
    /// Watermark persisted by this pass (Unix ms)
    pub synced_at: i64,
}

/// Outcome of one `run_sync` invocation, as surfaced to the scheduling
/// host and the notification layer
#[derive(Debug)]
pub enum SyncOutcome {
    Success(SyncReport),
    Failure(SyncError),
}

impl SyncOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The report of a successful pass, if any
    #[must_use]
    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Failure(_) => None,
        }
    }
}

/// Sync-facing capability of the local store for one entity type.
///
/// Implemented by [`crate::db::Database`] once per synchronizable record
/// type. All operations are bulk and idempotent; `upsert_many` and
/// `delete_by_ids` are no-ops on empty input.
pub trait LocalCollection<T: SyncRecord> {
    /// Full unordered snapshot of the collection
    fn list_all(&self) -> crate::error::Result<Vec<T>>;

    /// Insert-or-replace by id, all rows in one transaction
    fn upsert_many(&self, items: &[T]) -> crate::error::Result<()>;

    /// Delete rows by id; absent ids are not an error
    fn delete_by_ids(&self, ids: &[String]) -> crate::error::Result<()>;

    /// Remove every row. Used only by full-restore flows, never by
    /// incremental sync.
    fn clear_all(&self) -> crate::error::Result<()>;
}

/// Exponential backoff in seconds with cap, for the scheduling host's
/// retry-after-failure loop.
pub fn backoff_seconds(consecutive_failures: i32) -> i64 {
    const MAX_EXPONENT: i32 = 8;
    const BASE_DELAY_SECONDS: i64 = 5;

    let capped = consecutive_failures.clamp(0, MAX_EXPONENT);
    2_i64.pow(capped.unsigned_abs()) * BASE_DELAY_SECONDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_exponential_and_capped() {
        assert_eq!(backoff_seconds(0), 5);
        assert_eq!(backoff_seconds(1), 10);
        assert_eq!(backoff_seconds(2), 20);
        assert_eq!(backoff_seconds(9), backoff_seconds(8));
    }

    #[test]
    fn unauthenticated_is_not_retryable() {
        assert!(!SyncError::Unauthenticated.is_retryable());
        assert!(
            SyncError::RemoteStore(RemoteError::Unavailable("down".into())).is_retryable()
        );
        assert!(
            SyncError::LocalStore(crate::error::Error::Database("locked".into())).is_retryable()
        );
    }

    #[test]
    fn outcome_accessors() {
        let ok = SyncOutcome::Success(SyncReport::default());
        assert!(ok.is_success());
        assert!(ok.report().is_some());

        let failed = SyncOutcome::Failure(SyncError::Unauthenticated);
        assert!(!failed.is_success());
        assert!(failed.report().is_none());
    }
}
