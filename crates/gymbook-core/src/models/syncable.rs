//! Shared sync-metadata contract for synchronizable records.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record that can be reconciled between the local store and the
/// per-account remote document store.
///
/// Every implementor carries a stable, client-generated id (the document
/// key on the remote side) and a last-modified timestamp in Unix
/// milliseconds. The timestamp is the sole arbiter of conflict
/// resolution: the strictly newer copy wins, equal timestamps keep the
/// existing copy.
pub trait SyncRecord: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Remote collection name for this record type.
    const COLLECTION: &'static str;

    /// Stable unique id, immutable for the record's lifetime.
    fn sync_id(&self) -> String;

    /// Last modification time in Unix milliseconds. Never decreases
    /// across successive writes from the same writer.
    fn last_updated(&self) -> i64;
}

/// Current Unix timestamp in milliseconds, the resolution used by all
/// record timestamps.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
