//! Remote document-store capability and an in-memory implementation
//! used by tests and offline development.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;

use crate::models::SyncRecord;

use super::REMOTE_BATCH_LIMIT;

/// Result type alias for remote store operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Faults raised by a remote store implementation. Every variant maps to
/// the pass-level `StoreUnavailable` condition: the current entity's
/// reconciliation aborts and the whole pass reports failure.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network error
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success API response
    #[error("Remote API error: {0}")]
    Api(String),

    /// Response body did not match the expected document shape
    #[error("Invalid remote payload: {0}")]
    Payload(String),

    /// Store reachable but refusing service
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

/// Per-account remote document store, one collection per record type.
///
/// Implementations scope every operation to `account_id`'s namespace;
/// the document key is the record's `sync_id`.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Full unordered snapshot of the account's collection
    async fn list_all<T: SyncRecord>(&self, account_id: &str) -> RemoteResult<Vec<T>>;

    /// Documents with `lastUpdated > since`; behaves as `list_all` when
    /// `since` is 0
    async fn list_updated_after<T: SyncRecord>(
        &self,
        account_id: &str,
        since: i64,
    ) -> RemoteResult<Vec<T>>;

    /// Insert-or-merge by document key, chunked into batches of at most
    /// [`REMOTE_BATCH_LIMIT`] documents. Empty input is a no-op.
    async fn upsert_many<T: SyncRecord>(&self, account_id: &str, items: &[T])
        -> RemoteResult<()>;

    /// Delete documents by key; absent keys are not an error
    async fn delete_by_ids<T: SyncRecord>(
        &self,
        account_id: &str,
        ids: &[String],
    ) -> RemoteResult<()>;
}

/// In-memory remote store double.
///
/// Keeps raw JSON documents per account/collection, records the size of
/// every upsert batch, and can be switched into a failing mode to
/// exercise the pass-failure paths.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    push_batch_sizes: Mutex<Vec<usize>>,
    failing: AtomicBool,
}

impl MemoryRemoteStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(account_id: &str, collection: &str) -> String {
        format!("{account_id}/{collection}")
    }

    fn check_available(&self) -> RemoteResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }

    /// Make every subsequent operation fail with `Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Seed documents without recording push batches (test setup)
    pub fn seed<T: SyncRecord>(&self, account_id: &str, items: &[T]) {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections
            .entry(Self::key(account_id, T::COLLECTION))
            .or_default();
        for item in items {
            let doc = serde_json::to_value(item).expect("seed serialization");
            collection.insert(item.sync_id(), doc);
        }
    }

    /// Raw snapshot of a collection, keyed by document id
    #[must_use]
    pub fn snapshot(&self, account_id: &str, collection: &str) -> BTreeMap<String, Value> {
        self.collections
            .lock()
            .unwrap()
            .get(&Self::key(account_id, collection))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of documents in a collection
    #[must_use]
    pub fn document_count(&self, account_id: &str, collection: &str) -> usize {
        self.snapshot(account_id, collection).len()
    }

    /// Sizes of every upsert batch applied so far, in order
    #[must_use]
    pub fn push_batch_sizes(&self) -> Vec<usize> {
        self.push_batch_sizes.lock().unwrap().clone()
    }

    fn documents(&self, account_id: &str, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(&Self::key(account_id, collection))
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn doc_last_updated(doc: &Value) -> i64 {
    doc.get("lastUpdated").and_then(Value::as_i64).unwrap_or(0)
}

fn decode<T: SyncRecord>(doc: Value) -> RemoteResult<T> {
    serde_json::from_value(doc).map_err(|e| RemoteError::Payload(e.to_string()))
}

impl RemoteStore for MemoryRemoteStore {
    async fn list_all<T: SyncRecord>(&self, account_id: &str) -> RemoteResult<Vec<T>> {
        self.check_available()?;
        self.documents(account_id, T::COLLECTION)
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn list_updated_after<T: SyncRecord>(
        &self,
        account_id: &str,
        since: i64,
    ) -> RemoteResult<Vec<T>> {
        if since <= 0 {
            return self.list_all(account_id).await;
        }

        self.check_available()?;
        self.documents(account_id, T::COLLECTION)
            .into_iter()
            .filter(|doc| doc_last_updated(doc) > since)
            .map(decode)
            .collect()
    }

    async fn upsert_many<T: SyncRecord>(
        &self,
        account_id: &str,
        items: &[T],
    ) -> RemoteResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.check_available()?;

        for chunk in items.chunks(REMOTE_BATCH_LIMIT) {
            self.push_batch_sizes.lock().unwrap().push(chunk.len());

            let mut collections = self.collections.lock().unwrap();
            let collection = collections
                .entry(Self::key(account_id, T::COLLECTION))
                .or_default();
            for item in chunk {
                let doc = serde_json::to_value(item)
                    .map_err(|e| RemoteError::Payload(e.to_string()))?;
                collection.insert(item.sync_id(), doc);
            }
        }

        Ok(())
    }

    async fn delete_by_ids<T: SyncRecord>(
        &self,
        account_id: &str,
        ids: &[String],
    ) -> RemoteResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.check_available()?;

        let mut collections = self.collections.lock().unwrap();
        if let Some(collection) = collections.get_mut(&Self::key(account_id, T::COLLECTION)) {
            for id in ids {
                collection.remove(id);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MembershipPlan, SyncRecord};

    #[tokio::test]
    async fn list_updated_after_filters_by_watermark() {
        let store = MemoryRemoteStore::new();

        let mut old = MembershipPlan::new("Monthly", 29.99, 30);
        old.last_updated = 100;
        let mut new = MembershipPlan::new("Annual", 299.0, 365);
        new.last_updated = 300;
        store.seed("acct", &[old, new]);

        let changed: Vec<MembershipPlan> =
            store.list_updated_after("acct", 200).await.unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].name, "Annual");

        // A zero watermark falls back to the full listing
        let all: Vec<MembershipPlan> = store.list_updated_after("acct", 0).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn upsert_is_chunked() {
        let store = MemoryRemoteStore::new();

        let plans: Vec<MembershipPlan> = (0..1000)
            .map(|i| MembershipPlan::new(format!("Plan {i}"), 10.0, 30))
            .collect();
        store.upsert_many("acct", &plans).await.unwrap();

        assert_eq!(store.push_batch_sizes(), vec![400, 400, 200]);
        assert_eq!(store.document_count("acct", MembershipPlan::COLLECTION), 1000);
    }

    #[tokio::test]
    async fn delete_tolerates_absent_ids() {
        let store = MemoryRemoteStore::new();

        let plan = MembershipPlan::new("Monthly", 29.99, 30);
        store.seed("acct", std::slice::from_ref(&plan));

        store
            .delete_by_ids::<MembershipPlan>("acct", &[plan.sync_id(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(store.document_count("acct", MembershipPlan::COLLECTION), 0);
    }

    #[tokio::test]
    async fn failing_mode_surfaces_unavailable() {
        let store = MemoryRemoteStore::new();
        store.set_failing(true);

        let result: RemoteResult<Vec<MembershipPlan>> = store.list_all("acct").await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
    }

    #[tokio::test]
    async fn accounts_are_isolated() {
        let store = MemoryRemoteStore::new();
        store.seed("acct-a", &[MembershipPlan::new("Monthly", 29.99, 30)]);

        let other: Vec<MembershipPlan> = store.list_all("acct-b").await.unwrap();
        assert!(other.is_empty());
    }
}
