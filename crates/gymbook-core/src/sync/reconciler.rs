//! Last-write-wins merge planning and the per-entity reconciliation
//! routine.
//!
//! One entity type is reconciled in four strictly ordered steps:
//! upload new-or-newer local records, remove local rows absent from the
//! post-upload full remote listing, merge remote records updated after
//! the watermark, then remove remote documents absent from the post-merge
//! local listing. Uploading first guarantees never-pushed local records
//! are present in the remote listing before the set-difference deletion
//! check can see them; merging before the remote deletion check keeps
//! freshly pulled records off the orphan list.

use std::collections::{HashMap, HashSet};

use crate::models::SyncRecord;

use super::remote::RemoteStore;
use super::{LocalCollection, SyncReport, SyncResult};

/// Records from `source` that should overwrite `target`: absent on the
/// target side, or carrying a strictly greater `last_updated`. Equal
/// timestamps plan no write, which keeps repeated passes idempotent.
fn plan_upserts<T: SyncRecord>(source: &[T], target: &[T]) -> Vec<T> {
    let target_timestamps: HashMap<String, i64> = target
        .iter()
        .map(|record| (record.sync_id(), record.last_updated()))
        .collect();

    source
        .iter()
        .filter(|record| {
            target_timestamps
                .get(&record.sync_id())
                .is_none_or(|&existing| record.last_updated() > existing)
        })
        .cloned()
        .collect()
}

/// Ids present in `existing` but absent from the `authoritative` listing.
/// With no persisted tombstones, absence from the authoritative side is
/// itself the deletion signal.
fn plan_deletions<T: SyncRecord>(existing: &[T], authoritative: &[T]) -> Vec<String> {
    let keep: HashSet<String> = authoritative.iter().map(SyncRecord::sync_id).collect();

    existing
        .iter()
        .map(SyncRecord::sync_id)
        .filter(|id| !keep.contains(id))
        .collect()
}

/// Reconcile one entity type across both stores, accumulating counts
/// into `report`. Any store fault aborts mid-sequence; the caller fails
/// the whole pass.
pub(super) async fn reconcile_entity<T, L, R>(
    local: &L,
    remote: &R,
    account_id: &str,
    since: i64,
    report: &mut SyncReport,
) -> SyncResult<()>
where
    T: SyncRecord,
    L: LocalCollection<T>,
    R: RemoteStore,
{
    let local_records = local.list_all()?;
    let remote_records: Vec<T> = remote.list_all(account_id).await?;

    let outgoing = plan_upserts(&local_records, &remote_records);
    remote.upsert_many(account_id, &outgoing).await?;
    report.pushed += outgoing.len();

    // Re-list so deletion detection sees the uploads; local rows absent
    // from this listing were deleted remotely
    let remote_full: Vec<T> = remote.list_all(account_id).await?;
    let locally_orphaned = plan_deletions(&local_records, &remote_full);
    local.delete_by_ids(&locally_orphaned)?;
    report.deleted_local += locally_orphaned.len();

    let changed: Vec<T> = remote.list_updated_after(account_id, since).await?;
    let local_records = local.list_all()?;
    let incoming = plan_upserts(&changed, &local_records);
    local.upsert_many(&incoming)?;
    report.pulled += incoming.len();

    // Remote documents still missing from the merged local state were
    // deleted locally
    let local_records = local.list_all()?;
    let remotely_orphaned = plan_deletions(&remote_full, &local_records);
    remote.delete_by_ids::<T>(account_id, &remotely_orphaned).await?;
    report.deleted_remote += remotely_orphaned.len();

    tracing::debug!(
        collection = T::COLLECTION,
        pushed = outgoing.len(),
        pulled = incoming.len(),
        deleted_local = locally_orphaned.len(),
        deleted_remote = remotely_orphaned.len(),
        "entity reconciled"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;
    use crate::models::MembershipPlan;
    use crate::sync::MemoryRemoteStore;

    const ACCOUNT: &str = "acct-1";

    fn plan_at(name: &str, last_updated: i64) -> MembershipPlan {
        let mut plan = MembershipPlan::new(name, 29.99, 30);
        plan.last_updated = last_updated;
        plan
    }

    async fn reconcile(
        db: &Database,
        remote: &MemoryRemoteStore,
        since: i64,
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();
        reconcile_entity::<MembershipPlan, _, _>(db, remote, ACCOUNT, since, &mut report)
            .await?;
        Ok(report)
    }

    #[test]
    fn upsert_planning_follows_last_write_wins() {
        let newer = plan_at("Monthly", 200);
        let mut older = newer.clone();
        older.last_updated = 100;
        let only_source = plan_at("Annual", 50);

        let planned = plan_upserts(
            &[newer.clone(), only_source.clone()],
            &[older, plan_at("Quarterly", 999)],
        );
        assert_eq!(planned, vec![newer, only_source]);
    }

    #[test]
    fn equal_timestamps_plan_no_write() {
        let local = plan_at("Monthly", 100);
        let mut remote = local.clone();
        remote.name = "Monthly (renamed)".to_string();

        assert!(plan_upserts(&[remote.clone()], &[local.clone()]).is_empty());
        assert!(plan_upserts(&[local], &[remote]).is_empty());
    }

    #[test]
    fn deletion_planning_is_set_difference() {
        let kept = plan_at("Monthly", 100);
        let orphan = plan_at("Annual", 100);

        let planned = plan_deletions(&[kept.clone(), orphan.clone()], &[kept]);
        assert_eq!(planned, vec![orphan.sync_id()]);
    }

    #[tokio::test]
    async fn local_only_records_are_uploaded_not_deleted() {
        let db = Database::open_in_memory().unwrap();
        let remote = MemoryRemoteStore::new();

        let plan = plan_at("Monthly", 500);
        LocalCollection::upsert_many(&db, std::slice::from_ref(&plan)).unwrap();

        let report = reconcile(&db, &remote, 0).await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(report.deleted_local, 0);
        assert_eq!(remote.document_count(ACCOUNT, MembershipPlan::COLLECTION), 1);
        let rows: Vec<MembershipPlan> = LocalCollection::list_all(&db).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn remote_only_records_are_pulled_not_deleted() {
        let db = Database::open_in_memory().unwrap();
        let remote = MemoryRemoteStore::new();
        remote.seed(ACCOUNT, &[plan_at("Monthly", 500)]);

        let report = reconcile(&db, &remote, 0).await.unwrap();

        assert_eq!(report.pulled, 1);
        assert_eq!(report.deleted_remote, 0);
        assert_eq!(remote.document_count(ACCOUNT, MembershipPlan::COLLECTION), 1);
        let rows: Vec<MembershipPlan> = LocalCollection::list_all(&db).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn locally_deleted_records_are_removed_remotely() {
        let db = Database::open_in_memory().unwrap();
        let remote = MemoryRemoteStore::new();

        // Synced earlier, then deleted locally; the watermark is past the
        // document's timestamp so the incremental pull skips it
        remote.seed(ACCOUNT, &[plan_at("Cancelled", 100)]);

        let report = reconcile(&db, &remote, 500).await.unwrap();

        assert_eq!(report.deleted_remote, 1);
        assert_eq!(report.pulled, 0);
        assert_eq!(remote.document_count(ACCOUNT, MembershipPlan::COLLECTION), 0);
    }

    #[tokio::test]
    async fn newer_remote_copy_wins_locally() {
        let db = Database::open_in_memory().unwrap();
        let remote = MemoryRemoteStore::new();

        let local = plan_at("Monthly", 100);
        let mut remote_copy = local.clone();
        remote_copy.name = "Monthly v2".to_string();
        remote_copy.last_updated = 200;
        LocalCollection::upsert_many(&db, &[local]).unwrap();
        remote.seed(ACCOUNT, &[remote_copy]);

        let report = reconcile(&db, &remote, 0).await.unwrap();

        assert_eq!(report.pushed, 0);
        assert_eq!(report.pulled, 1);
        let rows: Vec<MembershipPlan> = LocalCollection::list_all(&db).unwrap();
        assert_eq!(rows[0].name, "Monthly v2");
        assert_eq!(rows[0].last_updated, 200);
    }

    #[tokio::test]
    async fn newer_local_copy_wins_remotely() {
        let db = Database::open_in_memory().unwrap();
        let remote = MemoryRemoteStore::new();

        let mut local = plan_at("Monthly", 300);
        local.price = 10.0;
        let mut remote_copy = local.clone();
        remote_copy.price = 20.0;
        remote_copy.last_updated = 200;
        LocalCollection::upsert_many(&db, &[local.clone()]).unwrap();
        remote.seed(ACCOUNT, &[remote_copy]);

        let report = reconcile(&db, &remote, 0).await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(report.pulled, 0);
        let doc =
            remote.snapshot(ACCOUNT, MembershipPlan::COLLECTION)[&local.sync_id()].clone();
        assert_eq!(doc["price"], 10.0);
        assert_eq!(doc["lastUpdated"], 300);
    }

    #[tokio::test]
    async fn equal_timestamps_write_nothing_either_way() {
        let db = Database::open_in_memory().unwrap();
        let remote = MemoryRemoteStore::new();

        let local = plan_at("Monthly", 100);
        let mut remote_copy = local.clone();
        remote_copy.name = "Monthly (renamed)".to_string();
        LocalCollection::upsert_many(&db, &[local.clone()]).unwrap();
        remote.seed(ACCOUNT, &[remote_copy.clone()]);

        let report = reconcile(&db, &remote, 0).await.unwrap();

        assert_eq!(report.pushed, 0);
        assert_eq!(report.pulled, 0);
        let rows: Vec<MembershipPlan> = LocalCollection::list_all(&db).unwrap();
        assert_eq!(rows[0].name, "Monthly");
        let doc =
            remote.snapshot(ACCOUNT, MembershipPlan::COLLECTION)[&local.sync_id()].clone();
        assert_eq!(doc["name"], "Monthly (renamed)");
    }

    #[tokio::test]
    async fn watermark_bounds_the_pull_but_not_deletion_detection() {
        let db = Database::open_in_memory().unwrap();
        let remote = MemoryRemoteStore::new();

        let mut shared = plan_at("Shared", 100);
        shared.price = 15.0;
        let mut shared_remote = shared.clone();
        shared_remote.price = 25.0;
        // Below the watermark, so the stale remote copy is not even
        // fetched for the merge
        LocalCollection::upsert_many(&db, &[shared.clone()]).unwrap();
        remote.seed(ACCOUNT, &[shared_remote]);
        remote.seed(ACCOUNT, &[plan_at("Fresh", 900)]);

        let report = reconcile(&db, &remote, 500).await.unwrap();

        assert_eq!(report.pulled, 1);
        assert_eq!(report.deleted_local, 0);
        let rows: Vec<MembershipPlan> = LocalCollection::list_all(&db).unwrap();
        assert_eq!(rows.len(), 2);
        let kept = rows.iter().find(|p| p.id == shared.id).unwrap();
        assert_eq!(kept.price, 15.0);
    }

    #[tokio::test]
    async fn disjoint_states_converge_on_both_sides() {
        let db = Database::open_in_memory().unwrap();
        let remote = MemoryRemoteStore::new();

        let local_only = plan_at("Local only", 100);
        let remote_only = plan_at("Remote only", 100);
        LocalCollection::upsert_many(&db, &[local_only]).unwrap();
        remote.seed(ACCOUNT, &[remote_only]);

        let report = reconcile(&db, &remote, 0).await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(report.pulled, 1);
        assert_eq!(report.deleted_local, 0);
        assert_eq!(report.deleted_remote, 0);
        let rows: Vec<MembershipPlan> = LocalCollection::list_all(&db).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(remote.document_count(ACCOUNT, MembershipPlan::COLLECTION), 2);
    }
}
