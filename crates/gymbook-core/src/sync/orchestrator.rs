//! Sync pass orchestration: sequencing entities, watermark lifecycle,
//! and the outcome surfaced to the scheduling host.

use crate::db::Database;
use crate::models::{now_millis, Enrollment, Member, MembershipPlan, SyncRecord};

use super::reconciler::reconcile_entity;
use super::remote::RemoteStore;
use super::{LocalCollection, SyncError, SyncOutcome, SyncReport, SyncResult};

/// Runs complete sync passes against one local database and one remote
/// store. Callers must serialize invocations; overlapping passes are not
/// protected against.
pub struct SyncOrchestrator<'a, R> {
    db: &'a Database,
    remote: &'a R,
}

impl<'a, R: RemoteStore> SyncOrchestrator<'a, R> {
    pub const fn new(db: &'a Database, remote: &'a R) -> Self {
        Self { db, remote }
    }

    /// Entry point for the scheduling host. Fails fast without touching
    /// either store when no account id is available.
    pub async fn run_sync(&self, account_id: Option<&str>) -> SyncOutcome {
        let Some(account_id) = account_id.map(str::trim).filter(|id| !id.is_empty()) else {
            tracing::warn!("sync skipped: no authenticated account");
            return SyncOutcome::Failure(SyncError::Unauthenticated);
        };

        match self.try_sync(account_id, false).await {
            Ok(report) => SyncOutcome::Success(report),
            Err(error) => {
                tracing::warn!(account = account_id, %error, "sync pass failed");
                SyncOutcome::Failure(error)
            }
        }
    }

    /// One complete pass: every entity type reconciled in a fixed order
    /// (parents before dependents), watermark advanced only when all of
    /// them succeed. `force_full` ignores the stored watermark and pulls
    /// everything.
    pub async fn try_sync(&self, account_id: &str, force_full: bool) -> SyncResult<SyncReport> {
        let started_at = now_millis();
        let since = if force_full {
            0
        } else {
            self.db.last_synced_at(account_id)?
        };
        tracing::info!(account = account_id, since, "sync pass starting");

        let mut report = SyncReport::default();
        self.sync_entity::<Member>(account_id, since, &mut report)
            .await?;
        self.sync_entity::<MembershipPlan>(account_id, since, &mut report)
            .await?;
        self.sync_entity::<Enrollment>(account_id, since, &mut report)
            .await?;

        // Changes written while the pass ran are newer than this and get
        // picked up next time
        self.db.set_last_synced_at(account_id, started_at)?;
        report.synced_at = started_at;
        report.duration_ms = now_millis() - started_at;

        tracing::info!(
            account = account_id,
            pushed = report.pushed,
            pulled = report.pulled,
            deleted_local = report.deleted_local,
            deleted_remote = report.deleted_remote,
            duration_ms = report.duration_ms,
            "sync pass complete"
        );
        Ok(report)
    }

    async fn sync_entity<T>(
        &self,
        account_id: &str,
        since: i64,
        report: &mut SyncReport,
    ) -> SyncResult<()>
    where
        T: SyncRecord,
        Database: LocalCollection<T>,
    {
        reconcile_entity::<T, _, _>(self.db, self.remote, account_id, since, report).await
    }

    /// Replace the entire local store with the remote state. Used by
    /// reinstall/new-device flows, never by incremental sync.
    pub async fn restore_from_remote(&self, account_id: &str) -> SyncResult<SyncReport> {
        let started_at = now_millis();
        tracing::info!(account = account_id, "restoring local store from remote");

        let mut report = SyncReport::default();
        self.restore_entity::<Member>(account_id, &mut report).await?;
        self.restore_entity::<MembershipPlan>(account_id, &mut report)
            .await?;
        self.restore_entity::<Enrollment>(account_id, &mut report)
            .await?;

        self.db.set_last_synced_at(account_id, started_at)?;
        report.synced_at = started_at;
        report.duration_ms = now_millis() - started_at;
        Ok(report)
    }

    async fn restore_entity<T>(&self, account_id: &str, report: &mut SyncReport) -> SyncResult<()>
    where
        T: SyncRecord,
        Database: LocalCollection<T>,
    {
        let records: Vec<T> = self.remote.list_all(account_id).await?;
        LocalCollection::<T>::clear_all(self.db)?;
        self.db.upsert_many(&records)?;
        report.pulled += records.len();
        Ok(())
    }

    /// Drop the watermark and run a pass that pulls the entire remote
    /// state
    pub async fn force_full_resync(&self, account_id: &str) -> SyncResult<SyncReport> {
        self.db.clear_last_synced_at(account_id)?;
        self.try_sync(account_id, true).await
    }
}
