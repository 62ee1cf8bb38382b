//! Enrollment model
//!
//! An enrollment records the purchase of a membership plan by a member.
//! The member/plan references are plain ids: the sync engine never
//! validates them across stores, so a dangling reference (e.g. the plan
//! was deleted on another device) is tolerated and left to the
//! presentation layer to surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::member::MemberId;
use super::plan::PlanId;
use super::syncable::{now_millis, SyncRecord};

/// A unique identifier for an enrollment, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(Uuid);

impl EnrollmentId {
    /// Create a new unique enrollment ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EnrollmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EnrollmentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A member's enrollment in a membership plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    /// Unique identifier, immutable once assigned
    pub id: EnrollmentId,
    /// Enrolled member (unvalidated reference)
    pub member_id: MemberId,
    /// Purchased plan (unvalidated reference)
    pub plan_id: PlanId,
    /// Payment date (Unix ms)
    pub paid_at: i64,
    /// Expiration date (Unix ms)
    pub expires_at: i64,
    /// Whether the enrollment has been paid for
    pub paid: bool,
    /// Last update timestamp (Unix ms), refreshed on every mutation
    pub last_updated: i64,
}

impl Enrollment {
    /// Create a new enrollment paid now and expiring after `duration_days`
    #[must_use]
    pub fn new(member_id: MemberId, plan_id: PlanId, duration_days: i64, paid: bool) -> Self {
        let now = now_millis();
        Self {
            id: EnrollmentId::new(),
            member_id,
            plan_id,
            paid_at: now,
            expires_at: now + duration_days * 86_400_000,
            paid,
            last_updated: now,
        }
    }

    /// Refresh the last-updated timestamp after a local edit
    pub fn touch(&mut self) {
        self.last_updated = now_millis();
    }

    /// Whether the enrollment has expired at the given instant (Unix ms)
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

impl SyncRecord for Enrollment {
    const COLLECTION: &'static str = "enrollments";

    fn sync_id(&self) -> String {
        self.id.as_str()
    }

    fn last_updated(&self) -> i64 {
        self.last_updated
    }
}
