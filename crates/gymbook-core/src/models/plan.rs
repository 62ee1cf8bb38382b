//! Membership plan model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::syncable::{now_millis, SyncRecord};

/// A unique identifier for a membership plan, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(Uuid);

impl PlanId {
    /// Create a new unique plan ID using UUID v7
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

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlanId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A purchasable membership plan (e.g. "Monthly", "Quarterly")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPlan {
    /// Unique identifier, immutable once assigned
    pub id: PlanId,
    /// Plan name/type
    pub name: String,
    pub price: f64,
    /// Validity period in days
    pub duration_days: i64,
    /// Last update timestamp (Unix ms), refreshed on every mutation
    pub last_updated: i64,
}

impl MembershipPlan {
    /// Create a new plan with a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>, price: f64, duration_days: i64) -> Self {
        Self {
            id: PlanId::new(),
            name: name.into(),
            price,
            duration_days,
            last_updated: now_millis(),
        }
    }

    /// Refresh the last-updated timestamp after a local edit
    pub fn touch(&mut self) {
        self.last_updated = now_millis();
    }
}

impl SyncRecord for MembershipPlan {
    const COLLECTION: &'static str = "membership_plans";

    fn sync_id(&self) -> String {
        self.id.as_str()
    }

    fn last_updated(&self) -> i64 {
        self.last_updated
    }
}
