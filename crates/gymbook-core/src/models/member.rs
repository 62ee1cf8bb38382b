//! Member model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::syncable::{now_millis, SyncRecord};
use crate::error::Error;

/// A unique identifier for a member, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(Uuid);

impl MemberId {
    /// Create a new unique member ID using UUID v7
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

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MemberId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Member gender, stored as snake_case text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            _ => Err(Error::InvalidInput(format!("unknown gender: {s}"))),
        }
    }
}

/// Training experience level, stored as snake_case text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(Error::InvalidInput(format!(
                "unknown experience level: {s}"
            ))),
        }
    }
}

/// A gym member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Unique identifier, immutable once assigned
    pub id: MemberId,
    /// Display name
    pub name: String,
    pub gender: Gender,
    /// Age in years
    pub age: u32,
    /// Body weight in kilograms
    pub weight_kg: f64,
    pub experience_level: ExperienceLevel,
    /// Date the member joined the gym (Unix ms)
    pub enrolled_at: i64,
    /// Last update timestamp (Unix ms), refreshed on every mutation
    pub last_updated: i64,
}

impl Member {
    /// Create a new member with a fresh id, enrolled now
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        gender: Gender,
        age: u32,
        weight_kg: f64,
        experience_level: ExperienceLevel,
    ) -> Self {
        let now = now_millis();
        Self {
            id: MemberId::new(),
            name: name.into(),
            gender,
            age,
            weight_kg,
            experience_level,
            enrolled_at: now,
            last_updated: now,
        }
    }

    /// Refresh the last-updated timestamp after a local edit
    pub fn touch(&mut self) {
        self.last_updated = now_millis();
    }
}

impl SyncRecord for Member {
    const COLLECTION: &'static str = "members";

    fn sync_id(&self) -> String {
        self.id.as_str()
    }

    fn last_updated(&self) -> i64 {
        self.last_updated
    }
}
