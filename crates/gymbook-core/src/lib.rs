//! gymbook-core - Core library for GymBook
//!
//! This crate contains the shared models, local database layer, and the
//! local/cloud synchronization engine used by all GymBook interfaces.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use db::Database;
pub use error::{Error, Result};
pub use models::{Enrollment, EnrollmentId, Member, MemberId, MembershipPlan, PlanId};
