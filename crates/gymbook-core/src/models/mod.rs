//! Data models

mod enrollment;
mod member;
mod plan;
mod syncable;

pub use enrollment::{Enrollment, EnrollmentId};
pub use member::{ExperienceLevel, Gender, Member, MemberId};
pub use plan::{MembershipPlan, PlanId};
pub use syncable::{now_millis, SyncRecord};
