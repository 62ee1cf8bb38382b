//! Local `SQLite` store: connection, migrations, and per-entity repositories

mod connection;
mod enrollments;
mod members;
mod migrations;
mod plans;
mod settings;

pub use connection::Database;
pub use enrollments::{EnrollmentRepository, SqliteEnrollmentRepository};
pub use members::{MemberRepository, SqliteMemberRepository};
pub use plans::{PlanRepository, SqlitePlanRepository};
