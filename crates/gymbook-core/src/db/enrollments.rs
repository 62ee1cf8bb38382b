//! Enrollment repository implementation

use rusqlite::types::Type;
use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{Enrollment, EnrollmentId, MemberId};
use crate::sync::LocalCollection;

use super::Database;

/// Trait for enrollment storage operations
pub trait EnrollmentRepository {
    /// Insert a new enrollment
    fn create(&self, enrollment: &Enrollment) -> Result<()>;

    /// Get an enrollment by ID
    fn get(&self, id: &EnrollmentId) -> Result<Option<Enrollment>>;

    /// List all enrollments, most recent payment first
    fn list(&self) -> Result<Vec<Enrollment>>;

    /// List enrollments for one member, most recent payment first
    fn list_for_member(&self, member_id: &MemberId) -> Result<Vec<Enrollment>>;

    /// Write back an edited enrollment, refreshing `last_updated`
    fn update(&self, enrollment: &Enrollment) -> Result<Enrollment>;

    /// Delete an enrollment
    fn delete(&self, id: &EnrollmentId) -> Result<()>;
}

/// `SQLite` implementation of `EnrollmentRepository`
pub struct SqliteEnrollmentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEnrollmentRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_enrollment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
        let id: String = row.get(0)?;
        let member_id: String = row.get(1)?;
        let plan_id: String = row.get(2)?;
        let invalid_id = |column: usize, what: &str| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                Type::Text,
                format!("invalid {what} id").into(),
            )
        };
        Ok(Enrollment {
            id: id.parse().map_err(|_| invalid_id(0, "enrollment"))?,
            member_id: member_id.parse().map_err(|_| invalid_id(1, "member"))?,
            plan_id: plan_id.parse().map_err(|_| invalid_id(2, "plan"))?,
            paid_at: row.get(3)?,
            expires_at: row.get(4)?,
            paid: row.get::<_, i32>(5)? != 0,
            last_updated: row.get(6)?,
        })
    }
}

const ENROLLMENT_COLUMNS: &str =
    "id, member_id, plan_id, paid_at, expires_at, paid, last_updated";

impl EnrollmentRepository for SqliteEnrollmentRepository<'_> {
    fn create(&self, enrollment: &Enrollment) -> Result<()> {
        self.conn.execute(
            "INSERT INTO enrollments (id, member_id, plan_id, paid_at, expires_at, paid, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                enrollment.id.as_str(),
                enrollment.member_id.as_str(),
                enrollment.plan_id.as_str(),
                enrollment.paid_at,
                enrollment.expires_at,
                i32::from(enrollment.paid),
                enrollment.last_updated,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &EnrollmentId) -> Result<Option<Enrollment>> {
        let result = self.conn.query_row(
            &format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?"),
            params![id.as_str()],
            Self::parse_enrollment,
        );

        match result {
            Ok(enrollment) => Ok(Some(enrollment)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<Enrollment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments ORDER BY paid_at DESC"
        ))?;

        let enrollments = stmt
            .query_map([], Self::parse_enrollment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(enrollments)
    }

    fn list_for_member(&self, member_id: &MemberId) -> Result<Vec<Enrollment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
             WHERE member_id = ? ORDER BY paid_at DESC"
        ))?;

        let enrollments = stmt
            .query_map(params![member_id.as_str()], Self::parse_enrollment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(enrollments)
    }

    fn update(&self, enrollment: &Enrollment) -> Result<Enrollment> {
        let now = crate::models::now_millis();

        let rows = self.conn.execute(
            "UPDATE enrollments
             SET member_id = ?, plan_id = ?, paid_at = ?, expires_at = ?, paid = ?, last_updated = ?
             WHERE id = ?",
            params![
                enrollment.member_id.as_str(),
                enrollment.plan_id.as_str(),
                enrollment.paid_at,
                enrollment.expires_at,
                i32::from(enrollment.paid),
                now,
                enrollment.id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(enrollment.id.to_string()));
        }

        self.get(&enrollment.id)?
            .ok_or_else(|| Error::NotFound(enrollment.id.to_string()))
    }

    fn delete(&self, id: &EnrollmentId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM enrollments WHERE id = ?", params![id.as_str()])?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }
}

impl LocalCollection<Enrollment> for Database {
    fn list_all(&self) -> Result<Vec<Enrollment>> {
        SqliteEnrollmentRepository::new(self.connection()).list()
    }

    fn upsert_many(&self, items: &[Enrollment]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let tx = self.connection().unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO enrollments
                 (id, member_id, plan_id, paid_at, expires_at, paid, last_updated)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;
            for enrollment in items {
                stmt.execute(params![
                    enrollment.id.as_str(),
                    enrollment.member_id.as_str(),
                    enrollment.plan_id.as_str(),
                    enrollment.paid_at,
                    enrollment.expires_at,
                    i32::from(enrollment.paid),
                    enrollment.last_updated,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let tx = self.connection().unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM enrollments WHERE id = ?")?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.connection().execute("DELETE FROM enrollments", [])?;
        Ok(())
    }
}
