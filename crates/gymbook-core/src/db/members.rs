//! Member repository implementation

use rusqlite::types::Type;
use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{Member, MemberId};
use crate::sync::LocalCollection;

use super::Database;

/// Trait for member storage operations
pub trait MemberRepository {
    /// Insert a new member
    fn create(&self, member: &Member) -> Result<()>;

    /// Get a member by ID
    fn get(&self, id: &MemberId) -> Result<Option<Member>>;

    /// List all members, newest first
    fn list(&self) -> Result<Vec<Member>>;

    /// Write back an edited member, refreshing `last_updated`
    fn update(&self, member: &Member) -> Result<Member>;

    /// Delete a member. The row is removed immediately; the remote copy
    /// goes away on the next sync pass that observes the local absence.
    fn delete(&self, id: &MemberId) -> Result<()>;
}

/// `SQLite` implementation of `MemberRepository`
pub struct SqliteMemberRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMemberRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a member from a database row
    fn parse_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<Member> {
        let id: String = row.get(0)?;
        let gender: String = row.get(2)?;
        let level: String = row.get(5)?;
        Ok(Member {
            id: id.parse().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Text, "invalid member id".into())
            })?,
            name: row.get(1)?,
            gender: gender.parse().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, "invalid gender".into())
            })?,
            age: row.get(3)?,
            weight_kg: row.get(4)?,
            experience_level: level.parse().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    Type::Text,
                    "invalid experience level".into(),
                )
            })?,
            enrolled_at: row.get(6)?,
            last_updated: row.get(7)?,
        })
    }
}

const MEMBER_COLUMNS: &str =
    "id, name, gender, age, weight_kg, experience_level, enrolled_at, last_updated";

impl MemberRepository for SqliteMemberRepository<'_> {
    fn create(&self, member: &Member) -> Result<()> {
        self.conn.execute(
            "INSERT INTO members (id, name, gender, age, weight_kg, experience_level, enrolled_at, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                member.id.as_str(),
                member.name,
                member.gender.as_str(),
                member.age,
                member.weight_kg,
                member.experience_level.as_str(),
                member.enrolled_at,
                member.last_updated,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &MemberId) -> Result<Option<Member>> {
        let result = self.conn.query_row(
            &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?"),
            params![id.as_str()],
            Self::parse_member,
        );

        match result {
            Ok(member) => Ok(Some(member)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<Member>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members ORDER BY enrolled_at DESC"
        ))?;

        let members = stmt
            .query_map([], Self::parse_member)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(members)
    }

    fn update(&self, member: &Member) -> Result<Member> {
        let now = crate::models::now_millis();

        let rows = self.conn.execute(
            "UPDATE members
             SET name = ?, gender = ?, age = ?, weight_kg = ?, experience_level = ?,
                 enrolled_at = ?, last_updated = ?
             WHERE id = ?",
            params![
                member.name,
                member.gender.as_str(),
                member.age,
                member.weight_kg,
                member.experience_level.as_str(),
                member.enrolled_at,
                now,
                member.id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(member.id.to_string()));
        }

        self.get(&member.id)?
            .ok_or_else(|| Error::NotFound(member.id.to_string()))
    }

    fn delete(&self, id: &MemberId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM members WHERE id = ?", params![id.as_str()])?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }
}

impl LocalCollection<Member> for Database {
    fn list_all(&self) -> Result<Vec<Member>> {
        SqliteMemberRepository::new(self.connection()).list()
    }

    fn upsert_many(&self, items: &[Member]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let tx = self.connection().unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO members
                 (id, name, gender, age, weight_kg, experience_level, enrolled_at, last_updated)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for member in items {
                stmt.execute(params![
                    member.id.as_str(),
                    member.name,
                    member.gender.as_str(),
                    member.age,
                    member.weight_kg,
                    member.experience_level.as_str(),
                    member.enrolled_at,
                    member.last_updated,
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
            let mut stmt = tx.prepare("DELETE FROM members WHERE id = ?")?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.connection().execute("DELETE FROM members", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExperienceLevel, Gender};

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample() -> Member {
        Member::new("Ana", Gender::Female, 29, 61.5, ExperienceLevel::Intermediate)
    }

    #[test]
    fn test_create_and_get() {
        let db = setup();
        let repo = SqliteMemberRepository::new(db.connection());

        let member = sample();
        repo.create(&member).unwrap();

        let fetched = repo.get(&member.id).unwrap().unwrap();
        assert_eq!(fetched, member);
    }

    #[test]
    fn test_update_refreshes_last_updated() {
        let db = setup();
        let repo = SqliteMemberRepository::new(db.connection());

        let mut member = sample();
        repo.create(&member).unwrap();

        member.name = "Ana Maria".to_string();
        let updated = repo.update(&member).unwrap();

        assert_eq!(updated.name, "Ana Maria");
        assert!(updated.last_updated >= member.last_updated);
    }

    #[test]
    fn test_delete_is_hard() {
        let db = setup();
        let repo = SqliteMemberRepository::new(db.connection());

        let member = sample();
        repo.create(&member).unwrap();
        repo.delete(&member.id).unwrap();

        assert!(repo.get(&member.id).unwrap().is_none());
        assert!(matches!(
            repo.delete(&member.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_stored_id_is_an_error() {
        let db = setup();
        // Ids are never regenerated when reading; a corrupt one must fail
        db.connection()
            .execute(
                "INSERT INTO members
                 (id, name, gender, age, weight_kg, experience_level, enrolled_at, last_updated)
                 VALUES ('not-a-uuid', 'X', 'male', 30, 70.0, 'beginner', 1, 1)",
                [],
            )
            .unwrap();

        let repo = SqliteMemberRepository::new(db.connection());
        assert!(matches!(repo.list(), Err(Error::Sqlite(_))));
    }

    #[test]
    fn test_upsert_many_replaces_by_id() {
        let db = setup();

        let mut member = sample();
        db.upsert_many(std::slice::from_ref(&member)).unwrap();

        member.name = "Renamed".to_string();
        member.last_updated += 1;
        db.upsert_many(std::slice::from_ref(&member)).unwrap();

        let all: Vec<Member> = db.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Renamed");
    }

    #[test]
    fn test_delete_by_ids_tolerates_absent() {
        let db = setup();

        let member = sample();
        db.upsert_many(std::slice::from_ref(&member)).unwrap();

        LocalCollection::<Member>::delete_by_ids(
            &db,
            &[member.id.as_str().to_string(), "not-a-real-id".to_string()],
        )
        .unwrap();
        LocalCollection::<Member>::delete_by_ids(&db, &[]).unwrap();

        let all: Vec<Member> = db.list_all().unwrap();
        assert!(all.is_empty());
    }
}
