//! Membership plan repository implementation

use rusqlite::types::Type;
use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{MembershipPlan, PlanId};
use crate::sync::LocalCollection;

use super::Database;

/// Trait for plan storage operations
pub trait PlanRepository {
    /// Insert a new plan
    fn create(&self, plan: &MembershipPlan) -> Result<()>;

    /// Get a plan by ID
    fn get(&self, id: &PlanId) -> Result<Option<MembershipPlan>>;

    /// List all plans ordered by name
    fn list(&self) -> Result<Vec<MembershipPlan>>;

    /// Write back an edited plan, refreshing `last_updated`
    fn update(&self, plan: &MembershipPlan) -> Result<MembershipPlan>;

    /// Delete a plan
    fn delete(&self, id: &PlanId) -> Result<()>;
}

/// `SQLite` implementation of `PlanRepository`
pub struct SqlitePlanRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePlanRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_plan(row: &rusqlite::Row<'_>) -> rusqlite::Result<MembershipPlan> {
        let id: String = row.get(0)?;
        Ok(MembershipPlan {
            id: id.parse().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Text, "invalid plan id".into())
            })?,
            name: row.get(1)?,
            price: row.get(2)?,
            duration_days: row.get(3)?,
            last_updated: row.get(4)?,
        })
    }
}

impl PlanRepository for SqlitePlanRepository<'_> {
    fn create(&self, plan: &MembershipPlan) -> Result<()> {
        self.conn.execute(
            "INSERT INTO membership_plans (id, name, price, duration_days, last_updated)
             VALUES (?, ?, ?, ?, ?)",
            params![
                plan.id.as_str(),
                plan.name,
                plan.price,
                plan.duration_days,
                plan.last_updated,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &PlanId) -> Result<Option<MembershipPlan>> {
        let result = self.conn.query_row(
            "SELECT id, name, price, duration_days, last_updated
             FROM membership_plans WHERE id = ?",
            params![id.as_str()],
            Self::parse_plan,
        );

        match result {
            Ok(plan) => Ok(Some(plan)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<MembershipPlan>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, price, duration_days, last_updated
             FROM membership_plans ORDER BY name ASC",
        )?;

        let plans = stmt
            .query_map([], Self::parse_plan)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(plans)
    }

    fn update(&self, plan: &MembershipPlan) -> Result<MembershipPlan> {
        let now = crate::models::now_millis();

        let rows = self.conn.execute(
            "UPDATE membership_plans
             SET name = ?, price = ?, duration_days = ?, last_updated = ?
             WHERE id = ?",
            params![
                plan.name,
                plan.price,
                plan.duration_days,
                now,
                plan.id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(plan.id.to_string()));
        }

        self.get(&plan.id)?
            .ok_or_else(|| Error::NotFound(plan.id.to_string()))
    }

    fn delete(&self, id: &PlanId) -> Result<()> {
        let rows = self.conn.execute(
            "DELETE FROM membership_plans WHERE id = ?",
            params![id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }
}

impl LocalCollection<MembershipPlan> for Database {
    fn list_all(&self) -> Result<Vec<MembershipPlan>> {
        SqlitePlanRepository::new(self.connection()).list()
    }

    fn upsert_many(&self, items: &[MembershipPlan]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let tx = self.connection().unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO membership_plans
                 (id, name, price, duration_days, last_updated)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for plan in items {
                stmt.execute(params![
                    plan.id.as_str(),
                    plan.name,
                    plan.price,
                    plan.duration_days,
                    plan.last_updated,
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
            let mut stmt = tx.prepare("DELETE FROM membership_plans WHERE id = ?")?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.connection().execute("DELETE FROM membership_plans", [])?;
        Ok(())
    }
}
