//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| Ok(row.get::<_, i32>(0)? != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", [])?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Members table
        "CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            gender TEXT NOT NULL,
            age INTEGER NOT NULL,
            weight_kg REAL NOT NULL,
            experience_level TEXT NOT NULL,
            enrolled_at INTEGER NOT NULL,
            last_updated INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_members_last_updated ON members(last_updated DESC)",
        // Membership plans table
        "CREATE TABLE IF NOT EXISTS membership_plans (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            price REAL NOT NULL,
            duration_days INTEGER NOT NULL,
            last_updated INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_plans_last_updated ON membership_plans(last_updated DESC)",
        // Enrollments table. No foreign keys: member/plan references are
        // unvalidated by contract, a row may outlive either side.
        "CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            member_id TEXT NOT NULL,
            plan_id TEXT NOT NULL,
            paid_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            paid INTEGER NOT NULL DEFAULT 0,
            last_updated INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_enrollments_member ON enrollments(member_id)",
        "CREATE INDEX IF NOT EXISTS idx_enrollments_last_updated ON enrollments(last_updated DESC)",
        // Settings table (local only, holds the sync watermark)
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, []) {
            conn.execute("ROLLBACK", []).ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", []) {
        conn.execute("ROLLBACK", []).ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
