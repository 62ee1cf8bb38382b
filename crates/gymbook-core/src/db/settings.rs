//! Settings storage, including the per-account sync watermark

use rusqlite::params;

use crate::error::Result;

use super::Database;

fn watermark_key(account_id: &str) -> String {
    format!("sync.last_synced_at.{account_id}")
}

impl Database {
    /// Read a setting value, `None` when unset
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let result = self.connection().query_row(
            "SELECT value FROM settings WHERE key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a setting value
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.connection().execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a setting
    pub fn remove_setting(&self, key: &str) -> Result<()> {
        self.connection()
            .execute("DELETE FROM settings WHERE key = ?", params![key])?;
        Ok(())
    }

    /// Last successful sync timestamp for the account (Unix ms), 0 when
    /// the account has never completed a pass
    pub fn last_synced_at(&self, account_id: &str) -> Result<i64> {
        Ok(self
            .get_setting(&watermark_key(account_id))?
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }

    /// Advance the account's sync watermark. Called only after a fully
    /// successful pass.
    pub fn set_last_synced_at(&self, account_id: &str, timestamp: i64) -> Result<()> {
        self.set_setting(&watermark_key(account_id), &timestamp.to_string())
    }

    /// Drop the account's watermark so the next pass pulls everything
    /// ("force full resync")
    pub fn clear_last_synced_at(&self, account_id: &str) -> Result<()> {
        self.remove_setting(&watermark_key(account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_watermark_defaults_to_zero() {
        let db = setup();
        assert_eq!(db.last_synced_at("acct-1").unwrap(), 0);
    }

    #[test]
    fn test_watermark_is_per_account() {
        let db = setup();
        db.set_last_synced_at("acct-1", 1_000).unwrap();

        assert_eq!(db.last_synced_at("acct-1").unwrap(), 1_000);
        assert_eq!(db.last_synced_at("acct-2").unwrap(), 0);
    }

    #[test]
    fn test_clear_watermark_forces_full_resync() {
        let db = setup();
        db.set_last_synced_at("acct-1", 1_000).unwrap();
        db.clear_last_synced_at("acct-1").unwrap();

        assert_eq!(db.last_synced_at("acct-1").unwrap(), 0);
    }
}
