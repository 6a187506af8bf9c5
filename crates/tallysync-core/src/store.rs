//! SQLite persistence with backup-before-write and replace-all semantics
//!
//! The store holds paths, not a live connection; every operation opens its
//! own connection so the transaction boundary stays the sole serialization
//! point between the extraction task and concurrent API reads. WAL mode
//! guarantees readers see either the pre-replace or post-replace account
//! set, never a partial one.

use chrono::Local;
use log::{info, warn};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tallysync_config::Config;
use tallysync_parser::{AccountRecord, AccountType};

use crate::error::CoreError;

const CREATE_ACCOUNTS_SQL: &str = "
    CREATE TABLE accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        closing_balance REAL NOT NULL,
        due_date TEXT,
        parent_group TEXT,
        last_updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )";

/// One account row as read back from the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAccount {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub closing_balance: f64,
    pub due_date: String,
    pub parent_group: String,
    pub last_updated: String,
}

/// Handle to the accounts database
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
    backup_dir: PathBuf,
}

impl Store {
    pub fn new(config: &Config) -> Self {
        Self {
            db_path: config.storage.db_path.clone(),
            backup_dir: config.storage.backup_dir.clone(),
        }
    }

    /// Whether the database file exists on disk yet
    pub fn exists(&self) -> bool {
        self.db_path.exists()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, CoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(conn)
    }

    /// First-run schema detection. A missing table or a pre-`due_date`
    /// schema is dropped and recreated; this is the only destructive path.
    pub fn ensure_schema(&self) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.backup_dir)?;

        let conn = self.open()?;
        let has_table: bool = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'accounts'",
            [],
            |row| row.get::<_, i64>(0),
        )? > 0;

        if !has_table || !column_exists(&conn, "due_date")? {
            conn.execute("DROP TABLE IF EXISTS accounts", [])?;
            conn.execute(CREATE_ACCOUNTS_SQL, [])?;
            info!("recreated accounts table with due_date column");
        }

        info!("database setup complete");
        Ok(())
    }

    /// Copy the current database file to a timestamped backup. Best-effort:
    /// callers log a failure and continue.
    pub fn backup(&self) -> std::io::Result<Option<PathBuf>> {
        if !self.db_path.exists() {
            return Ok(None);
        }
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let backup_path = self.backup_dir.join(format!("tally_data_{}.db", stamp));
        std::fs::copy(&self.db_path, &backup_path)?;
        Ok(Some(backup_path))
    }

    /// Replace the full account set in one transaction.
    ///
    /// The previous file is backed up first, the schema is reconciled
    /// additively, then delete-all plus insert-all commit together. A
    /// mid-transaction failure rolls back to the previous contents.
    pub fn replace_all(&self, records: &[AccountRecord]) -> Result<usize, CoreError> {
        match self.backup() {
            Ok(Some(path)) => info!("database backed up to {}", path.display()),
            Ok(None) => {}
            Err(e) => warn!("database backup failed: {}", e),
        }

        let mut conn = self.open()?;

        if !column_exists(&conn, "due_date")? {
            conn.execute("ALTER TABLE accounts ADD COLUMN due_date TEXT", [])?;
            info!("added due_date column to accounts table");
        }

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM accounts", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO accounts (name, type, closing_balance, due_date, parent_group, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.name,
                    record.account_type.to_string(),
                    record.balance,
                    record.due_date,
                    record.parent_group,
                    record.last_updated.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;

        info!("saved {} accounts to database", records.len());
        Ok(records.len())
    }

    /// All rows, ordered by balance descending
    pub fn fetch_all(&self) -> Result<Vec<StoredAccount>, CoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT name, type, closing_balance, due_date, parent_group, last_updated
             FROM accounts
             ORDER BY closing_balance DESC",
        )?;

        let accounts = stmt
            .query_map([], |row| {
                let type_text: String = row.get(1)?;
                let account_type = type_text.parse::<AccountType>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        e.into(),
                    )
                })?;

                Ok(StoredAccount {
                    name: row.get(0)?,
                    account_type,
                    closing_balance: row.get(2)?,
                    due_date: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    parent_group: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    last_updated: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(accounts)
    }
}

fn column_exists(conn: &Connection, column: &str) -> Result<bool, CoreError> {
    let mut stmt = conn.prepare("PRAGMA table_info(accounts)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns.iter().any(|c| c == column))
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tallysync_config::Config;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.db_path = dir.path().join("tally_data.db");
        config.storage.backup_dir = dir.path().join("backups");
        let store = Store::new(&config);
        store.ensure_schema().unwrap();
        (dir, store)
    }

    fn record(name: &str, account_type: AccountType, balance: f64) -> AccountRecord {
        AccountRecord {
            name: name.to_string(),
            account_type,
            balance,
            due_date: String::new(),
            parent_group: "Sundry Debtors".to_string(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_replace_all_and_fetch_ordered() {
        let (_dir, store) = test_store();
        store
            .replace_all(&[
                record("Small", AccountType::Debtor, 10.0),
                record("Big", AccountType::Debtor, 1000.0),
                record("Mid", AccountType::Creditor, 500.0),
            ])
            .unwrap();

        let accounts = store.fetch_all().unwrap();
        let names: Vec<&str> = accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Big", "Mid", "Small"]);
        assert_eq!(accounts[0].account_type, AccountType::Debtor);
    }

    #[test]
    fn test_replace_all_supersedes_previous_batch() {
        let (_dir, store) = test_store();
        store
            .replace_all(&[record("Old", AccountType::Debtor, 100.0)])
            .unwrap();
        store
            .replace_all(&[record("New", AccountType::Creditor, 40.0)])
            .unwrap();

        let accounts = store.fetch_all().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "New");
    }

    #[test]
    fn test_backup_created_before_replace() {
        let (dir, store) = test_store();
        store
            .replace_all(&[record("A", AccountType::Debtor, 100.0)])
            .unwrap();
        // the db file existed after ensure_schema, so the second replace
        // must have copied it aside first
        store
            .replace_all(&[record("B", AccountType::Debtor, 100.0)])
            .unwrap();

        let backups: Vec<_> = std::fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .collect();
        assert!(!backups.is_empty());
    }

    #[test]
    fn test_legacy_schema_gains_due_date_column() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("tally_data.db");

        // simulate a pre-due_date deployment
        let conn = Connection::open(&db_path).unwrap();
        conn.execute(
            "CREATE TABLE accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                closing_balance REAL NOT NULL,
                parent_group TEXT,
                last_updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .unwrap();
        drop(conn);

        let mut config = Config::default();
        config.storage.db_path = db_path;
        config.storage.backup_dir = dir.path().join("backups");
        std::fs::create_dir_all(&config.storage.backup_dir).unwrap();
        let store = Store::new(&config);

        store
            .replace_all(&[record("Migrated", AccountType::Debtor, 10.0)])
            .unwrap();
        let accounts = store.fetch_all().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].due_date, "");
    }

    #[test]
    fn test_ensure_schema_recreates_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("tally_data.db");

        let conn = Connection::open(&db_path).unwrap();
        conn.execute("CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT)", [])
            .unwrap();
        conn.execute("INSERT INTO accounts (name) VALUES ('stale')", [])
            .unwrap();
        drop(conn);

        let mut config = Config::default();
        config.storage.db_path = db_path;
        config.storage.backup_dir = dir.path().join("backups");
        let store = Store::new(&config);
        store.ensure_schema().unwrap();

        assert!(store.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn test_empty_table_reads_back_empty() {
        let (_dir, store) = test_store();
        assert!(store.fetch_all().unwrap().is_empty());
    }
}
