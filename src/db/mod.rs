mod badges;
mod catalog;
mod learning;
mod migrate;
mod monitoring;
mod paths;
mod practice;
mod schema;
mod seed;
mod telemetry;
mod users;
mod views;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use tracing::debug;

use crate::error::Result;

pub use migrate::{Migration, MIGRATIONS};
pub use monitoring::check_alerts;
pub use seed::SeedReport;
pub use users::{PATH_COMPLETION_POINTS, PATH_STEP_POINTS, REVIEW_BASE_POINTS};

/// Storage format of every timestamp column; matches `datetime('now')`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened database");
        Self::configure(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        // CASCADE and SET NULL are only honored with enforcement on
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    /// Bring the schema up to date. Safe to run on every start.
    pub fn init(&self) -> Result<()> {
        self.migrate()?;
        Ok(())
    }

    /// Begin a write transaction that takes the database write lock up front,
    /// so read-modify-write sequences on the same user cannot interleave.
    fn write_tx(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

pub(crate) fn sql_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn now_timestamp() -> String {
    sql_timestamp(Utc::now())
}

pub(crate) fn parse_sql_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

// JSON array columns are read leniently: malformed content reads as empty
pub(crate) fn json_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub(crate) fn json_value(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    mod connection_tests {
        use super::*;

        #[test]
        fn foreign_keys_are_enforced() {
            let db = setup_db();
            let on: i64 = db
                .conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                .unwrap();
            assert_eq!(on, 1);
        }

        #[test]
        fn file_database_persists_between_opens() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("jpr.db");
            {
                let db = Database::open(&path).unwrap();
                db.init().unwrap();
                add_user(&db, "persist@example.com");
            }
            let db = Database::open(&path).unwrap();
            db.init().unwrap();
            assert!(db.get_user_by_email("persist@example.com").unwrap().is_some());
        }
    }

    mod timestamp_tests {
        use super::*;
        use chrono::TimeZone;

        #[test]
        fn format_matches_sqlite_datetime() {
            let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
            assert_eq!(sql_timestamp(at), "2024-03-09 07:05:01");
            assert_eq!(parse_sql_timestamp("2024-03-09 07:05:01"), Some(at));
        }

        #[test]
        fn parse_rejects_garbage() {
            assert_eq!(parse_sql_timestamp("yesterday"), None);
        }

        #[test]
        fn now_is_comparable_with_column_defaults() {
            let db = setup_db();
            let sqlite_now: String = db
                .conn
                .query_row("SELECT datetime('now')", [], |row| row.get(0))
                .unwrap();
            assert_eq!(sqlite_now.len(), now_timestamp().len());
        }
    }

    mod json_tests {
        use super::*;

        #[test]
        fn json_list_is_lenient() {
            assert_eq!(json_list(Some(r#"["a","b"]"#.into())), vec!["a", "b"]);
            assert!(json_list(Some("not json".into())).is_empty());
            assert!(json_list(None).is_empty());
        }
    }
}
