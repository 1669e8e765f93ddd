use rusqlite::params;
use tracing::{debug, info};

use super::{now_timestamp, schema, Database};
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial",
        sql: schema::V1_INITIAL,
    },
    Migration {
        version: 2,
        name: "business_key_references",
        sql: schema::V2_BUSINESS_KEY_REFERENCES,
    },
    Migration {
        version: 3,
        name: "interaction_type_registry",
        sql: schema::V3_INTERACTION_TYPE_REGISTRY,
    },
    Migration {
        version: 4,
        name: "derived_views",
        sql: schema::V4_DERIVED_VIEWS,
    },
    Migration {
        version: 5,
        name: "learning_progress",
        sql: schema::V5_LEARNING_PROGRESS,
    },
];

impl Database {
    pub fn latest_version() -> i64 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    /// Apply every pending migration. Returns how many ran.
    pub fn migrate(&self) -> Result<usize> {
        self.migrate_to(Self::latest_version())
    }

    /// Apply pending migrations up to and including `target`, each in its
    /// own transaction.
    pub fn migrate_to(&self, target: i64) -> Result<usize> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );
            "#,
        )?;

        let current = self.schema_version()?;
        let mut applied = 0;

        for migration in MIGRATIONS
            .iter()
            .filter(|m| m.version > current && m.version <= target)
        {
            let tx = self.write_tx()?;
            tx.execute_batch(migration.sql)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, now_timestamp()],
            )?;
            tx.commit()?;
            info!(
                version = migration.version,
                name = migration.name,
                "applied migration"
            );
            applied += 1;
        }

        if applied == 0 {
            debug!(version = current, "schema up to date");
        }
        Ok(applied)
    }

    pub fn schema_version(&self) -> Result<i64> {
        let has_table: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
            [],
            |row| row.get(0),
        )?;
        if !has_table {
            return Ok(0);
        }
        Ok(self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )?)
    }

    /// Names of required tables and views that are missing.
    pub fn verify_schema(&self) -> Result<Vec<&'static str>> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1")?;
        let mut missing = Vec::new();
        for name in schema::REQUIRED_OBJECTS {
            let found: i64 = stmt.query_row(params![name], |row| row.get(0))?;
            if found == 0 {
                missing.push(*name);
            }
        }
        Ok(missing)
    }
}
