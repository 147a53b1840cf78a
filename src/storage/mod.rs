// src/storage/mod.rs
pub mod output;

use std::fs;
use std::path::Path;

use chrono::DateTime;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, ToSql};

use crate::models::{DashboardSnapshot, DistrictTable, PressReleaseRecord, ReportTimestamp};
use crate::utils::error::StorageError;

// Additive only: a migration may create tables or add columns, never drop.
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS press_releases (
        id INTEGER PRIMARY KEY,
        timestamp TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE
    );",
    "CREATE TABLE IF NOT EXISTS district_tables (
        id INTEGER PRIMARY KEY,
        timestamp TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS dashboards (
        id INTEGER PRIMARY KEY,
        timestamp TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL
    );",
];

/// A row type keyed by its unique timestamp.
pub trait Persist: Sized {
    const TABLE: &'static str;
    /// Mutable columns, in the order of [`Persist::values`].
    const COLUMNS: &'static [&'static str];

    fn timestamp(&self) -> &ReportTimestamp;
    fn values(&self) -> Vec<&dyn ToSql>;
    /// Builds the record from a row whose columns after `timestamp` are
    /// [`Persist::COLUMNS`], starting at index 1.
    fn from_row(timestamp: ReportTimestamp, row: &Row) -> rusqlite::Result<Self>;
}

impl Persist for PressReleaseRecord {
    const TABLE: &'static str = "press_releases";
    const COLUMNS: &'static [&'static str] = &["title", "url"];

    fn timestamp(&self) -> &ReportTimestamp {
        &self.timestamp
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.title as &dyn ToSql, &self.url]
    }

    fn from_row(timestamp: ReportTimestamp, row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            timestamp,
            title: row.get(1)?,
            url: row.get(2)?,
        })
    }
}

impl Persist for DashboardSnapshot {
    const TABLE: &'static str = "dashboards";
    const COLUMNS: &'static [&'static str] = &["content"];

    fn timestamp(&self) -> &ReportTimestamp {
        &self.timestamp
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.content as &dyn ToSql]
    }

    fn from_row(timestamp: ReportTimestamp, row: &Row) -> rusqlite::Result<Self> {
        Ok(Self { timestamp, content: row.get(1)? })
    }
}

impl Persist for DistrictTable {
    const TABLE: &'static str = "district_tables";
    const COLUMNS: &'static [&'static str] = &["content"];

    fn timestamp(&self) -> &ReportTimestamp {
        &self.timestamp
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.content as &dyn ToSql]
    }

    fn from_row(timestamp: ReportTimestamp, row: &Row) -> rusqlite::Result<Self> {
        Ok(Self { timestamp, content: row.get(1)? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Timestamp-keyed record store on SQLite. Single writer.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if needed) the database file and applies pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        let applied = usize::try_from(version)
            .map_err(|_| StorageError::Corrupt(format!("negative schema version {}", version)))?;

        for (idx, migration) in MIGRATIONS.iter().enumerate().skip(applied) {
            tracing::debug!("Applying schema migration {}", idx + 1);
            self.conn.execute_batch(migration)?;
            self.conn.pragma_update(None, "user_version", (idx + 1) as i64)?;
        }
        Ok(())
    }

    /// All stored records of one kind, oldest timestamp first.
    pub fn list_all<T: Persist>(&self) -> Result<Vec<T>, StorageError> {
        let sql = format!("SELECT timestamp, {} FROM {} ORDER BY id", T::COLUMNS.join(", "), T::TABLE);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let raw: String = row.get(0)?;
            let timestamp = DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
            T::from_row(timestamp, row)
        })?;

        let mut records = rows.collect::<Result<Vec<T>, _>>()?;
        records.sort_by_key(|record| *record.timestamp());
        Ok(records)
    }

    /// Replaces the mutable fields of the record with the same timestamp, or
    /// appends a new row.
    pub fn upsert<T: Persist>(&self, record: &T) -> Result<Upsert, StorageError> {
        let timestamp = record.timestamp().to_rfc3339();
        let mut params: Vec<&dyn ToSql> = vec![&timestamp as &dyn ToSql];
        params.extend(record.values());

        let assignments = T::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let update = format!("UPDATE {} SET {} WHERE timestamp = ?1", T::TABLE, assignments);
        if self.conn.execute(&update, params.as_slice())? > 0 {
            return Ok(Upsert::Updated);
        }

        let placeholders = (1..=params.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {} (timestamp, {}) VALUES ({})",
            T::TABLE,
            T::COLUMNS.join(", "),
            placeholders
        );
        self.conn.execute(&insert, params.as_slice())?;
        Ok(Upsert::Inserted)
    }
}
