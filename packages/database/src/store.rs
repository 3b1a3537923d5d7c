//! Insert-if-absent record store backed by `DuckDB`.
//!
//! The store is shared by every worker of a run. Deduplication relies on
//! the `PRIMARY KEY` constraints of both tables combined with
//! `ON CONFLICT DO NOTHING`, so racing inserts of the same key resolve
//! inside the database: exactly one row wins and the others are no-ops.
//! Callers never need to hold a lock across an exists/insert pair.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use duckdb::Connection;
use photo_scraper_photo_models::{GeoEntry, ImageRecord};
use strum_macros::{AsRefStr, Display};

use crate::DbError;

/// The tables managed by [`RecordStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    /// Persisted photo metadata, keyed by remote photo id.
    ImageMetadata,
    /// Geocode cache, keyed by the searched text.
    GeoInfo,
}

impl Table {
    /// Returns the primary-key column of this table.
    #[must_use]
    pub const fn key_field(self) -> &'static str {
        match self {
            Self::ImageMetadata => "id",
            Self::GeoInfo => "search_text",
        }
    }

    const fn columns(self) -> &'static str {
        match self {
            Self::ImageMetadata => "id, title, latitude, longitude",
            Self::GeoInfo => "search_text, latitude, longitude",
        }
    }
}

/// A row of one of the managed tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// An `image_metadata` row.
    Image(ImageRecord),
    /// A `geo_info` row.
    Geo(GeoEntry),
}

impl Row {
    /// Returns the table this row belongs to.
    #[must_use]
    pub const fn table(&self) -> Table {
        match self {
            Self::Image(_) => Table::ImageMetadata,
            Self::Geo(_) => Table::GeoInfo,
        }
    }

    /// Returns the primary-key value of this row.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Image(record) => &record.id,
            Self::Geo(entry) => &entry.search_text,
        }
    }
}

impl From<ImageRecord> for Row {
    fn from(value: ImageRecord) -> Self {
        Self::Image(value)
    }
}

impl From<GeoEntry> for Row {
    fn from(value: GeoEntry) -> Self {
        Self::Geo(value)
    }
}

/// Shared handle to the scraper database.
///
/// `duckdb::Connection` is `Send` but not `Sync`, so a `Mutex` is needed
/// to share it between tasks. Each operation is a single statement.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Opens (or creates) the store at `path` and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection, or schema
    /// creation fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }

        log::debug!("Opening record store at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens the store at [`crate::paths::default_db_path`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_default() -> Result<Self, DbError> {
        Self::open(&crate::paths::default_db_path())
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        Ok(store)
    }

    /// Creates both tables if they do not already exist. Safe to call
    /// any number of times.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the DDL fails.
    pub fn create_tables(&self) -> Result<(), DbError> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS image_metadata (
                id TEXT NOT NULL PRIMARY KEY,
                title TEXT NOT NULL,
                latitude TEXT NOT NULL,
                longitude TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS geo_info (
                search_text TEXT NOT NULL PRIMARY KEY,
                latitude TEXT NOT NULL,
                longitude TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Returns whether a row keyed by `key` exists in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn exists(&self, table: Table, key: &str) -> Result<bool, DbError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE {field} = ?",
            field = table.key_field()
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let count: i64 = stmt.query_row([key], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Fetches the row keyed by `key` from `table`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn get(&self, table: Table, key: &str) -> Result<Option<Row>, DbError> {
        let sql = format!(
            "SELECT {columns} FROM {table} WHERE {field} = ?",
            columns = table.columns(),
            field = table.key_field()
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;

        let result = match table {
            Table::ImageMetadata => stmt.query_row([key], |row| {
                Ok(Row::Image(ImageRecord {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    latitude: row.get(2)?,
                    longitude: row.get(3)?,
                }))
            }),
            Table::GeoInfo => stmt.query_row([key], |row| {
                Ok(Row::Geo(GeoEntry {
                    search_text: row.get(0)?,
                    latitude: row.get(1)?,
                    longitude: row.get(2)?,
                }))
            }),
        };

        match result {
            Ok(row) => Ok(Some(row)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::DuckDb(e)),
        }
    }

    /// Convenience wrapper around [`Self::get`] for the geo cache.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or the row has the wrong
    /// shape.
    pub fn get_geo(&self, search_text: &str) -> Result<Option<GeoEntry>, DbError> {
        match self.get(Table::GeoInfo, search_text)? {
            None => Ok(None),
            Some(Row::Geo(entry)) => Ok(Some(entry)),
            Some(Row::Image(_)) => Err(DbError::Conversion {
                message: format!("geo_info lookup for '{search_text}' returned an image row"),
            }),
        }
    }

    /// Convenience wrapper around [`Self::get`] for image metadata.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or the row has the wrong
    /// shape.
    pub fn get_image(&self, id: &str) -> Result<Option<ImageRecord>, DbError> {
        match self.get(Table::ImageMetadata, id)? {
            None => Ok(None),
            Some(Row::Image(record)) => Ok(Some(record)),
            Some(Row::Geo(_)) => Err(DbError::Conversion {
                message: format!("image_metadata lookup for '{id}' returned a geo row"),
            }),
        }
    }

    /// Persists `row` unless a row with the same primary key already
    /// exists. Never updates an existing row.
    ///
    /// Returns `true` if this call wrote the row, `false` if the key was
    /// already present (including when a concurrent caller won the race).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails for any reason other than
    /// a primary-key conflict.
    pub fn insert_if_absent(&self, row: &Row) -> Result<bool, DbError> {
        let conn = self.conn();
        let result = match row {
            Row::Image(record) => conn.execute(
                "INSERT INTO image_metadata (id, title, latitude, longitude)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (id) DO NOTHING",
                duckdb::params![
                    record.id,
                    record.title,
                    record.latitude,
                    record.longitude
                ],
            ),
            Row::Geo(entry) => conn.execute(
                "INSERT INTO geo_info (search_text, latitude, longitude)
                 VALUES (?, ?, ?)
                 ON CONFLICT (search_text) DO NOTHING",
                duckdb::params![entry.search_text, entry.latitude, entry.longitude],
            ),
        };

        match result {
            Ok(rows) => Ok(rows > 0),
            Err(e) if is_constraint_violation(&e) => {
                log::debug!(
                    "{} key '{}' already present, skipping insert",
                    row.table(),
                    row.key()
                );
                Ok(false)
            }
            Err(e) => Err(DbError::DuckDb(e)),
        }
    }

    /// Returns the number of rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn count(&self, table: Table) -> Result<u64, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT COUNT(*) FROM {table}"))?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        u64::try_from(count).map_err(|e| DbError::Conversion {
            message: format!("negative row count for {table}: {e}"),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A duplicate-key failure is a lost insert race, not an error.
fn is_constraint_violation(e: &duckdb::Error) -> bool {
    let message = e.to_string();
    message.contains("Constraint Error") || message.contains("duplicate key")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn image(id: &str, title: &str) -> ImageRecord {
        ImageRecord {
            id: id.to_owned(),
            title: title.to_owned(),
            latitude: "48.85".to_owned(),
            longitude: "2.35".to_owned(),
        }
    }

    #[test]
    fn table_names_match_schema() {
        assert_eq!(Table::ImageMetadata.as_ref(), "image_metadata");
        assert_eq!(Table::GeoInfo.to_string(), "geo_info");
        assert_eq!(Table::GeoInfo.key_field(), "search_text");
    }

    #[test]
    fn create_tables_is_idempotent() {
        let store = RecordStore::open_in_memory().unwrap();
        store.create_tables().unwrap();
        store.create_tables().unwrap();
        assert_eq!(store.count(Table::ImageMetadata).unwrap(), 0);
    }

    #[test]
    fn second_insert_keeps_first_payload() {
        let store = RecordStore::open_in_memory().unwrap();

        assert!(store.insert_if_absent(&image("42", "first").into()).unwrap());
        assert!(!store.insert_if_absent(&image("42", "second").into()).unwrap());

        assert_eq!(store.count(Table::ImageMetadata).unwrap(), 1);
        let stored = store.get_image("42").unwrap().unwrap();
        assert_eq!(stored.title, "first");
    }

    #[test]
    fn exists_and_get_report_missing_keys() {
        let store = RecordStore::open_in_memory().unwrap();
        assert!(!store.exists(Table::ImageMetadata, "nope").unwrap());
        assert!(store.get(Table::GeoInfo, "nope").unwrap().is_none());

        let entry = GeoEntry {
            search_text: "rome".to_owned(),
            latitude: "41.9".to_owned(),
            longitude: "12.5".to_owned(),
        };
        store.insert_if_absent(&entry.clone().into()).unwrap();

        assert!(store.exists(Table::GeoInfo, "rome").unwrap());
        assert!(!store.exists(Table::ImageMetadata, "rome").unwrap());
        assert_eq!(store.get_geo("rome").unwrap(), Some(entry));
    }

    #[test]
    fn concurrent_inserts_store_one_row() {
        let store = Arc::new(RecordStore::open_in_memory().unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .insert_if_absent(&image("dup", &format!("writer {i}")).into())
                        .unwrap()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(store.count(Table::ImageMetadata).unwrap(), 1);
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!(
            "photo_scraper_store_test_{}",
            std::process::id()
        ));
        let path = dir.join("nested").join("scraper.duckdb");

        {
            let store = RecordStore::open(&path).unwrap();
            store.insert_if_absent(&image("1", "persisted").into()).unwrap();
        }

        let reopened = RecordStore::open(&path).unwrap();
        assert!(reopened.exists(Table::ImageMetadata, "1").unwrap());

        drop(reopened);
        std::fs::remove_dir_all(&dir).ok();
    }
}
