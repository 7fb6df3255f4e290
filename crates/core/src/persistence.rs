//! Relational persistence of entity records.
//!
//! [`RecordStore`] is the narrow contract the orchestrator needs from the database: explicit
//! transaction control plus keyed record reads and writes. [`SqliteRecordStore`] implements it
//! over a single `entities` table:
//!
//! ```text
//! entities(
//!     id          TEXT PRIMARY KEY,   -- canonical 32-hex entity id
//!     kind        TEXT NOT NULL,
//!     attributes  TEXT NOT NULL,      -- JSON object
//!     files       TEXT NOT NULL,      -- JSON object: field -> filename | null
//!     created_at  TEXT NOT NULL,      -- RFC 3339
//!     updated_at  TEXT NOT NULL,
//!     deleted_at  TEXT                -- soft removal marker
//! )
//! ```

use crate::record::{Attributes, EntityRecord};
use crate::{CatalogError, CatalogResult};
use catalog_types::StoredFilename;
use catalog_uuid::EntityId;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// Transactional record storage used by [`crate::MediaCatalog`].
///
/// Implementations only have to support one open transaction at a time.
pub trait RecordStore {
    fn begin(&mut self) -> CatalogResult<()>;

    fn commit(&mut self) -> CatalogResult<()>;

    fn rollback(&mut self) -> CatalogResult<()>;

    /// Inserts a new record. The id must not exist yet.
    fn insert(&mut self, record: &EntityRecord) -> CatalogResult<()>;

    /// Loads a record by id, including soft-removed ones.
    fn load(&self, id: EntityId) -> CatalogResult<Option<EntityRecord>>;

    /// Overwrites an existing record.
    ///
    /// Returns [`CatalogError::NotFound`] if there is no row for `record.id`.
    fn save(&mut self, record: &EntityRecord) -> CatalogResult<()>;
}

/// An open transaction on a [`RecordStore`].
///
/// Dereferences to the store for reads and writes inside the transaction. Dropping it without
/// [`Transaction::commit`] rolls the transaction back, including during unwinding, so a failed
/// or panicking operation never leaves the store inside a half-finished transaction.
#[derive(Debug)]
pub struct Transaction<'a, R: RecordStore + ?Sized> {
    records: &'a mut R,
    open: bool,
}

impl<'a, R: RecordStore + ?Sized> Transaction<'a, R> {
    pub fn begin(records: &'a mut R) -> CatalogResult<Self> {
        records.begin()?;
        Ok(Self {
            records,
            open: true,
        })
    }

    /// Commits. On failure the transaction is rolled back before the error is returned.
    pub fn commit(mut self) -> CatalogResult<()> {
        self.records.commit()?;
        self.open = false;
        Ok(())
    }

    pub fn rollback(self) {
        drop(self);
    }
}

impl<R: RecordStore + ?Sized> std::ops::Deref for Transaction<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &*self.records
    }
}

impl<R: RecordStore + ?Sized> std::ops::DerefMut for Transaction<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut *self.records
    }
}

impl<R: RecordStore + ?Sized> Drop for Transaction<'_, R> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        tracing::debug!("rolling back uncommitted transaction");
        if let Err(error) = self.records.rollback() {
            tracing::warn!(%error, "failed to roll back transaction");
        }
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    attributes TEXT NOT NULL,
    files TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE INDEX IF NOT EXISTS entities_kind ON entities (kind);";

/// SQLite implementation of [`RecordStore`].
#[derive(Debug)]
pub struct SqliteRecordStore {
    db: Connection,
}

impl SqliteRecordStore {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CatalogError::Config(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = Connection::open(path)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        tracing::info!(path = %path.display(), "opened record store");
        Self::with_connection(db)
    }

    /// A private in-memory database, mainly for tests.
    pub fn open_in_memory() -> CatalogResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> CatalogResult<Self> {
        db.execute_batch(SCHEMA)?;
        Ok(Self { db })
    }

    /// Number of records of `kind`, soft-removed ones included.
    pub fn count(&self, kind: &str) -> CatalogResult<u64> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM entities WHERE kind = ?1",
            [kind],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

struct StoredRow {
    id: String,
    kind: String,
    attributes: String,
    files: String,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl StoredRow {
    fn into_record(self) -> CatalogResult<EntityRecord> {
        let id = EntityId::parse(&self.id)
            .map_err(|e| CatalogError::CorruptRecord(format!("id '{}': {}", self.id, e)))?;
        let attributes: Attributes = serde_json::from_str(&self.attributes)?;
        let files: BTreeMap<String, Option<StoredFilename>> = serde_json::from_str(&self.files)?;

        Ok(EntityRecord {
            id,
            kind: self.kind,
            attributes,
            files,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            deleted_at: self.deleted_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn parse_timestamp(value: &str) -> CatalogResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CatalogError::CorruptRecord(format!("timestamp '{}': {}", value, e)))
}

impl RecordStore for SqliteRecordStore {
    fn begin(&mut self) -> CatalogResult<()> {
        self.db.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> CatalogResult<()> {
        self.db.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> CatalogResult<()> {
        self.db.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn insert(&mut self, record: &EntityRecord) -> CatalogResult<()> {
        self.db.execute(
            "INSERT INTO entities (id, kind, attributes, files, created_at, updated_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                record.kind,
                serde_json::to_string(&record.attributes)?,
                serde_json::to_string(&record.files)?,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
                record.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn load(&self, id: EntityId) -> CatalogResult<Option<EntityRecord>> {
        let mut stmt = self.db.prepare_cached(
            "SELECT id, kind, attributes, files, created_at, updated_at, deleted_at
             FROM entities WHERE id = ?1",
        )?;

        let row = stmt
            .query_row([id.to_string()], |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    attributes: row.get(2)?,
                    files: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                    deleted_at: row.get(6)?,
                })
            })
            .optional()?;

        row.map(StoredRow::into_record).transpose()
    }

    fn save(&mut self, record: &EntityRecord) -> CatalogResult<()> {
        let changed = self.db.execute(
            "UPDATE entities
             SET attributes = ?2, files = ?3, updated_at = ?4, deleted_at = ?5
             WHERE id = ?1",
            params![
                record.id.to_string(),
                serde_json::to_string(&record.attributes)?,
                serde_json::to_string(&record.files)?,
                record.updated_at.to_rfc3339(),
                record.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound(record.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MediaEntity, Video};
    use tempfile::TempDir;

    fn sample_record() -> EntityRecord {
        let mut attributes = Attributes::new();
        attributes.insert("title".into(), "Metropolis".into());
        attributes.insert("year_launched".into(), 1927.into());

        let mut record = EntityRecord::new(Video::KIND, Video::FILE_FIELDS, attributes);
        record.set_file("thumb_file", Some(StoredFilename::new("abc.png").unwrap()));
        record
    }

    #[test]
    fn insert_then_load_round_trips() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        let record = sample_record();

        store.insert(&record).unwrap();
        let loaded = store.load(record.id).unwrap().unwrap();

        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.attributes, record.attributes);
        assert_eq!(loaded.files, record.files);
        assert_eq!(loaded.created_at, record.created_at);
        assert_eq!(store.count("video").unwrap(), 1);
    }

    #[test]
    fn load_missing_is_none() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        assert!(store.load(EntityId::new()).unwrap().is_none());
    }

    #[test]
    fn save_missing_is_not_found() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        let record = sample_record();

        assert!(matches!(
            store.save(&record),
            Err(CatalogError::NotFound(id)) if id == record.id
        ));
    }

    #[test]
    fn rollback_discards_insert() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        let record = sample_record();

        store.begin().unwrap();
        store.insert(&record).unwrap();
        store.rollback().unwrap();

        assert!(store.load(record.id).unwrap().is_none());
    }

    #[test]
    fn commit_keeps_update() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        let mut record = sample_record();
        store.insert(&record).unwrap();

        store.begin().unwrap();
        record.set_file("thumb_file", None);
        record.deleted_at = Some(Utc::now());
        store.save(&record).unwrap();
        store.commit().unwrap();

        let loaded = store.load(record.id).unwrap().unwrap();
        assert_eq!(loaded.file("thumb_file"), None);
        assert!(loaded.is_deleted());
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        let record = sample_record();

        {
            let mut tx = Transaction::begin(&mut store).unwrap();
            tx.insert(&record).unwrap();
        }

        assert!(store.load(record.id).unwrap().is_none());
        // No transaction is left open.
        store.begin().unwrap();
        store.rollback().unwrap();
    }

    #[test]
    fn committed_transaction_persists() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        let record = sample_record();

        let mut tx = Transaction::begin(&mut store).unwrap();
        tx.insert(&record).unwrap();
        tx.commit().unwrap();

        assert!(store.load(record.id).unwrap().is_some());
    }

    #[test]
    fn commit_without_begin_fails() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        assert!(matches!(store.commit(), Err(CatalogError::Transaction(_))));
    }

    #[test]
    fn open_creates_database_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("catalog.db");

        let mut store = SqliteRecordStore::open(&path).unwrap();
        store.insert(&sample_record()).unwrap();

        assert!(path.is_file());
    }

    #[test]
    fn corrupt_row_is_reported() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let id = EntityId::new();
        store
            .db
            .execute(
                "INSERT INTO entities (id, kind, attributes, files, created_at, updated_at)
                 VALUES (?1, 'video', '{}', '{}', 'yesterday', 'today')",
                [id.to_string()],
            )
            .unwrap();

        assert!(matches!(store.load(id), Err(CatalogError::CorruptRecord(_))));
    }
}
