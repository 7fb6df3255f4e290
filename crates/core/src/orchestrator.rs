//! Transactional persistence of records with file attachments.
//!
//! [`MediaCatalog`] is the entry point for callers. Every mutating call runs inside one
//! relational transaction:
//!
//! 1. begin, then insert (create) or load the live record (update)
//! 2. stage each upload into the object store under the record's id
//! 3. save the record with its new filenames and commit
//! 4. hand the outcome to the [`Reconciler`], which removes replaced objects after a commit or
//!    staged objects after a rollback
//!
//! A failure anywhere in 1–3 rolls the transaction back and returns the original error; the
//! reconciliation has already run by the time the call returns.

use crate::config::CoreConfig;
use crate::constants::{RESERVED_ATTRIBUTES, URL_ATTRIBUTE_SUFFIX};
use crate::persistence::{RecordStore, SqliteRecordStore, Transaction};
use crate::reconciler::{Reconciler, TransactionOutcome};
use crate::record::{Attributes, EntityRecord};
use crate::registry::FieldRegistry;
use crate::staging::{FileChange, FileChanges, PendingUpload, UploadStager};
use crate::{CatalogError, CatalogResult};
use catalog_files::{open_store, ObjectStore};
use catalog_uuid::EntityId;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Catalog of media entities backed by a [`RecordStore`] and an [`ObjectStore`].
#[derive(Debug)]
pub struct MediaCatalog<R: RecordStore> {
    records: R,
    store: Arc<dyn ObjectStore>,
    registry: FieldRegistry,
    stager: UploadStager,
}

impl MediaCatalog<SqliteRecordStore> {
    /// Opens the SQLite database and object store named by `config`, with the built-in kinds.
    pub fn open(config: &CoreConfig) -> CatalogResult<Self> {
        let records = SqliteRecordStore::open(config.database_path())?;
        let store = open_store(config.storage())?;
        tracing::info!(
            database = %config.database_path().display(),
            backend = config.storage().name(),
            "opened media catalog"
        );
        Ok(Self::new(records, store, FieldRegistry::catalog()))
    }
}

impl<R: RecordStore> MediaCatalog<R> {
    pub fn new(records: R, store: Arc<dyn ObjectStore>, registry: FieldRegistry) -> Self {
        let stager = UploadStager::new(store.clone());
        Self {
            records,
            store,
            registry,
            stager,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Creates a record of `kind` with `attributes`, uploading every file in `files`.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Validation`] for an unknown kind, an unknown file field or a reserved
    ///   attribute key. Nothing is written.
    /// - [`CatalogError::StorageWrite`] if an upload fails, or [`CatalogError::Transaction`]
    ///   if the database fails. The transaction is rolled back and every object staged by
    ///   this call is removed.
    pub fn create_with_files(
        &mut self,
        kind: &str,
        attributes: Attributes,
        files: FileChanges,
    ) -> CatalogResult<EntityRecord> {
        let fields = self
            .registry
            .file_fields(kind)
            .ok_or_else(|| CatalogError::Validation(format!("unknown entity kind '{}'", kind)))?;
        validate_request(&self.registry, kind, &attributes, &files)?;

        let mut record = EntityRecord::new(kind, fields, attributes);

        let mut tx = Transaction::begin(&mut self.records)?;
        let mut reconciler = Reconciler::new(self.store.clone(), record.id, BTreeSet::new());

        let staged = (|| -> CatalogResult<()> {
            tx.insert(&record)?;
            stage_and_save(
                &mut *tx,
                &self.registry,
                &self.stager,
                &mut record,
                files,
                &mut reconciler,
            )
        })();

        let record = finish(tx, staged.map(|()| record), reconciler)?;
        tracing::info!(entity_id = %record.id, kind = %record.kind, "created entity");
        Ok(record)
    }

    /// Merges `attributes` into the live record `id` and applies `files`.
    ///
    /// File fields missing from `files` keep their value. A replaced object is deleted only
    /// after the commit succeeds; on failure the record and its objects are left as they were.
    ///
    /// # Errors
    ///
    /// As [`MediaCatalog::create_with_files`], plus [`CatalogError::NotFound`] if there is no
    /// live record with this id.
    pub fn update_with_files(
        &mut self,
        id: EntityId,
        attributes: Attributes,
        files: FileChanges,
    ) -> CatalogResult<EntityRecord> {
        let mut tx = Transaction::begin(&mut self.records)?;

        let mut record = load_live(&*tx, id)?;
        validate_request(&self.registry, &record.kind, &attributes, &files)?;

        let mut reconciler = Reconciler::new(self.store.clone(), id, record.referenced_files());
        record.attributes.extend(attributes);

        let staged = stage_and_save(
            &mut *tx,
            &self.registry,
            &self.stager,
            &mut record,
            files,
            &mut reconciler,
        );

        let record = finish(tx, staged.map(|()| record), reconciler)?;
        tracing::info!(entity_id = %record.id, kind = %record.kind, "updated entity");
        Ok(record)
    }

    /// The live record with this id; soft-removed records are not returned.
    pub fn find(&self, id: EntityId) -> CatalogResult<Option<EntityRecord>> {
        find_live(&self.records, id)
    }

    /// Marks the record as removed. Its objects stay in the store.
    pub fn soft_delete(&mut self, id: EntityId) -> CatalogResult<()> {
        let mut tx = Transaction::begin(&mut self.records)?;

        let mut record = load_live(&*tx, id)?;
        let now = Utc::now();
        record.deleted_at = Some(now);
        record.updated_at = now;
        tx.save(&record)?;
        tx.commit()?;

        tracing::info!(entity_id = %id, "soft deleted entity");
        Ok(())
    }

    /// `{field}_url` for every file field of `record`, resolved against this catalog's store.
    pub fn file_urls(&self, record: &EntityRecord) -> BTreeMap<String, Option<String>> {
        record.file_urls(self.store.as_ref())
    }
}

fn find_live<R: RecordStore + ?Sized>(
    records: &R,
    id: EntityId,
) -> CatalogResult<Option<EntityRecord>> {
    Ok(records.load(id)?.filter(|record| !record.is_deleted()))
}

fn load_live<R: RecordStore + ?Sized>(records: &R, id: EntityId) -> CatalogResult<EntityRecord> {
    find_live(records, id)?.ok_or(CatalogError::NotFound(id))
}

fn validate_request(
    registry: &FieldRegistry,
    kind: &str,
    attributes: &Attributes,
    files: &FileChanges,
) -> CatalogResult<()> {
    for key in attributes.keys() {
        if key.trim().is_empty() {
            return Err(CatalogError::Validation("attribute names cannot be empty".into()));
        }
        if RESERVED_ATTRIBUTES.contains(&key.as_str()) {
            return Err(CatalogError::Validation(format!(
                "attribute '{}' is managed by the catalog",
                key
            )));
        }
        if registry.is_file_field(kind, key) {
            return Err(CatalogError::Validation(format!(
                "'{}' is a file field and must be passed as a file",
                key
            )));
        }
        if key
            .strip_suffix(URL_ATTRIBUTE_SUFFIX)
            .is_some_and(|field| registry.is_file_field(kind, field))
        {
            return Err(CatalogError::Validation(format!(
                "'{}' is derived from a file field and cannot be set",
                key
            )));
        }
    }

    if let Some(field) = files.keys().find(|f| !registry.is_file_field(kind, f)) {
        return Err(CatalogError::Validation(format!(
            "unknown file field '{}' for kind '{}'",
            field, kind
        )));
    }

    Ok(())
}

/// Applies `files` to `record`, staging uploads, and saves it.
fn stage_and_save<R: RecordStore + ?Sized>(
    records: &mut R,
    registry: &FieldRegistry,
    stager: &UploadStager,
    record: &mut EntityRecord,
    files: FileChanges,
    reconciler: &mut Reconciler,
) -> CatalogResult<()> {
    for (field, change) in files {
        match change {
            FileChange::Upload(content) => {
                let descriptor = registry.descriptor(&record.kind, &field).ok_or_else(|| {
                    CatalogError::Validation(format!("unknown file field '{}'", field))
                })?;
                let previous = record.file(&field).cloned();
                let mut upload = PendingUpload::new(descriptor, content, previous);
                let name = stager.stage(record.id, &mut upload, reconciler)?;
                if let Some(previous) = upload.previous() {
                    reconciler.track_replaced(previous.clone());
                }
                record.set_file(upload.field(), Some(name));
            }
            FileChange::Clear => record.set_file(&field, None),
        }
    }

    reconciler.set_committed_state(record.referenced_files());
    record.updated_at = Utc::now();
    records.save(record)
}

/// Commits a staged operation and delivers its outcome to `reconciler`.
fn finish<R: RecordStore + ?Sized>(
    tx: Transaction<'_, R>,
    staged: CatalogResult<EntityRecord>,
    reconciler: Reconciler,
) -> CatalogResult<EntityRecord> {
    let entity_id = reconciler.entity_id();
    let result = match staged {
        Ok(record) => tx.commit().map(|()| record),
        Err(error) => {
            tx.rollback();
            Err(error)
        }
    };

    match result {
        Ok(record) => {
            let report = reconciler.settle(TransactionOutcome::Committed);
            if !report.deleted.is_empty() {
                tracing::info!(
                    %entity_id,
                    removed = report.deleted.len(),
                    "removed replaced objects"
                );
            }
            Ok(record)
        }
        Err(error) => {
            let report = reconciler.settle(TransactionOutcome::RolledBack);
            tracing::warn!(
                %entity_id,
                %error,
                purged = report.deleted.len(),
                orphaned = report.failed.len(),
                "operation rolled back"
            );
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_files::{content_filename, LocalObjectStore, ObjectPath};
    use serde_json::json;
    use tempfile::TempDir;

    fn catalog(temp: &TempDir) -> MediaCatalog<SqliteRecordStore> {
        let store: Arc<dyn ObjectStore> = Arc::new(
            LocalObjectStore::new(&temp.path().join("media"), "http://localhost:8000/storage")
                .unwrap(),
        );
        MediaCatalog::new(
            SqliteRecordStore::open_in_memory().unwrap(),
            store,
            FieldRegistry::catalog(),
        )
    }

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn upload(field: &str, content: &[u8]) -> FileChanges {
        FileChanges::from([(field.to_owned(), FileChange::upload(content))])
    }

    #[test]
    fn create_stores_files_under_record_id() {
        let temp = TempDir::new().unwrap();
        let mut catalog = catalog(&temp);

        let record = catalog
            .create_with_files("video", attrs(json!({"title": "Nosferatu"})), upload("thumb_file", b"thumb"))
            .unwrap();

        let name = content_filename(b"thumb");
        assert_eq!(record.file("thumb_file"), Some(&name));
        assert!(catalog.store().exists(&ObjectPath::new(record.id, name)).unwrap());
        assert_eq!(catalog.find(record.id).unwrap().unwrap(), record);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut catalog = catalog(&temp);

        let result = catalog.create_with_files("podcast", Attributes::new(), FileChanges::new());
        assert!(matches!(result, Err(CatalogError::Validation(_))));
    }

    #[test]
    fn unknown_file_field_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let mut catalog = catalog(&temp);

        let result = catalog.create_with_files("video", Attributes::new(), upload("poster_file", b"x"));

        assert!(matches!(result, Err(CatalogError::Validation(_))));
        assert_eq!(catalog.records().count("video").unwrap(), 0);
    }

    #[test]
    fn reserved_and_derived_attributes_are_rejected() {
        let temp = TempDir::new().unwrap();
        let mut catalog = catalog(&temp);

        for key in ["id", "deleted_at", "video_file", "thumb_file_url", " "] {
            let mut attributes = Attributes::new();
            attributes.insert(key.to_owned(), json!("x"));
            let result = catalog.create_with_files("video", attributes, FileChanges::new());
            assert!(matches!(result, Err(CatalogError::Validation(_))), "{key}");
        }
    }

    #[test]
    fn update_merges_attributes() {
        let temp = TempDir::new().unwrap();
        let mut catalog = catalog(&temp);
        let created = catalog
            .create_with_files("video", attrs(json!({"title": "M", "rating": "L"})), FileChanges::new())
            .unwrap();

        let updated = catalog
            .update_with_files(created.id, attrs(json!({"rating": "12"})), FileChanges::new())
            .unwrap();

        assert_eq!(updated.attributes["title"], "M");
        assert_eq!(updated.attributes["rating"], "12");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn update_with_unknown_field_leaves_transaction_closed() {
        let temp = TempDir::new().unwrap();
        let mut catalog = catalog(&temp);
        let created = catalog
            .create_with_files("video", Attributes::new(), FileChanges::new())
            .unwrap();

        let result = catalog.update_with_files(created.id, Attributes::new(), upload("nope", b"x"));
        assert!(matches!(result, Err(CatalogError::Validation(_))));

        // A dangling transaction would make the next begin fail.
        catalog
            .update_with_files(created.id, attrs(json!({"title": "ok"})), FileChanges::new())
            .unwrap();
    }

    #[test]
    fn soft_delete_hides_record_and_keeps_files() {
        let temp = TempDir::new().unwrap();
        let mut catalog = catalog(&temp);
        let record = catalog
            .create_with_files("video", Attributes::new(), upload("banner_file", b"banner"))
            .unwrap();

        catalog.soft_delete(record.id).unwrap();

        assert!(catalog.find(record.id).unwrap().is_none());
        assert_eq!(catalog.store().list(record.id).unwrap().len(), 1);
        assert!(matches!(
            catalog.soft_delete(record.id),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn file_urls_cover_every_field() {
        let temp = TempDir::new().unwrap();
        let mut catalog = catalog(&temp);
        let record = catalog
            .create_with_files("video", Attributes::new(), upload("thumb_file", b"thumb"))
            .unwrap();

        let urls = catalog.file_urls(&record);

        assert_eq!(urls.len(), 4);
        assert_eq!(urls["video_file_url"], None);
        assert_eq!(
            urls["thumb_file_url"],
            Some(format!(
                "http://localhost:8000/storage/{}/{}",
                record.id,
                content_filename(b"thumb")
            ))
        );
    }
}
