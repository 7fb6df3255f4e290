//! Entity records as persisted by the relational store.

use crate::registry::{url_attribute, FileFieldDescriptor};
use catalog_files::{ObjectPath, ObjectStore};
use catalog_types::StoredFilename;
use catalog_uuid::EntityId;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Plain (non-file) attributes of a record, as a JSON object.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A catalog item together with the filenames of its attached media.
///
/// `files` holds one entry per declared file field of `kind`; `None` means the field is unset.
/// A present value names an object at `{id}/{filename}` in the object store.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub kind: String,
    pub attributes: Attributes,
    pub files: BTreeMap<String, Option<StoredFilename>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EntityRecord {
    /// A fresh record with a newly allocated id and every file field unset.
    pub fn new(kind: &str, fields: &[FileFieldDescriptor], attributes: Attributes) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            kind: kind.to_owned(),
            attributes,
            files: fields.iter().map(|d| (d.name.to_owned(), None)).collect(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn file(&self, field: &str) -> Option<&StoredFilename> {
        self.files.get(field).and_then(Option::as_ref)
    }

    pub fn set_file(&mut self, field: &str, filename: Option<StoredFilename>) {
        self.files.insert(field.to_owned(), filename);
    }

    /// Every filename the record currently points at.
    pub fn referenced_files(&self) -> BTreeSet<StoredFilename> {
        self.files.values().flatten().cloned().collect()
    }

    pub fn object_path(&self, field: &str) -> Option<ObjectPath> {
        self.file(field)
            .map(|name| ObjectPath::new(self.id, name.clone()))
    }

    /// Public URL of `field`, or `None` when the field is unset.
    pub fn file_url(&self, field: &str, store: &dyn ObjectStore) -> Option<String> {
        self.object_path(field).map(|path| store.public_url(&path))
    }

    /// `{field}_url` for every file field of the record.
    pub fn file_urls(&self, store: &dyn ObjectStore) -> BTreeMap<String, Option<String>> {
        self.files
            .keys()
            .map(|field| (url_attribute(field), self.file_url(field, store)))
            .collect()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MediaEntity, Video};
    use catalog_files::LocalObjectStore;
    use tempfile::TempDir;

    fn name(s: &str) -> StoredFilename {
        StoredFilename::new(s).unwrap()
    }

    #[test]
    fn new_record_has_all_fields_unset() {
        let record = EntityRecord::new("video", Video::FILE_FIELDS, Attributes::new());

        assert_eq!(record.files.len(), 4);
        assert!(record.files.values().all(Option::is_none));
        assert!(record.referenced_files().is_empty());
        assert!(!record.is_deleted());
    }

    #[test]
    fn referenced_files_deduplicates() {
        let mut record = EntityRecord::new("video", Video::FILE_FIELDS, Attributes::new());
        record.set_file("thumb_file", Some(name("same.png")));
        record.set_file("banner_file", Some(name("same.png")));
        record.set_file("video_file", Some(name("movie.mp4")));

        let referenced = record.referenced_files();
        assert_eq!(referenced.len(), 2);
        assert!(referenced.contains(&name("same.png")));
    }

    #[test]
    fn urls_are_none_for_unset_fields() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path(), "http://localhost:8000/storage").unwrap();
        let record = EntityRecord::new("video", Video::FILE_FIELDS, Attributes::new());

        let urls = record.file_urls(&store);

        assert_eq!(urls.len(), 4);
        assert!(urls.contains_key("video_file_url"));
        assert!(urls.values().all(Option::is_none));
    }

    #[test]
    fn urls_use_store_base_for_set_fields() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path(), "http://localhost:8000/storage/").unwrap();
        let mut record = EntityRecord::new("video", Video::FILE_FIELDS, Attributes::new());
        for field in Video::FILE_FIELDS {
            record.set_file(field.name, Some(name(&format!("{}.test", field.name))));
        }

        for field in Video::FILE_FIELDS {
            assert_eq!(
                record.file_url(field.name, &store),
                Some(format!(
                    "http://localhost:8000/storage/{}/{}.test",
                    record.id, field.name
                ))
            );
        }
    }
}
