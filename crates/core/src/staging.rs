//! Upload staging.
//!
//! Staging writes an upload into the object store *before* the owning transaction commits.
//! The object only becomes part of the record's confirmed state once the commit succeeds; until
//! then the [`Reconciler`] knows about it and will purge it if the transaction rolls back.

use crate::reconciler::Reconciler;
use crate::registry::{FileFieldDescriptor, MediaKind};
use crate::{CatalogError, CatalogResult};
use catalog_files::{content_metadata, ObjectPath, ObjectStore};
use catalog_types::StoredFilename;
use catalog_uuid::EntityId;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

/// Requested change to one file field.
///
/// A field that does not appear in the request is left untouched; `Clear` unsets it without
/// touching the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Upload(Vec<u8>),
    Clear,
}

impl FileChange {
    pub fn upload(content: impl Into<Vec<u8>>) -> Self {
        FileChange::Upload(content.into())
    }

    /// Buffers an upload from `reader`; the whole content is needed to name it.
    pub fn from_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        Ok(FileChange::Upload(content))
    }
}

/// File changes of one request, keyed by field name.
pub type FileChanges = BTreeMap<String, FileChange>;

/// An upload in flight inside one transaction.
#[derive(Debug)]
pub struct PendingUpload {
    field: String,
    media: MediaKind,
    content: Vec<u8>,
    previous: Option<StoredFilename>,
    staged: Option<StoredFilename>,
}

impl PendingUpload {
    /// `previous` is the field's value before this request, captured before any mutation.
    pub fn new(
        field: &FileFieldDescriptor,
        content: Vec<u8>,
        previous: Option<StoredFilename>,
    ) -> Self {
        Self {
            field: field.name.to_owned(),
            media: field.media,
            content,
            previous,
            staged: None,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn previous(&self) -> Option<&StoredFilename> {
        self.previous.as_ref()
    }

    /// The content name, once staged.
    pub fn staged(&self) -> Option<&StoredFilename> {
        self.staged.as_ref()
    }
}

/// Writes uploads to the object store under their entity's namespace.
#[derive(Debug, Clone)]
pub struct UploadStager {
    store: Arc<dyn ObjectStore>,
}

impl UploadStager {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Names `upload` by content and writes it to `{entity_id}/{name}`.
    ///
    /// The name is registered with `reconciler` before the write is attempted, so an object
    /// that lands despite a reported failure is still purged on rollback.
    ///
    /// # Errors
    ///
    /// [`CatalogError::StorageWrite`] if the store rejects the write; the caller must abort
    /// the transaction.
    pub fn stage(
        &self,
        entity_id: EntityId,
        upload: &mut PendingUpload,
        reconciler: &mut Reconciler,
    ) -> CatalogResult<StoredFilename> {
        let meta = content_metadata(&upload.content);
        let path = ObjectPath::new(entity_id, meta.filename.clone());

        reconciler.track_staged(meta.filename.clone());

        self.store
            .put(&path, &upload.content)
            .map_err(|source| CatalogError::StorageWrite {
                field: upload.field.clone(),
                source,
            })?;

        let media_type = meta.media_type.unwrap_or("unknown");
        if !upload.media.accepts(media_type) {
            tracing::warn!(
                object = %path,
                field = %upload.field,
                expected = ?upload.media,
                media_type,
                "upload content does not match the field's media kind"
            );
        }
        tracing::debug!(
            object = %path,
            field = %upload.field,
            size = meta.size_bytes,
            media_type,
            "staged upload"
        );

        upload.staged = Some(meta.filename.clone());
        Ok(meta.filename)
    }
}
