use crate::{CloudObjectStore, FilesResult, LocalObjectStore, ObjectPath};
use catalog_types::StoredFilename;
use catalog_uuid::EntityId;
use std::path::PathBuf;
use std::sync::Arc;

/// Uniform access to the blob backend holding media files.
///
/// Implementations are shared between requests (`Arc<dyn ObjectStore>`) and are not
/// transactional: a successful `put` is visible to every reader immediately.
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Writes `content` at `path`, replacing any object already there.
    fn put(&self, path: &ObjectPath, content: &[u8]) -> FilesResult<ObjectPath>;

    /// Reads the object at `path`.
    ///
    /// Returns [`crate::FilesError::NotFound`] if there is no such object.
    fn get(&self, path: &ObjectPath) -> FilesResult<Vec<u8>>;

    /// Removes the object at `path`. Removing a missing object succeeds.
    fn delete(&self, path: &ObjectPath) -> FilesResult<()>;

    fn exists(&self, path: &ObjectPath) -> FilesResult<bool>;

    /// Filenames currently stored under `entity_id`, sorted.
    fn list(&self, entity_id: EntityId) -> FilesResult<Vec<StoredFilename>>;

    /// Base URL objects of this backend are served from, always ending in `/`.
    fn base_url(&self) -> &str;

    /// `base_url + entity_id + "/" + filename`.
    fn public_url(&self, path: &ObjectPath) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

/// Which backend to open, resolved once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Directory on local disk, served under `url_prefix`.
    Local { root: PathBuf, url_prefix: String },
    /// Bucket reached through a Cloud Storage style JSON API.
    Cloud {
        bucket: String,
        api_endpoint: String,
        access_token: Option<String>,
    },
}

impl StorageBackend {
    /// Short name used in logs and configuration (`local` / `cloud`).
    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Local { .. } => "local",
            StorageBackend::Cloud { .. } => "cloud",
        }
    }
}

/// Opens the configured backend.
///
/// # Errors
///
/// Propagates construction errors of the selected backend (unusable root directory,
/// malformed endpoint, HTTP client setup).
pub fn open_store(backend: &StorageBackend) -> FilesResult<Arc<dyn ObjectStore>> {
    tracing::debug!(backend = backend.name(), "opening object store");

    let store: Arc<dyn ObjectStore> = match backend {
        StorageBackend::Local { root, url_prefix } => {
            Arc::new(LocalObjectStore::new(root, url_prefix)?)
        }
        StorageBackend::Cloud {
            bucket,
            api_endpoint,
            access_token,
        } => Arc::new(CloudObjectStore::new(
            bucket,
            api_endpoint,
            access_token.clone(),
        )?),
    };
    Ok(store)
}

/// Normalises a base URL so that appending `{id}/{filename}` yields a well-formed URL.
///
/// Trailing slashes are collapsed to exactly one.
pub fn normalise_base_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}
