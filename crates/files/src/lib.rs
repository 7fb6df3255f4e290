//! Catalog media storage
//!
//! This crate provides the object store adapter used to keep uploaded media files (videos,
//! trailers, thumbnails, banners) next to the catalog records that reference them.
//!
//! ## Design Principles
//!
//! - Objects are addressed by `{entity_id}/{filename}`; every entity owns one namespace
//! - Stored filenames are derived from content (SHA-256), never taken from the client
//! - Writes and deletes take effect immediately and are **not** part of any database
//!   transaction; callers compensate with deletes when a transaction does not commit
//! - Deleting an object that is already gone is not an error
//!
//! ## Storage Layout
//!
//! Local backend:
//!
//! ```text
//! <root>/
//! └── <entity_id>/
//!     ├── 9f86d0…0a08.mp4
//!     └── 2c26b4…7ae.png
//! ```
//!
//! The cloud backend uses the same `{entity_id}/{filename}` string as the object name inside
//! one bucket.
//!
//! ## Example Usage
//!
//! ```no_run
//! use catalog_files::{content_metadata, open_store, ObjectPath, StorageBackend};
//! use catalog_uuid::EntityId;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = open_store(&StorageBackend::Local {
//!     root: "storage/media".into(),
//!     url_prefix: "http://localhost:8000/storage".into(),
//! })?;
//!
//! let bytes = std::fs::read("trailer.mp4")?;
//! let path = ObjectPath::new(EntityId::new(), content_metadata(&bytes).filename);
//! store.put(&path, &bytes)?;
//! println!("{}", store.public_url(&path));
//! # Ok(())
//! # }
//! ```

mod cloud;
mod constants;
mod content;
mod local;
mod path;
mod store;

pub use cloud::CloudObjectStore;
pub use constants::{DEFAULT_CLOUD_API_ENDPOINT, TEMP_FILE_SUFFIX};
pub use content::{content_digest, content_filename, content_metadata, ContentMetadata};
pub use local::LocalObjectStore;
pub use path::ObjectPath;
pub use store::{normalise_base_url, open_store, ObjectStore, StorageBackend};

pub use catalog_types::StoredFilename;
pub use catalog_uuid::EntityId;

/// Errors that can occur during object store operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory could not be created or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Path validation failed (potential directory traversal or unsafe path)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Backend configuration is unusable
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    /// The requested object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error talking to the cloud backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cloud backend answered with a status we do not treat as success
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
    },
}

/// Result type for object store operations.
pub type FilesResult<T> = Result<T, FilesError>;
