//! # Catalog Core
//!
//! Keeps catalog records and their media files consistent.
//!
//! Records live in a relational store, media files in an object store, and the two cannot share
//! a transaction. This crate stages uploads before commit and reconciles the object store once
//! the outcome is known:
//! - Successful writes leave no stale objects behind (replaced files are removed)
//! - Failed writes leave no new objects behind (staged files are purged)
//! - Public URLs for file fields are derived from the configured storage backend
//!
//! **No transport concerns**: HTTP handlers, authentication and request parsing belong in the
//! binaries that use this crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod orchestrator;
pub mod persistence;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod staging;

pub use config::{CoreConfig, StorageEnv};
pub use error::{CatalogError, CatalogResult};
pub use orchestrator::MediaCatalog;
pub use persistence::{RecordStore, SqliteRecordStore};
pub use reconciler::{ReconcileReport, Reconciler, TransactionOutcome};
pub use record::{Attributes, EntityRecord};
pub use registry::{FieldRegistry, FileFieldDescriptor, MediaEntity, MediaKind, Video};
pub use staging::{FileChange, FileChanges, PendingUpload, UploadStager};

pub use catalog_files::{ObjectPath, ObjectStore, StorageBackend};
pub use catalog_types::StoredFilename;
pub use catalog_uuid::EntityId;
