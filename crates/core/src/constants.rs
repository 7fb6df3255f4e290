//! Constants used throughout the catalog core crate.

/// Default SQLite database file when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "catalog.db";

/// Default directory of the local media store.
pub const DEFAULT_LOCAL_STORAGE_DIR: &str = "storage/media";

/// Default public URL prefix of the local media store.
pub const DEFAULT_LOCAL_STORAGE_URL: &str = "http://localhost:8000/storage";

/// Attribute keys managed by the core; callers may not set them directly.
pub const RESERVED_ATTRIBUTES: &[&str] = &["id", "kind", "created_at", "updated_at", "deleted_at"];

/// Suffix appended to a file field name to form its public URL attribute.
pub const URL_ATTRIBUTE_SUFFIX: &str = "_url";
