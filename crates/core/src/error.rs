use catalog_files::FilesError;
use catalog_uuid::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("failed to store upload for field '{field}': {source}")]
    StorageWrite {
        field: String,
        #[source]
        source: FilesError,
    },
    #[error("object store error: {0}")]
    Storage(#[from] FilesError),
    #[error("database transaction failed: {0}")]
    Transaction(#[from] rusqlite::Error),
    #[error("entity not found: {0}")]
    NotFound(EntityId),
    #[error("stored record is corrupt: {0}")]
    CorruptRecord(String),
    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
