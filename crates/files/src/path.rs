use catalog_types::StoredFilename;
use catalog_uuid::EntityId;
use std::fmt;

/// Location of one object: the owning entity's namespace plus a filename.
///
/// Both halves are validated types, so the rendered `{entity_id}/{filename}` string is always
/// exactly two path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath {
    entity_id: EntityId,
    filename: StoredFilename,
}

impl ObjectPath {
    pub fn new(entity_id: EntityId, filename: StoredFilename) -> Self {
        Self {
            entity_id,
            filename,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn filename(&self) -> &StoredFilename {
        &self.filename
    }

    /// The object key, `{entity_id}/{filename}`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_id, self.filename)
    }
}
