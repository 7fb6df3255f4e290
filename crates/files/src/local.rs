//! Local filesystem backend.
//!
//! Objects live at `<root>/<entity_id>/<filename>`. Writes go to a uniquely named temporary
//! file in the same directory and are renamed into place, so a reader never observes a
//! partially written object.

use crate::constants::TEMP_FILE_SUFFIX;
use crate::{normalise_base_url, FilesError, FilesResult, ObjectPath, ObjectStore};
use catalog_types::StoredFilename;
use catalog_uuid::{EntityId, Uuid};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Object store backed by a directory on local disk.
#[derive(Debug)]
pub struct LocalObjectStore {
    /// Canonicalised directory holding one subdirectory per entity
    root_directory: PathBuf,

    /// Public URL prefix, normalised to end with `/`
    base_url: String,
}

impl LocalObjectStore {
    /// Opens (creating if needed) a store rooted at `root_directory`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if the root cannot be created, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root_directory: &Path, url_prefix: &str) -> FilesResult<Self> {
        if root_directory.exists() && !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        fs::create_dir_all(root_directory).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self {
            root_directory,
            base_url: normalise_base_url(url_prefix),
        })
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    fn namespace_dir(&self, entity_id: EntityId) -> PathBuf {
        self.root_directory.join(entity_id.to_string())
    }

    fn object_file(&self, path: &ObjectPath) -> PathBuf {
        self.namespace_dir(path.entity_id())
            .join(path.filename().as_str())
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, path: &ObjectPath, content: &[u8]) -> FilesResult<ObjectPath> {
        let target = self.object_file(path);
        let dir = self.namespace_dir(path.entity_id());

        fs::create_dir_all(&dir).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create namespace {}: {}", dir.display(), e),
            ))
        })?;

        // Uuid-only temp name: stays under NAME_MAX for every legal filename.
        let temp = dir.join(format!(".{}{}", Uuid::new_v4().simple(), TEMP_FILE_SUFFIX));

        fs::write(&temp, content).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write {}: {}", temp.display(), e),
            ))
        })?;

        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to move object into {}: {}", target.display(), e),
            )));
        }

        tracing::debug!(object = %path, size = content.len(), "local store: put");
        Ok(path.clone())
    }

    fn get(&self, path: &ObjectPath) -> FilesResult<Vec<u8>> {
        match fs::read(self.object_file(path)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FilesError::NotFound(path.key())),
            Err(e) => Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path, e),
            ))),
        }
    }

    fn delete(&self, path: &ObjectPath) -> FilesResult<()> {
        match fs::remove_file(self.object_file(path)) {
            Ok(()) => {
                tracing::debug!(object = %path, "local store: delete");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(object = %path, "local store: delete of missing object");
            }
            Err(e) => {
                return Err(FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to delete {}: {}", path, e),
                )))
            }
        }

        // Best-effort: drop the namespace directory once it is empty.
        let _ = fs::remove_dir(self.namespace_dir(path.entity_id()));
        Ok(())
    }

    fn exists(&self, path: &ObjectPath) -> FilesResult<bool> {
        Ok(self.object_file(path).try_exists()?)
    }

    fn list(&self, entity_id: EntityId) -> FilesResult<Vec<StoredFilename>> {
        let entries = match fs::read_dir(self.namespace_dir(entity_id)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FilesError::Io(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.ends_with(TEMP_FILE_SUFFIX) {
                continue;
            }
            let name = StoredFilename::new(&name)
                .map_err(|e| FilesError::InvalidPath(format!("{}: {}", name, e)))?;
            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
