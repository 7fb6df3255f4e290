//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the catalog. Core
//! code never reads process environment variables itself; binaries collect the raw values and
//! hand them to [`StorageEnv::resolve`] and [`CoreConfig::new`].

use crate::constants::{DEFAULT_LOCAL_STORAGE_DIR, DEFAULT_LOCAL_STORAGE_URL};
use crate::{CatalogError, CatalogResult};
use catalog_files::{StorageBackend, DEFAULT_CLOUD_API_ENDPOINT};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    storage: StorageBackend,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(database_path: PathBuf, storage: StorageBackend) -> CatalogResult<Self> {
        if database_path.as_os_str().is_empty() {
            return Err(CatalogError::Config("database path cannot be empty".into()));
        }

        Ok(Self {
            database_path,
            storage,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn storage(&self) -> &StorageBackend {
        &self.storage
    }
}

/// Raw storage settings as read from the environment (`CATALOG_*` variables).
///
/// Every field is optional; blank values count as unset.
#[derive(Clone, Debug, Default)]
pub struct StorageEnv {
    /// `CATALOG_STORAGE_BACKEND`: `local` (default) or `cloud`
    pub backend: Option<String>,
    /// `CATALOG_LOCAL_STORAGE_DIR`
    pub local_dir: Option<String>,
    /// `CATALOG_LOCAL_STORAGE_URL`
    pub local_url: Option<String>,
    /// `CATALOG_CLOUD_BUCKET`, required for the cloud backend
    pub cloud_bucket: Option<String>,
    /// `CATALOG_CLOUD_API_ENDPOINT`
    pub cloud_api_endpoint: Option<String>,
    /// `CATALOG_CLOUD_ACCESS_TOKEN`
    pub cloud_access_token: Option<String>,
}

impl StorageEnv {
    /// Turn the raw values into a [`StorageBackend`], applying defaults.
    pub fn resolve(self) -> CatalogResult<StorageBackend> {
        let backend = non_blank(self.backend).unwrap_or_else(|| "local".into());

        match backend.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local {
                root: PathBuf::from(
                    non_blank(self.local_dir).unwrap_or_else(|| DEFAULT_LOCAL_STORAGE_DIR.into()),
                ),
                url_prefix: non_blank(self.local_url)
                    .unwrap_or_else(|| DEFAULT_LOCAL_STORAGE_URL.into()),
            }),
            "cloud" => {
                let bucket = non_blank(self.cloud_bucket).ok_or_else(|| {
                    CatalogError::Config(
                        "CATALOG_CLOUD_BUCKET is required for the cloud storage backend".into(),
                    )
                })?;

                Ok(StorageBackend::Cloud {
                    bucket,
                    api_endpoint: non_blank(self.cloud_api_endpoint)
                        .unwrap_or_else(|| DEFAULT_CLOUD_API_ENDPOINT.into()),
                    access_token: non_blank(self.cloud_access_token),
                })
            }
            other => Err(CatalogError::Config(format!(
                "unknown storage backend '{}' (expected 'local' or 'cloud')",
                other
            ))),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_backend() {
        let backend = StorageEnv::default().resolve().unwrap();

        assert_eq!(
            backend,
            StorageBackend::Local {
                root: PathBuf::from(DEFAULT_LOCAL_STORAGE_DIR),
                url_prefix: DEFAULT_LOCAL_STORAGE_URL.into(),
            }
        );
    }

    #[test]
    fn blank_values_are_unset() {
        let backend = StorageEnv {
            backend: Some("  ".into()),
            local_dir: Some("".into()),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(backend.name(), "local");
    }

    #[test]
    fn cloud_requires_bucket() {
        let result = StorageEnv {
            backend: Some("cloud".into()),
            ..Default::default()
        }
        .resolve();

        assert!(matches!(result, Err(CatalogError::Config(_))));
    }

    #[test]
    fn cloud_uses_default_endpoint() {
        let backend = StorageEnv {
            backend: Some("Cloud".into()),
            cloud_bucket: Some("catalog-media".into()),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(
            backend,
            StorageBackend::Cloud {
                bucket: "catalog-media".into(),
                api_endpoint: DEFAULT_CLOUD_API_ENDPOINT.into(),
                access_token: None,
            }
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result = StorageEnv {
            backend: Some("ftp".into()),
            ..Default::default()
        }
        .resolve();

        assert!(matches!(result, Err(CatalogError::Config(msg)) if msg.contains("ftp")));
    }

    #[test]
    fn empty_database_path_is_rejected() {
        let storage = StorageEnv::default().resolve().unwrap();
        assert!(CoreConfig::new(PathBuf::new(), storage.clone()).is_err());

        let cfg = CoreConfig::new(PathBuf::from("catalog.db"), storage).unwrap();
        assert_eq!(cfg.database_path(), Path::new("catalog.db"));
        assert_eq!(cfg.storage().name(), "local");
    }
}
