/// Suffix of in-progress local writes; such files are never reported as objects.
pub const TEMP_FILE_SUFFIX: &str = ".partial";

/// Google Cloud Storage JSON API endpoint used when none is configured.
pub const DEFAULT_CLOUD_API_ENDPOINT: &str = "https://storage.googleapis.com";

/// Hash algorithm tag recorded in [`crate::ContentMetadata`].
pub(crate) const HASH_ALGORITHM: &str = "sha256";
