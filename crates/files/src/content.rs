//! Content-addressed naming for uploads.
//!
//! The stored name of an upload is `<sha256-hex>[.<ext>]`. The digest makes names collision
//! resistant and deterministic (the same bytes always produce the same name); the extension is
//! detected from magic bytes so that public URLs keep a useful suffix without trusting anything
//! the client declared.

use crate::constants::HASH_ALGORITHM;
use catalog_types::StoredFilename;
use sha2::{Digest, Sha256};

/// Description of an upload's content, computed before it is written anywhere.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct ContentMetadata {
    /// Hashing algorithm used (always "sha256")
    pub hash_algorithm: &'static str,

    /// Lowercase hexadecimal digest of the content
    pub hash: String,

    /// Name the content is stored under
    pub filename: StoredFilename,

    /// Size of the content in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), if the magic bytes are recognised
    ///
    /// Best-effort only; `None` for formats `infer` does not know (including plain text).
    pub media_type: Option<&'static str>,
}

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The stored filename for `bytes`.
pub fn content_filename(bytes: &[u8]) -> StoredFilename {
    content_metadata(bytes).filename
}

/// Hashes and sniffs `bytes`, returning everything needed to stage them.
pub fn content_metadata(bytes: &[u8]) -> ContentMetadata {
    let hash = content_digest(bytes);
    let kind = infer::get(bytes);

    let name = match kind.map(|k| k.extension()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", hash, ext),
        _ => hash.clone(),
    };

    ContentMetadata {
        hash_algorithm: HASH_ALGORITHM,
        filename: StoredFilename::new(name).expect("hex digest with extension is a valid filename"),
        hash,
        size_bytes: bytes.len() as u64,
        media_type: kind.map(|k| k.mime_type()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn digest_of_empty_input_is_well_known() {
        assert_eq!(
            content_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn same_bytes_same_name() {
        let a = content_filename(b"first upload");
        let b = content_filename(b"first upload");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_different_name() {
        let a = content_filename(b"first upload");
        let b = content_filename(b"second upload");
        assert_ne!(a, b);
    }

    #[test]
    fn unrecognised_content_has_no_extension() {
        let meta = content_metadata(b"Hello, World!");

        assert_eq!(meta.hash_algorithm, "sha256");
        assert_eq!(meta.size_bytes, 13);
        assert_eq!(meta.media_type, None);
        assert_eq!(meta.filename.as_str(), meta.hash);
        assert_eq!(meta.hash.len(), 64);
    }

    #[test]
    fn png_content_gets_png_extension() {
        let meta = content_metadata(&PNG_HEADER);

        assert_eq!(meta.media_type, Some("image/png"));
        assert_eq!(meta.filename.extension(), Some("png"));
        assert_eq!(meta.filename.as_str(), format!("{}.png", meta.hash));
    }

    #[test]
    fn metadata_serialises() {
        let meta = content_metadata(&PNG_HEADER);
        let json = serde_json::to_string(&meta).unwrap();

        assert!(json.contains("sha256"));
        assert!(json.contains("image/png"));
    }
}
