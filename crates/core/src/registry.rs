//! Media field registry.
//!
//! Declares, per entity kind, which attributes hold file references. The orchestrator uses it
//! to decide which inputs must be staged in the object store instead of persisted directly,
//! and URL derivation uses it to know which `{field}_url` values to produce.

use crate::constants::URL_ATTRIBUTE_SUFFIX;
use std::collections::BTreeMap;

/// Broad media class of a file field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Whether a sniffed MIME type belongs to this media class.
    pub fn accepts(self, media_type: &str) -> bool {
        let class = match self {
            MediaKind::Video => "video/",
            MediaKind::Image => "image/",
        };
        media_type.starts_with(class)
    }
}

/// One file-valued attribute of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFieldDescriptor {
    pub name: &'static str,
    pub media: MediaKind,
}

impl FileFieldDescriptor {
    pub const fn new(name: &'static str, media: MediaKind) -> Self {
        Self { name, media }
    }

    /// Name of the derived public URL attribute, e.g. `thumb_file_url`.
    pub fn url_attribute(&self) -> String {
        url_attribute(self.name)
    }
}

/// `{field}_url`.
pub fn url_attribute(field: &str) -> String {
    format!("{}{}", field, URL_ATTRIBUTE_SUFFIX)
}

/// An entity kind that carries file attachments.
pub trait MediaEntity {
    /// Kind name stored on records.
    const KIND: &'static str;

    /// File fields of this kind, in display order.
    const FILE_FIELDS: &'static [FileFieldDescriptor];
}

/// Catalog videos: the feature itself, a trailer, and two artwork images.
#[derive(Debug, Clone, Copy)]
pub struct Video;

impl Video {
    pub const VIDEO_FILE: FileFieldDescriptor =
        FileFieldDescriptor::new("video_file", MediaKind::Video);
    pub const TRAILER_FILE: FileFieldDescriptor =
        FileFieldDescriptor::new("trailer_file", MediaKind::Video);
    pub const THUMB_FILE: FileFieldDescriptor =
        FileFieldDescriptor::new("thumb_file", MediaKind::Image);
    pub const BANNER_FILE: FileFieldDescriptor =
        FileFieldDescriptor::new("banner_file", MediaKind::Image);
}

impl MediaEntity for Video {
    const KIND: &'static str = "video";
    const FILE_FIELDS: &'static [FileFieldDescriptor] = &[
        Video::VIDEO_FILE,
        Video::TRAILER_FILE,
        Video::THUMB_FILE,
        Video::BANNER_FILE,
    ];
}

/// Lookup table from kind name to its file fields.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    kinds: BTreeMap<&'static str, &'static [FileFieldDescriptor]>,
}

impl FieldRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry of every built-in catalog kind.
    pub fn catalog() -> Self {
        Self::new().with_entity::<Video>()
    }

    pub fn with_entity<E: MediaEntity>(mut self) -> Self {
        self.kinds.insert(E::KIND, E::FILE_FIELDS);
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }

    pub fn file_fields(&self, kind: &str) -> Option<&'static [FileFieldDescriptor]> {
        self.kinds.get(kind).copied()
    }

    pub fn descriptor(&self, kind: &str, field: &str) -> Option<&'static FileFieldDescriptor> {
        self.file_fields(kind)?.iter().find(|d| d.name == field)
    }

    pub fn is_file_field(&self, kind: &str, field: &str) -> bool {
        self.descriptor(kind, field).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_declares_four_file_fields() {
        let names: Vec<&str> = Video::FILE_FIELDS.iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            ["video_file", "trailer_file", "thumb_file", "banner_file"]
        );
    }

    #[test]
    fn catalog_registry_knows_video() {
        let registry = FieldRegistry::catalog();

        assert_eq!(registry.kinds().collect::<Vec<_>>(), ["video"]);
        assert!(registry.is_file_field("video", "thumb_file"));
        assert!(!registry.is_file_field("video", "title"));
        assert!(!registry.is_file_field("category", "thumb_file"));
        assert_eq!(
            registry.descriptor("video", "banner_file").map(|d| d.media),
            Some(MediaKind::Image)
        );
    }

    #[test]
    fn url_attribute_appends_suffix() {
        assert_eq!(Video::TRAILER_FILE.url_attribute(), "trailer_file_url");
        assert_eq!(url_attribute("x"), "x_url");
    }

    #[test]
    fn media_kind_matches_mime_class() {
        assert!(MediaKind::Image.accepts("image/png"));
        assert!(MediaKind::Video.accepts("video/mp4"));
        assert!(!MediaKind::Image.accepts("video/mp4"));
        assert!(!MediaKind::Video.accepts("application/pdf"));
    }

    #[test]
    fn empty_registry_has_no_kinds() {
        let registry = FieldRegistry::new();
        assert!(registry.file_fields("video").is_none());
    }
}
