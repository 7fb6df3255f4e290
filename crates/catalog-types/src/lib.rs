//! Validated filename type shared across the catalog crates.

/// Errors that can occur when validating a stored filename.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input cannot be used as a single object-store path segment
    #[error("Invalid filename '{0}': {1}")]
    InvalidFilename(String, &'static str),
}

/// Longest filename accepted as a stored object name.
pub const MAX_FILENAME_LEN: usize = 255;

/// The filename part of an object path, stored verbatim on an entity record.
///
/// A `StoredFilename` is always exactly one path segment: it can be joined under an entity
/// namespace without escaping it. The input is never trimmed; anything that would change
/// meaning when used as a path is rejected instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoredFilename(String);

impl StoredFilename {
    /// Validates `input` as a single, traversal-free path segment.
    ///
    /// # Errors
    ///
    /// - [`TextError::Empty`] for empty or whitespace-only input
    /// - [`TextError::InvalidFilename`] for `.`/`..`, separators, NUL or control characters,
    ///   surrounding whitespace, or names longer than [`MAX_FILENAME_LEN`] bytes
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let name = input.as_ref();

        if name.trim().is_empty() {
            return Err(TextError::Empty);
        }
        if name.trim() != name {
            return Err(TextError::InvalidFilename(
                name.to_owned(),
                "surrounding whitespace",
            ));
        }
        if name == "." || name == ".." {
            return Err(TextError::InvalidFilename(
                name.to_owned(),
                "relative path component",
            ));
        }
        if name.len() > MAX_FILENAME_LEN {
            return Err(TextError::InvalidFilename(name.to_owned(), "too long"));
        }
        if name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(TextError::InvalidFilename(
                name.to_owned(),
                "separator or control character",
            ));
        }

        Ok(Self(name.to_owned()))
    }

    /// Returns the filename as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the extension (text after the last `.`), if any.
    pub fn extension(&self) -> Option<&str> {
        self.0
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }
}

impl std::fmt::Display for StoredFilename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StoredFilename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for StoredFilename {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for StoredFilename {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for StoredFilename {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        StoredFilename::new(&s).map_err(serde::de::Error::custom)
    }
}
