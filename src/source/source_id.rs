//! Source identification type.

use std::path::Path;
use std::sync::Arc;

/// Unique identifier for a registered source.
///
/// `SourceId` tags producers, end-of-source markers and failure reports.
/// It uses `Arc<str>` internally, so cloning it onto producer threads and
/// into events is a pointer copy.
///
/// # Example
///
/// ```
/// use stream_merge::SourceId;
///
/// let a = SourceId::new("a.txt");
/// let b = SourceId::new("b.txt");
///
/// assert_ne!(a, b);
/// assert_eq!(a, SourceId::new("a.txt"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
    /// Creates a new source ID from a string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Creates a source ID from a file path, as it would be displayed.
    pub fn from_path(path: &Path) -> Self {
        Self::new(path.display().to_string())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
