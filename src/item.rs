//! The unit of data moved through the shared buffer.

use crate::source::SourceId;

/// One entry of the shared buffer.
///
/// Data bytes and control markers are separate variants, so every `u8`
/// value, including `0xFF`, is valid data.
///
/// # Example
///
/// ```
/// use stream_merge::{Item, SourceId};
///
/// let item = Item::Data(0xFF);
/// assert_eq!(item.as_byte(), Some(0xFF));
///
/// let marker = Item::EndOfSource(SourceId::new("a.txt"));
/// assert!(marker.is_end_of_source());
/// assert_eq!(marker.as_byte(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A byte read from a source.
    Data(u8),

    /// The named source was read to its end.
    ///
    /// This marks progress of one source only. The consumer keeps running
    /// until the buffer is closed and empty.
    EndOfSource(SourceId),
}

impl Item {
    /// Returns the data byte, or `None` for a marker.
    pub fn as_byte(&self) -> Option<u8> {
        match self {
            Self::Data(byte) => Some(*byte),
            Self::EndOfSource(_) => None,
        }
    }

    /// Returns `true` if this is an end-of-source marker.
    pub fn is_end_of_source(&self) -> bool {
        matches!(self, Self::EndOfSource(_))
    }
}

impl From<u8> for Item {
    fn from(byte: u8) -> Self {
        Self::Data(byte)
    }
}
