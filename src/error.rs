//! Error taxonomy for SAR archive operations.
//!
//! Every variant carries the entry index and/or byte offset that triggered
//! it, so a corrupt archive can be diagnosed from the message alone.  Names
//! are stored lossily decoded; the archive itself is never touched.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SarError>;

#[derive(Error, Debug)]
pub enum SarError {
    /// Stream ended before the name's 0x00 terminator.
    #[error("entry {index}: name starting at offset {offset} has no terminator")]
    MalformedEntry { index: usize, offset: u64 },

    /// Fewer than 8 bytes follow the name terminator.
    #[error("entry {index}: offset/size pair at {offset} truncated ({available} of 8 bytes available)")]
    TruncatedHeader { index: usize, offset: u64, available: u64 },

    /// The fixed SAR header (entry count + data start) is cut short.
    #[error("archive header truncated ({available} of {needed} bytes available)")]
    TruncatedArchiveHeader { needed: u64, available: u64 },

    /// A name being encoded contains the 0x00 terminator byte.
    #[error("entry {index}: name {name:?} contains an embedded NUL byte")]
    InvalidName { index: usize, name: String },

    #[error("entry {index} ({name:?}): {size} bytes at offset {offset} exceed stream length {stream_len}")]
    OutOfBoundsRead {
        index:      usize,
        name:       String,
        offset:     u64,
        size:       u64,
        stream_len: u64,
    },

    /// A 32-bit on-disk field would overflow.
    #[error("{what} of {value} bytes exceeds the 32-bit format limit")]
    PayloadTooLarge { what: &'static str, value: u64 },

    /// The SAR header stores the entry count in 16 bits.
    #[error("{count} entries exceed the header limit of {max}")]
    TooManyEntries { count: usize, max: usize },

    /// A bare table was decoded without an entry count or data start.
    #[error("bare layout needs an entry count or data start to find the end of the table")]
    MissingBoundary,

    /// A recognised option key carries a value that cannot be parsed.
    #[error("invalid value {value:?} for option {key:?}")]
    InvalidOption { key: String, value: String },

    /// The name cannot be mapped to or from the selected text encoding.
    #[error("name {name:?} is not representable in {encoding}")]
    NameEncoding { name: String, encoding: &'static str },

    /// The name would place a file outside the extraction root.
    #[error("unsafe entry path {name:?}")]
    UnsafePath { name: String },

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Render raw name bytes for messages and listings.
pub(crate) fn lossy(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}
