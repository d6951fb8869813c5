//! Packer: logical files in, one archive stream out.
//!
//! ```
//! use sar::{pack, LogicalFile, PackOptions};
//!
//! let files = vec![LogicalFile::new("readme.txt", b"hello".to_vec())];
//! let mut out = Vec::new();
//! let summary = pack(&mut out, &files, &PackOptions::default())?;
//! assert_eq!(out.len() as u64, summary.total_len);
//! # Ok::<(), sar::SarError>(())
//! ```

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::{Result, SarError};
use crate::header::{ArchiveLayout, SarHeader};
use crate::io_stream::BinaryStream;
use crate::names::NameEncoding;
use crate::table::{ArchiveTable, LogicalFile};

// ── PackOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`pack`].
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    pub layout:   ArchiveLayout,
    /// Used only when names are derived from paths; the packer itself
    /// writes names as given.
    pub encoding: NameEncoding,
}

impl PackOptions {
    /// Build from a key/value map.  Recognised keys: `layout`, `encoding`.
    /// Anything else is ignored.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let mut opts = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "layout"   => opts.layout = parse_option(key, value, ArchiveLayout::from_name)?,
                "encoding" => opts.encoding = parse_option(key, value, NameEncoding::from_name)?,
                _          => tracing::debug!(key = %key, "ignoring unrecognised pack option"),
            }
        }
        Ok(opts)
    }
}

pub(crate) fn parse_option<T>(key: &str, value: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| SarError::InvalidOption { key: key.to_owned(), value: value.to_owned() })
}

// ── PackSummary ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    pub entry_count:       usize,
    pub data_region_start: u64,
    pub data_len:          u64,
    /// `data_region_start + data_len`; every byte written.
    pub total_len:         u64,
}

// ── pack ─────────────────────────────────────────────────────────────────────

/// Write `files` to `output` as one archive, in the order given.
///
/// The whole table is laid out before the first byte is written, so an
/// invalid name or an oversized payload fails with nothing emitted.
pub fn pack<W: Write>(output: W, files: &[LogicalFile], options: &PackOptions) -> Result<PackSummary> {
    let table  = ArchiveTable::from_files(files, options.layout.table_origin())?;
    let header = match options.layout {
        ArchiveLayout::Sar  => Some(SarHeader::for_table(&table)?),
        ArchiveLayout::Bare => None,
    };

    let mut stream = BinaryStream::new(output);
    if let Some(header) = header {
        header.write(&mut stream)?;
    }
    table.write(&mut stream)?;
    for file in files {
        stream.append_bytes(&file.data)?;
    }
    stream.flush()?;

    let data_len: u64 = files.iter().map(|f| f.data.len() as u64).sum();
    let summary = PackSummary {
        entry_count:       table.len(),
        data_region_start: table.data_region_start(),
        data_len,
        total_len:         table.data_region_start() + data_len,
    };
    tracing::debug!(
        layout = options.layout.name(),
        entries = summary.entry_count,
        data_region_start = summary.data_region_start,
        total = summary.total_len,
        "packed archive"
    );
    Ok(summary)
}
