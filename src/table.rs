//! The ordered entry table and the logical files it describes.
//!
//! # Layout pass
//! A record's `data_origin` is relative to the data region, and the data
//! region starts where the table ends.  [`ArchiveTable::from_files`] therefore
//! sizes every record first, then assigns offsets in a second walk.  No
//! payload byte can be written before both passes finish.
//!
//! # Boundary
//! Records carry no count and no end marker.  Decoding needs a
//! [`TableBoundary`] from the surrounding container (the SAR header, or the
//! caller for bare tables).

use std::collections::HashSet;
use std::io::{Read, Seek, Write};

use crate::entry::{validate_name, EntryRecord, ENTRY_FIXED_SIZE};
use crate::error::{Result, SarError};
use crate::io_stream::BinaryStream;

/// Upper bound on pre-allocation from an untrusted count.
const MAX_PREALLOC: usize = 4096;

// ── LogicalFile ───────────────────────────────────────────────────────────────

/// A named payload as the caller sees it, before packing or after unpacking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalFile {
    pub name: Vec<u8>,
    pub data: Vec<u8>,
}

impl LogicalFile {
    pub fn new(name: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), data: data.into() }
    }
}

// ── TableBoundary ─────────────────────────────────────────────────────────────

/// How the decoder knows it has read the last record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableBoundary {
    /// Exactly this many records.
    Count(usize),
    /// Records continue until the cursor reaches this absolute offset.
    DataStart(u64),
}

// ── ArchiveTable ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTable {
    entries:           Vec<EntryRecord>,
    data_region_start: u64,
}

impl ArchiveTable {
    pub(crate) fn from_parts(entries: Vec<EntryRecord>, data_region_start: u64) -> Self {
        Self { entries, data_region_start }
    }

    pub fn entries(&self) -> &[EntryRecord] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn get(&self, index: usize) -> Option<&EntryRecord> { self.entries.get(index) }

    /// Absolute offset of the first payload byte.
    pub fn data_region_start(&self) -> u64 { self.data_region_start }

    /// Absolute offset of entry `index`'s payload.
    pub fn absolute_offset(&self, index: usize) -> Option<u64> {
        self.entries.get(index).map(|e| self.data_region_start + e.data_origin() as u64)
    }

    /// Sum of all record sizes in bytes.
    pub fn encoded_len(&self) -> u64 {
        self.entries.iter().map(EntryRecord::encoded_len).sum()
    }

    /// Furthest payload end, relative to the data region.
    pub fn data_len(&self) -> u64 {
        self.entries.iter().map(EntryRecord::data_end).max().unwrap_or(0)
    }

    /// Index of the first entry whose name equals `name` byte-for-byte.
    pub fn find(&self, name: &[u8]) -> Option<usize> {
        self.entries.iter().position(|e| e.name() == name)
    }

    /// Lay out `files` as a table whose first record sits at `table_origin`.
    ///
    /// Pass 1 sizes the table, fixing `data_region_start`.  Pass 2 assigns
    /// each file the running sum of the sizes before it.  Order is kept.
    pub fn from_files(files: &[LogicalFile], table_origin: u64) -> Result<Self> {
        let mut table_len = 0u64;
        for (index, file) in files.iter().enumerate() {
            validate_name(&file.name, index)?;
            table_len += file.name.len() as u64 + ENTRY_FIXED_SIZE;
        }
        let data_region_start = table_origin + table_len;

        let slots = assign_origins(files.iter().map(|f| f.data.len() as u64))?;

        let mut seen    = HashSet::new();
        let mut entries = Vec::with_capacity(files.len());
        for (file, (data_origin, data_size)) in files.iter().zip(slots) {
            if !seen.insert(file.name.as_slice()) {
                tracing::warn!(name = %String::from_utf8_lossy(&file.name), "duplicate entry name");
            }
            entries.push(EntryRecord::new(file.name.clone(), data_origin, data_size));
        }

        Ok(Self { entries, data_region_start })
    }

    /// Decode records from the current position up to `boundary`.
    pub fn read<R: Read + Seek>(stream: &mut BinaryStream<R>, boundary: TableBoundary) -> Result<Self> {
        let entries = match boundary {
            TableBoundary::Count(count) => {
                let mut entries = Vec::with_capacity(count.min(MAX_PREALLOC));
                for index in 0..count {
                    let record = EntryRecord::read(stream, index)?;
                    tracing::trace!(index, name = %record.name_lossy(), origin = record.data_origin(),
                                    size = record.data_size(), "entry");
                    entries.push(record);
                }
                entries
            }
            TableBoundary::DataStart(end) => {
                let mut entries = Vec::new();
                loop {
                    let start = stream.position()?;
                    if start >= end {
                        break;
                    }
                    let index  = entries.len();
                    let record = EntryRecord::read(stream, index)?;
                    if stream.position()? > end {
                        return Err(SarError::MalformedEntry { index, offset: start });
                    }
                    tracing::trace!(index, name = %record.name_lossy(), origin = record.data_origin(),
                                    size = record.data_size(), "entry");
                    entries.push(record);
                }
                entries
            }
        };

        let data_region_start = stream.position()?;
        Ok(Self { entries, data_region_start })
    }

    pub fn write<W: Write>(&self, stream: &mut BinaryStream<W>) -> Result<()> {
        for (index, record) in self.entries.iter().enumerate() {
            record.write(stream, index)?;
        }
        Ok(())
    }
}

/// `(data_origin, data_size)` for each payload size, in order.  Origins are
/// the running sum of earlier sizes; both must fit the 32-bit fields.
pub(crate) fn assign_origins(sizes: impl IntoIterator<Item = u64>) -> Result<Vec<(u32, u32)>> {
    let mut origin = 0u64;
    let mut slots  = Vec::new();
    for size in sizes {
        let data_origin = u32::try_from(origin)
            .map_err(|_| SarError::PayloadTooLarge { what: "data offset", value: origin })?;
        let data_size = u32::try_from(size)
            .map_err(|_| SarError::PayloadTooLarge { what: "payload", value: size })?;
        slots.push((data_origin, data_size));
        origin += size;
    }
    Ok(slots)
}
