//! Unpacker and single-entry extractor.
//!
//! Each entry is located independently at `data_region_start + data_origin`.
//! Entries may overlap or appear out of order; only each entry's own range
//! is checked against the stream length.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Result, SarError};
use crate::header::{ArchiveLayout, SarHeader};
use crate::io_stream::BinaryStream;
use crate::names::{name_to_path, NameEncoding};
use crate::pack::parse_option;
use crate::table::{ArchiveTable, LogicalFile, TableBoundary};

// ── UnpackOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`unpack`] and [`read_table`].
#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
    pub layout:   ArchiveLayout,
    /// Where a bare table ends.  Ignored for [`ArchiveLayout::Sar`], whose
    /// header carries the count.
    pub boundary: Option<TableBoundary>,
    /// Used by [`DirectorySink`] and path-based extraction only.
    pub encoding: NameEncoding,
}

impl UnpackOptions {
    /// Build from a key/value map.  Recognised keys: `layout`, `encoding`,
    /// `count`, `data_start`.  Anything else is ignored.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let mut opts       = Self::default();
        let mut count:      Option<usize> = None;
        let mut data_start: Option<u64>   = None;
        for (key, value) in map {
            match key.as_str() {
                "layout"     => opts.layout = parse_option(key, value, ArchiveLayout::from_name)?,
                "encoding"   => opts.encoding = parse_option(key, value, NameEncoding::from_name)?,
                "count"      => count = Some(parse_option(key, value, |v| v.parse().ok())?),
                "data_start" => data_start = Some(parse_option(key, value, |v| v.parse().ok())?),
                _ => tracing::debug!(key = %key, "ignoring unrecognised unpack option"),
            }
        }
        opts.boundary = match (count, data_start) {
            (Some(_), Some(start)) => {
                return Err(SarError::InvalidOption {
                    key:   "data_start".into(),
                    value: format!("{start} (count is also set; give one boundary)"),
                });
            }
            (Some(n), None)     => Some(TableBoundary::Count(n)),
            (None, Some(start)) => Some(TableBoundary::DataStart(start)),
            (None, None)        => None,
        };
        Ok(opts)
    }
}

// ── FileSink ──────────────────────────────────────────────────────────────────

/// Receives each unpacked entry, in table order.
pub trait FileSink {
    fn accept(&mut self, name: &[u8], data: Vec<u8>) -> Result<()>;
}

impl FileSink for Vec<LogicalFile> {
    fn accept(&mut self, name: &[u8], data: Vec<u8>) -> Result<()> {
        self.push(LogicalFile::new(name, data));
        Ok(())
    }
}

/// Writes entries below `root`, decoding names with `encoding`.
#[derive(Debug)]
pub struct DirectorySink {
    root:     PathBuf,
    encoding: NameEncoding,
    written:  Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>, encoding: NameEncoding) -> Self {
        Self { root: root.into(), encoding, written: Vec::new() }
    }

    /// Paths written so far, in table order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl FileSink for DirectorySink {
    fn accept(&mut self, name: &[u8], data: Vec<u8>) -> Result<()> {
        let path = self.root.join(name_to_path(name, self.encoding)?);
        write_scoped(&path, |w| Ok(w.write_all(&data)?))?;
        self.written.push(path);
        Ok(())
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// Decode the table from the start of `stream` according to `options`.
pub fn read_table<R: Read + Seek>(stream: &mut BinaryStream<R>, options: &UnpackOptions) -> Result<ArchiveTable> {
    stream.seek_absolute(0)?;
    match options.layout {
        ArchiveLayout::Bare => {
            let boundary = options.boundary.ok_or(SarError::MissingBoundary)?;
            ArchiveTable::read(stream, boundary)
        }
        ArchiveLayout::Sar => {
            let header = SarHeader::read(stream)?;
            if options.boundary.is_some() {
                tracing::debug!("sar header present, ignoring external boundary");
            }
            let table = ArchiveTable::read(stream, TableBoundary::Count(header.entry_count as usize))?;
            let declared = header.data_region_start as u64;
            if declared != table.data_region_start() {
                tracing::warn!(
                    declared,
                    table_end = table.data_region_start(),
                    "header data start disagrees with end of table, using header"
                );
            }
            Ok(ArchiveTable::from_parts(table.entries().to_vec(), declared))
        }
    }
}

/// Absolute offset of entry `index` after checking it fits in the stream.
pub(crate) fn locate(table: &ArchiveTable, index: usize, stream_len: u64) -> Result<u64> {
    let entry = table
        .get(index)
        .ok_or_else(|| SarError::EntryNotFound(format!("index {index}")))?;
    let offset = table.data_region_start() + entry.data_origin() as u64;
    let size   = entry.data_size() as u64;
    if offset + size > stream_len {
        return Err(SarError::OutOfBoundsRead {
            index,
            name: entry.name_lossy(),
            offset,
            size,
            stream_len,
        });
    }
    Ok(offset)
}

/// Read the full payload of entry `index`.
pub fn read_entry<R: Read + Seek>(
    stream:     &mut BinaryStream<R>,
    table:      &ArchiveTable,
    index:      usize,
    stream_len: u64,
) -> Result<Vec<u8>> {
    let offset = locate(table, index, stream_len)?;
    stream.seek_absolute(offset)?;
    Ok(stream.read_exact(table.entries()[index].data_size() as usize)?)
}

// ── unpack ───────────────────────────────────────────────────────────────────

/// Decode the table of `input` and deliver every entry to `sink` in table
/// order.  Any failure aborts the whole call.
pub fn unpack<R, K>(input: R, sink: &mut K, options: &UnpackOptions) -> Result<ArchiveTable>
where
    R: Read + Seek,
    K: FileSink + ?Sized,
{
    let mut stream = BinaryStream::new(input);
    let table      = read_table(&mut stream, options)?;
    let stream_len = stream.stream_len()?;
    tracing::debug!(
        entries = table.len(),
        data_region_start = table.data_region_start(),
        stream_len,
        "unpacking archive"
    );

    for (index, entry) in table.entries().iter().enumerate() {
        let data = read_entry(&mut stream, &table, index, stream_len)?;
        sink.accept(entry.name(), data)?;
    }
    Ok(table)
}

// ── extract_one ──────────────────────────────────────────────────────────────

/// Copy entry `index` to `destination`.
///
/// Bytes go to a temporary file next to `destination`, which replaces it
/// only after every byte is written and flushed.  On any error the temporary
/// file is closed and removed, and `destination` is untouched.
pub fn extract_one<R: Read + Seek>(
    table:       &ArchiveTable,
    index:       usize,
    input:       &mut BinaryStream<R>,
    destination: &Path,
) -> Result<u64> {
    let stream_len = input.stream_len()?;
    let offset     = locate(table, index, stream_len)?;
    let size       = table.entries()[index].data_size() as u64;

    write_scoped(destination, |w| {
        input.seek_absolute(offset)?;
        input.copy_exact_to(size, w)?;
        Ok(())
    })?;
    tracing::trace!(index, size, path = %destination.display(), "extracted");
    Ok(size)
}

/// Run `fill` against a buffered temp file and persist it as `destination`.
/// On error the temp file is removed and `destination` is left as it was.
pub(crate) fn write_scoped<F>(destination: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut fs::File>) -> Result<()>,
{
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        fill(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{pack, PackOptions};
    use std::io::Cursor;

    fn packed(files: &[LogicalFile], layout: ArchiveLayout) -> Vec<u8> {
        let mut out = Vec::new();
        pack(&mut out, files, &PackOptions { layout, ..Default::default() }).unwrap();
        out
    }

    #[test]
    fn count_and_data_start_together_are_rejected() {
        let map = BTreeMap::from([
            ("layout".to_owned(), "bare".to_owned()),
            ("count".to_owned(), "2".to_owned()),
            ("data_start".to_owned(), "32".to_owned()),
        ]);
        match UnpackOptions::from_map(&map) {
            Err(SarError::InvalidOption { key, .. }) => assert_eq!(key, "data_start"),
            other => panic!("unexpected: {other:?}"),
        }

        let map = BTreeMap::from([("data_start".to_owned(), "32".to_owned())]);
        assert_eq!(UnpackOptions::from_map(&map).unwrap().boundary, Some(TableBoundary::DataStart(32)));
    }

    #[test]
    fn bare_layout_requires_boundary() {
        let bytes = packed(&[LogicalFile::new("a", b"1".to_vec())], ArchiveLayout::Bare);
        let mut sink = Vec::new();
        assert!(matches!(
            unpack(Cursor::new(bytes), &mut sink, &UnpackOptions::default()),
            Err(SarError::MissingBoundary)
        ));
    }

    #[test]
    fn sar_layout_finds_its_own_boundary() {
        let files = vec![LogicalFile::new("x", b"abc".to_vec()), LogicalFile::new("y", b"".to_vec())];
        let bytes = packed(&files, ArchiveLayout::Sar);
        let mut sink: Vec<LogicalFile> = Vec::new();
        let opts = UnpackOptions { layout: ArchiveLayout::Sar, ..Default::default() };
        let table = unpack(Cursor::new(bytes), &mut sink, &opts).unwrap();
        assert_eq!(sink, files);
        assert_eq!(table.data_region_start(), 6 + 10 + 10);
    }

    #[test]
    fn header_data_start_wins() {
        // header says data starts 2 bytes later than the table ends
        let mut bytes = vec![0, 1, 0, 0, 0, 18];
        bytes.extend_from_slice(b"a\0\0\0\0\0\0\0\0\x02");
        bytes.extend_from_slice(b"..hi");
        let mut sink: Vec<LogicalFile> = Vec::new();
        let opts = UnpackOptions { layout: ArchiveLayout::Sar, ..Default::default() };
        unpack(Cursor::new(bytes), &mut sink, &opts).unwrap();
        assert_eq!(sink[0].data, b"hi");
    }

    #[test]
    fn overlapping_entries_are_allowed() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"all\0\0\0\0\0\0\0\0\x04");
        bytes.extend_from_slice(b"tail\0\0\0\0\x02\0\0\0\x02");
        bytes.extend_from_slice(b"wxyz");
        let mut sink: Vec<LogicalFile> = Vec::new();
        let opts = UnpackOptions { boundary: Some(TableBoundary::Count(2)), ..Default::default() };
        unpack(Cursor::new(bytes), &mut sink, &opts).unwrap();
        assert_eq!(sink[0].data, b"wxyz");
        assert_eq!(sink[1].data, b"yz");
    }

    #[test]
    fn out_of_bounds_reports_entry() {
        let mut bytes = b"big\0\0\0\0\0\0\0\0\x05".to_vec();
        bytes.extend_from_slice(b"1234");
        let mut sink: Vec<LogicalFile> = Vec::new();
        let opts = UnpackOptions { boundary: Some(TableBoundary::Count(1)), ..Default::default() };
        match unpack(Cursor::new(bytes), &mut sink, &opts) {
            Err(SarError::OutOfBoundsRead { index: 0, offset: 12, size: 5, stream_len: 16, .. }) => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn options_map_sets_boundary() {
        let mut map = BTreeMap::new();
        map.insert("count".to_owned(), "3".to_owned());
        map.insert("verbose".to_owned(), "yes".to_owned());
        let opts = UnpackOptions::from_map(&map).unwrap();
        assert_eq!(opts.boundary, Some(TableBoundary::Count(3)));

        map.insert("data_start".to_owned(), "nope".to_owned());
        assert!(matches!(UnpackOptions::from_map(&map), Err(SarError::InvalidOption { .. })));
    }

    #[test]
    fn extract_one_writes_exact_bytes() {
        let files = vec![LogicalFile::new("a", b"first".to_vec()), LogicalFile::new("b", b"second".to_vec())];
        let mut stream = BinaryStream::new(Cursor::new(packed(&files, ArchiveLayout::Bare)));
        let table = read_table(&mut stream, &UnpackOptions {
            boundary: Some(TableBoundary::Count(2)),
            ..Default::default()
        }).unwrap();

        let dir  = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("b.out");
        assert_eq!(extract_one(&table, 1, &mut stream, &dest).unwrap(), 6);
        assert_eq!(fs::read(&dest).unwrap(), b"second");
    }

    #[test]
    fn failed_extract_leaves_no_file() {
        let bytes = b"gone\0\0\0\0\0\0\0\0\x10".to_vec();
        let mut stream = BinaryStream::new(Cursor::new(bytes));
        let table = read_table(&mut stream, &UnpackOptions {
            boundary: Some(TableBoundary::Count(1)),
            ..Default::default()
        }).unwrap();

        let dir  = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone.bin");
        assert!(extract_one(&table, 0, &mut stream, &dest).is_err());
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn directory_sink_maps_backslashes() {
        let files = vec![LogicalFile::new("bgm\\op.ogg", b"ogg".to_vec())];
        let bytes = packed(&files, ArchiveLayout::Sar);
        let dir   = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path(), NameEncoding::ShiftJis);
        let opts = UnpackOptions { layout: ArchiveLayout::Sar, ..Default::default() };
        unpack(Cursor::new(bytes), &mut sink, &opts).unwrap();

        let expected = dir.path().join("bgm").join("op.ogg");
        assert_eq!(sink.written(), &[expected.clone()]);
        assert_eq!(fs::read(expected).unwrap(), b"ogg");
    }
}
