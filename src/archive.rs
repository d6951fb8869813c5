//! High-level [`SarArchive`] / [`SarWriter`] API, the primary embedding
//! surface.
//!
//! ```no_run
//! use sar::archive::{SarArchive, SarWriter};
//! use sar::{ArchiveLayout, PackOptions, UnpackOptions};
//!
//! // Write
//! let opts = PackOptions { layout: ArchiveLayout::Sar, ..Default::default() };
//! let mut ar = SarWriter::create("out.sar", opts)?;
//! ar.add_file("readme.txt", b"Hello, world!".to_vec());
//! ar.finalize()?;
//!
//! // Read
//! let opts = UnpackOptions { layout: ArchiveLayout::Sar, ..Default::default() };
//! let mut ar = SarArchive::open("out.sar", &opts)?;
//! let data = ar.read_by_name(b"readme.txt")?;
//! assert_eq!(data, b"Hello, world!");
//! # Ok::<(), sar::SarError>(())
//! ```

use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{lossy, Result, SarError};
use crate::io_stream::BinaryStream;
use crate::names::{display_name, name_to_path, path_to_name, NameEncoding};
use crate::pack::{pack, PackOptions, PackSummary};
use crate::table::{ArchiveTable, LogicalFile};
use crate::unpack::{extract_one, read_entry, read_table, write_scoped, UnpackOptions};

// ── FileInfo ──────────────────────────────────────────────────────────────────

/// Lightweight descriptor returned by [`SarArchive::list`].
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub index:           usize,
    /// Decoded for display; undecodable bytes are replaced.
    pub name:            String,
    /// Raw name bytes, hex encoded.
    pub name_hex:        String,
    pub data_origin:     u32,
    pub data_size:       u32,
    pub absolute_offset: u64,
}

// ── SarArchive ────────────────────────────────────────────────────────────────

pub struct SarArchive {
    path:       PathBuf,
    reader:     BinaryStream<BufReader<File>>,
    table:      ArchiveTable,
    stream_len: u64,
    encoding:   NameEncoding,
}

impl SarArchive {
    pub fn open<P: AsRef<Path>>(path: P, options: &UnpackOptions) -> Result<Self> {
        let path       = path.as_ref().to_owned();
        let mut reader = BinaryStream::new(BufReader::new(File::open(&path)?));
        let table      = read_table(&mut reader, options)?;
        let stream_len = reader.stream_len()?;
        tracing::debug!(path = %path.display(), entries = table.len(), "opened archive");
        Ok(Self { path, reader, table, stream_len, encoding: options.encoding })
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn table(&self) -> &ArchiveTable { &self.table }
    pub fn len(&self) -> usize { self.table.len() }
    pub fn is_empty(&self) -> bool { self.table.is_empty() }

    pub fn list(&self) -> Vec<FileInfo> {
        let base = self.table.data_region_start();
        self.table
            .entries()
            .iter()
            .enumerate()
            .map(|(index, e)| FileInfo {
                index,
                name:            display_name(e.name(), self.encoding),
                name_hex:        hex::encode(e.name()),
                data_origin:     e.data_origin(),
                data_size:       e.data_size(),
                absolute_offset: base + e.data_origin() as u64,
            })
            .collect()
    }

    /// First entry named exactly `name`.
    pub fn find(&self, name: &[u8]) -> Option<usize> {
        self.table.find(name)
    }

    pub fn read(&mut self, index: usize) -> Result<Vec<u8>> {
        read_entry(&mut self.reader, &self.table, index, self.stream_len)
    }

    pub fn read_by_name(&mut self, name: &[u8]) -> Result<Vec<u8>> {
        let index = self.find(name).ok_or_else(|| SarError::EntryNotFound(lossy(name)))?;
        self.read(index)
    }

    pub fn extract<P: AsRef<Path>>(&mut self, index: usize, destination: P) -> Result<u64> {
        extract_one(&self.table, index, &mut self.reader, destination.as_ref())
    }

    /// Extract every entry below `dest`.  Later duplicates overwrite earlier
    /// ones.
    pub fn extract_all<P: AsRef<Path>>(&mut self, dest: P) -> Result<usize> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest)?;
        for index in 0..self.table.len() {
            let target = dest.join(name_to_path(self.table.entries()[index].name(), self.encoding)?);
            extract_one(&self.table, index, &mut self.reader, &target)?;
        }
        Ok(self.table.len())
    }

    /// Like [`extract_all`](Self::extract_all), spread over the rayon pool.
    /// Each worker opens its own handle on the archive file.
    #[cfg(feature = "parallel")]
    pub fn extract_all_parallel<P: AsRef<Path>>(&self, dest: P) -> Result<usize> {
        use rayon::prelude::*;

        let dest = dest.as_ref();
        fs::create_dir_all(dest)?;

        let targets = self
            .table
            .entries()
            .iter()
            .map(|e| name_to_path(e.name(), self.encoding).map(|p| dest.join(p)))
            .collect::<Result<Vec<_>>>()?;

        targets.par_iter().enumerate().try_for_each_init(
            || File::open(&self.path).map(|f| BinaryStream::new(BufReader::new(f))),
            |reader, (index, target)| {
                let reader = reader.as_mut().map_err(|e| std::io::Error::new(e.kind(), e.to_string()))?;
                extract_one(&self.table, index, reader, target).map(|_| ())
            },
        )?;
        Ok(targets.len())
    }
}

// ── SarWriter ─────────────────────────────────────────────────────────────────

/// Collects files and writes the archive in one pass on [`finalize`](Self::finalize).
///
/// Nothing touches `path` until `finalize` succeeds; the archive is written
/// to a sibling temp file and renamed into place.
pub struct SarWriter {
    path:    PathBuf,
    options: PackOptions,
    files:   Vec<LogicalFile>,
}

impl SarWriter {
    pub fn create<P: AsRef<Path>>(path: P, options: PackOptions) -> Result<Self> {
        let path = path.as_ref().to_owned();
        if path.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            ).into());
        }
        Ok(Self { path, options, files: Vec::new() })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn add_file(&mut self, name: impl Into<Vec<u8>>, data: Vec<u8>) {
        self.files.push(LogicalFile::new(name, data));
    }

    /// Add the file at `root/relative`, named after `relative`.
    pub fn add_path(&mut self, root: &Path, relative: &Path) -> Result<()> {
        let name = path_to_name(relative, self.options.encoding)?;
        let data = fs::read(root.join(relative))?;
        self.files.push(LogicalFile { name, data });
        Ok(())
    }

    pub fn len(&self) -> usize { self.files.len() }
    pub fn is_empty(&self) -> bool { self.files.is_empty() }

    /// Lay out and write everything collected.
    pub fn finalize(self) -> Result<PackSummary> {
        let mut summary = None;
        write_scoped(&self.path, |w| {
            summary = Some(pack(w, &self.files, &self.options)?);
            Ok(())
        })?;
        summary.ok_or_else(|| std::io::Error::other("archive was not written").into())
    }
}
