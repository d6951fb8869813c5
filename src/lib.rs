//! Reader and writer for NScripter SAR resource archives.
//!
//! A SAR archive is an entry table (name, data offset, data size per file)
//! followed by every payload concatenated in table order.  No compression,
//! no encryption, no padding.
//!
//! - [`pack`] / [`unpack`] work on any `Write` / `Read + Seek` stream.
//! - [`archive::SarArchive`] and [`archive::SarWriter`] are the file-backed
//!   convenience layer.

pub mod archive;
pub mod entry;
pub mod error;
pub mod header;
pub mod io_stream;
pub mod names;
pub mod pack;
pub mod table;
pub mod unpack;

pub use entry::EntryRecord;
pub use error::{Result, SarError};
pub use header::{ArchiveLayout, SarHeader};
pub use io_stream::BinaryStream;
pub use names::NameEncoding;
pub use pack::{pack, PackOptions, PackSummary};
pub use table::{ArchiveTable, LogicalFile, TableBoundary};
pub use unpack::{extract_one, read_table, unpack, DirectorySink, FileSink, UnpackOptions};
