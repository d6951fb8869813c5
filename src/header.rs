//! Archive layouts and the fixed SAR header.
//!
//! The bare layout is table-then-data with nothing in front; whoever reads
//! it must know where the table stops.  Shipped `.sar` files put a 6-byte
//! big-endian header in front of the table that answers that question:
//!
//! | Offset | Size | Field             |
//! |--------|------|-------------------|
//! | 0      | 2    | entry_count       |
//! | 2      | 4    | data_region_start |

use std::io::{Read, Write};

use crate::error::{Result, SarError};
use crate::io_stream::BinaryStream;
use crate::table::ArchiveTable;

pub const SAR_HEADER_SIZE: u64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveLayout {
    /// Table and data only; the entry boundary is supplied by the caller.
    #[default]
    Bare,
    /// Count/data-start header followed by table and data.
    Sar,
}

impl ArchiveLayout {
    /// Absolute offset of the first table record.
    pub fn table_origin(self) -> u64 {
        match self {
            ArchiveLayout::Bare => 0,
            ArchiveLayout::Sar  => SAR_HEADER_SIZE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ArchiveLayout::Bare => "bare",
            ArchiveLayout::Sar  => "sar",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bare" => Some(ArchiveLayout::Bare),
            "sar"  => Some(ArchiveLayout::Sar),
            _      => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarHeader {
    pub entry_count:       u16,
    pub data_region_start: u32,
}

impl SarHeader {
    /// Header describing `table`, which must have been laid out with
    /// [`ArchiveLayout::Sar`].
    pub fn for_table(table: &ArchiveTable) -> Result<Self> {
        let entry_count = u16::try_from(table.len()).map_err(|_| SarError::TooManyEntries {
            count: table.len(),
            max:   u16::MAX as usize,
        })?;
        let data_region_start = u32::try_from(table.data_region_start()).map_err(|_| {
            SarError::PayloadTooLarge { what: "table", value: table.data_region_start() }
        })?;
        Ok(Self { entry_count, data_region_start })
    }

    pub fn read<R: Read>(stream: &mut BinaryStream<R>) -> Result<Self> {
        let raw = stream.read_up_to(SAR_HEADER_SIZE as usize)?;
        if raw.len() < SAR_HEADER_SIZE as usize {
            return Err(SarError::TruncatedArchiveHeader {
                needed:    SAR_HEADER_SIZE,
                available: raw.len() as u64,
            });
        }
        let mut fields = BinaryStream::new(&raw[..]);
        Ok(Self {
            entry_count:       fields.read_u16_be()?,
            data_region_start: fields.read_u32_be()?,
        })
    }

    pub fn write<W: Write>(&self, stream: &mut BinaryStream<W>) -> Result<()> {
        stream.append_u16_be(self.entry_count)?;
        stream.append_u32_be(self.data_region_start)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_is_six_big_endian_bytes() {
        let mut s = BinaryStream::new(Cursor::new(Vec::new()));
        SarHeader { entry_count: 2, data_region_start: 0x1C }.write(&mut s).unwrap();
        assert_eq!(s.get_ref().get_ref(), &vec![0, 2, 0, 0, 0, 0x1C]);

        s.seek_absolute(0).unwrap();
        let h = SarHeader::read(&mut s).unwrap();
        assert_eq!(h, SarHeader { entry_count: 2, data_region_start: 0x1C });
    }

    #[test]
    fn short_header_is_rejected() {
        let mut s = BinaryStream::new(Cursor::new(vec![0, 1, 0]));
        match SarHeader::read(&mut s) {
            Err(SarError::TruncatedArchiveHeader { needed: 6, available: 3 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn layout_names() {
        assert_eq!(ArchiveLayout::from_name("SAR"), Some(ArchiveLayout::Sar));
        assert_eq!(ArchiveLayout::from_name("bare"), Some(ArchiveLayout::Bare));
        assert_eq!(ArchiveLayout::from_name("nsa"), None);
        assert_eq!(ArchiveLayout::Sar.table_origin(), 6);
    }

    #[test]
    fn entry_count_past_u16_is_rejected_before_writing() {
        use crate::pack::{pack, PackOptions};
        use crate::table::LogicalFile;

        let files = vec![LogicalFile::new("e", Vec::new()); u16::MAX as usize + 1];
        let opts  = PackOptions { layout: ArchiveLayout::Sar, ..Default::default() };
        let mut out = Vec::new();
        match pack(&mut out, &files, &opts) {
            Err(SarError::TooManyEntries { count: 65536, max: 65535 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn data_start_past_u32_is_rejected() {
        let table = ArchiveTable::from_parts(Vec::new(), u32::MAX as u64 + 1);
        match SarHeader::for_table(&table) {
            Err(SarError::PayloadTooLarge { what: "table", value }) => assert_eq!(value, u32::MAX as u64 + 1),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
