//! One entry of the archive table.
//!
//! On-disk layout (big-endian):
//!
//! | Field       | Size     | Notes                                   |
//! |-------------|----------|-----------------------------------------|
//! | name        | variable | raw bytes, never contains 0x00          |
//! | terminator  | 1        | 0x00                                    |
//! | data_origin | 4        | relative to the start of the data region |
//! | data_size   | 4        | payload length in bytes                 |
//!
//! Names are opaque byte strings.  They are usually Shift-JIS, which is why
//! nothing here assumes one byte per character or valid UTF-8.

use byteorder::{BigEndian, ByteOrder};
use std::io::{Read, Seek, Write};

use crate::error::{lossy, Result, SarError};
use crate::io_stream::BinaryStream;

pub const NAME_TERMINATOR: u8 = 0x00;
/// Terminator plus the two u32 fields.
pub const ENTRY_FIXED_SIZE: u64 = 9;

const PAIR_SIZE: usize = 8;

/// A decoded table entry.  Built in one step from a successful decode or
/// from the packer's layout pass; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryRecord {
    name:        Vec<u8>,
    data_origin: u32,
    data_size:   u32,
}

impl EntryRecord {
    pub fn new(name: impl Into<Vec<u8>>, data_origin: u32, data_size: u32) -> Self {
        Self { name: name.into(), data_origin, data_size }
    }

    pub fn name(&self) -> &[u8] { &self.name }
    pub fn data_origin(&self) -> u32 { self.data_origin }
    pub fn data_size(&self) -> u32 { self.data_size }

    /// End of the payload, relative to the data region.
    pub fn data_end(&self) -> u64 {
        self.data_origin as u64 + self.data_size as u64
    }

    /// Bytes this record occupies in the table.
    pub fn encoded_len(&self) -> u64 {
        self.name.len() as u64 + ENTRY_FIXED_SIZE
    }

    pub fn name_lossy(&self) -> String {
        lossy(&self.name)
    }

    /// Decode the record at the current position.  `index` only feeds error
    /// context.  On success the cursor sits at the next record.
    pub fn read<R: Read + Seek>(stream: &mut BinaryStream<R>, index: usize) -> Result<Self> {
        let start = stream.position()?;

        let mut name = Vec::new();
        loop {
            match stream.read_byte()? {
                Some(NAME_TERMINATOR) => break,
                Some(b)               => name.push(b),
                None                  => return Err(SarError::MalformedEntry { index, offset: start }),
            }
        }

        let pair = stream.read_up_to(PAIR_SIZE)?;
        if pair.len() < PAIR_SIZE {
            return Err(SarError::TruncatedHeader {
                index,
                offset:    start + name.len() as u64 + 1,
                available: pair.len() as u64,
            });
        }

        Ok(Self {
            name,
            data_origin: BigEndian::read_u32(&pair[0..4]),
            data_size:   BigEndian::read_u32(&pair[4..8]),
        })
    }

    pub fn write<W: Write>(&self, stream: &mut BinaryStream<W>, index: usize) -> Result<()> {
        validate_name(&self.name, index)?;
        stream.append_bytes(&self.name)?;
        stream.append_u8(NAME_TERMINATOR)?;
        stream.append_u32_be(self.data_origin)?;
        stream.append_u32_be(self.data_size)?;
        Ok(())
    }
}

/// An embedded terminator would silently split the name on the next decode.
pub(crate) fn validate_name(name: &[u8], index: usize) -> Result<()> {
    if name.contains(&NAME_TERMINATOR) {
        return Err(SarError::InvalidName { index, name: lossy(name) });
    }
    Ok(())
}
