use std::io::{Read, Write};

use crate::error::{BinaryGcodeError, Result};
use crate::fio;
use crate::types::{ChecksumKind, MAGIC, VERSION};

/// The header at offset zero of every binary gcode stream.
///
/// |               | type     | size    | description                        |
/// | ------------- | -------- | ------- | ---------------------------------- |
/// | Magic Number  | uint32_t | 4 bytes | GCDE                               |
/// | Version       | uint32_t | 4 bytes | Version of the G-code binarization |
/// | Checksum type | uint16_t | 2 bytes | Algorithm used for checksum        |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub checksum: ChecksumKind,
}

impl FileHeader {
    /// On-disk size in bytes.
    pub const SIZE: u64 = 10;

    pub fn new(checksum: ChecksumKind) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            checksum,
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.magic != MAGIC {
            return Err(BinaryGcodeError::InvalidMagicNumber);
        }
        fio::write_u32(writer, self.magic)?;
        fio::write_u32(writer, self.version)?;
        fio::write_u16(writer, self.checksum.to_u16())?;
        Ok(())
    }

    /// Read a header from the current position. If `max_version` is given
    /// the stored version is checked against it.
    pub fn read<R: Read>(reader: &mut R, max_version: Option<u32>) -> Result<Self> {
        let magic = fio::read_u32(reader)?;
        if magic != MAGIC {
            return Err(BinaryGcodeError::InvalidMagicNumber);
        }

        let version = fio::read_u32(reader)?;
        if let Some(max) = max_version {
            if version > max {
                return Err(BinaryGcodeError::InvalidVersionNumber);
            }
        }

        let checksum = ChecksumKind::new(fio::read_u16(reader)?)?;

        Ok(Self {
            magic,
            version,
            checksum,
        })
    }
}
