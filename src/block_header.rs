use std::io::{Read, Seek, Write};

use crate::checksum::Checksum;
use crate::error::Result;
use crate::fio;
use crate::types::{BlockKind, CompressionAlgorithm};

/// The fixed header every block starts with. `compressed_size` is only
/// present on disk when the block data is compressed, so the serialised
/// form is eight or twelve bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub kind: BlockKind,
    pub compression: CompressionAlgorithm,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    position: u64,
}

impl BlockHeader {
    pub fn new(
        kind: BlockKind,
        compression: CompressionAlgorithm,
        uncompressed_size: u32,
        compressed_size: u32,
    ) -> Self {
        Self {
            kind,
            compression,
            uncompressed_size,
            compressed_size,
            position: 0,
        }
    }

    /// The stream offset this header was read from or written to.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The serialised size of this header, in bytes.
    pub fn size(&self) -> u64 {
        match self.compression {
            CompressionAlgorithm::None => 8,
            _ => 12,
        }
    }

    /// The on-disk byte count of the block data this header describes.
    pub fn data_size(&self) -> u64 {
        match self.compression {
            CompressionAlgorithm::None => self.uncompressed_size as u64,
            _ => self.compressed_size as u64,
        }
    }

    /// Feed the serialised header fields into a block checksum, in their
    /// on-disk order.
    pub fn update_checksum(&self, checksum: &mut Checksum) {
        checksum.append_u16(self.kind.to_u16());
        checksum.append_u16(self.compression.to_u16());
        checksum.append_u32(self.uncompressed_size);
        if self.compression != CompressionAlgorithm::None {
            checksum.append_u32(self.compressed_size);
        }
    }

    pub fn write<W: Write + Seek>(&mut self, writer: &mut W) -> Result<()> {
        self.position = fio::tell(writer)?;
        fio::write_u16(writer, self.kind.to_u16())?;
        fio::write_u16(writer, self.compression.to_u16())?;
        fio::write_u32(writer, self.uncompressed_size)?;
        if self.compression != CompressionAlgorithm::None {
            fio::write_u32(writer, self.compressed_size)?;
        }
        Ok(())
    }

    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let position = fio::tell(reader)?;
        let kind = BlockKind::new(fio::read_u16(reader)?)?;
        let compression = CompressionAlgorithm::new(fio::read_u16(reader)?)?;
        let uncompressed_size = fio::read_u32(reader)?;
        let compressed_size = match compression {
            CompressionAlgorithm::None => 0,
            _ => fio::read_u32(reader)?,
        };
        Ok(Self {
            kind,
            compression,
            uncompressed_size,
            compressed_size,
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BinaryGcodeError;
    use crate::types::ChecksumKind;
    use std::io::Cursor;

    #[test]
    fn uncompressed_header_is_eight_bytes() {
        let mut header =
            BlockHeader::new(BlockKind::GCode, CompressionAlgorithm::None, 100, 0);
        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();
        assert_eq!(header.size(), 8);
        assert_eq!(cursor.into_inner().len(), 8);
    }

    #[test]
    fn compressed_header_is_twelve_bytes() {
        let mut header =
            BlockHeader::new(BlockKind::GCode, CompressionAlgorithm::Deflate, 100, 42);
        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();
        assert_eq!(header.size(), 12);
        assert_eq!(cursor.into_inner().len(), 12);
    }

    #[test]
    fn write_read_round_trip_records_position() {
        let mut cursor = Cursor::new(vec![0u8; 4]);
        cursor.set_position(4);
        let mut header =
            BlockHeader::new(BlockKind::Thumbnail, CompressionAlgorithm::None, 64, 0);
        header.write(&mut cursor).unwrap();
        assert_eq!(header.position(), 4);

        cursor.set_position(4);
        let read = BlockHeader::read(&mut cursor).unwrap();
        assert_eq!(read.kind, BlockKind::Thumbnail);
        assert_eq!(read.compression, CompressionAlgorithm::None);
        assert_eq!(read.uncompressed_size, 64);
        assert_eq!(read.position(), 4);
        assert_eq!(cursor.position(), 4 + read.size());
    }

    #[test]
    fn unknown_block_type_is_rejected() {
        let mut cursor = Cursor::new(vec![9, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            BlockHeader::read(&mut cursor),
            Err(BinaryGcodeError::InvalidBlockType)
        );
    }

    #[test]
    fn unknown_compression_is_rejected() {
        let mut cursor = Cursor::new(vec![1, 0, 9, 0, 0, 0, 0, 0]);
        assert_eq!(
            BlockHeader::read(&mut cursor),
            Err(BinaryGcodeError::InvalidCompressionType)
        );
    }

    #[test]
    fn checksum_covers_the_serialised_fields() {
        let header = BlockHeader::new(BlockKind::GCode, CompressionAlgorithm::Deflate, 10, 5);
        let mut from_header = Checksum::new(ChecksumKind::Crc32);
        header.update_checksum(&mut from_header);

        let mut from_bytes = Checksum::new(ChecksumKind::Crc32);
        from_bytes.append(&[1, 0, 1, 0, 10, 0, 0, 0, 5, 0, 0, 0]);
        assert!(from_header.matches(&from_bytes));
    }

    #[test]
    fn compressed_round_trip() {
        let mut cursor = Cursor::new(Vec::new());
        let mut header =
            BlockHeader::new(BlockKind::SlicerMetadata, CompressionAlgorithm::Deflate, 9, 3);
        header.write(&mut cursor).unwrap();
        cursor.set_position(0);
        let read = BlockHeader::read(&mut cursor).unwrap();
        assert_eq!(read.kind, header.kind);
        assert_eq!(read.compression, header.compression);
        assert_eq!(read.uncompressed_size, header.uncompressed_size);
        assert_eq!(read.compressed_size, header.compressed_size);
        assert_eq!(read.data_size(), 3);
    }
}
