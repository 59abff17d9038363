//! The typed block payloads: key/value metadata, thumbnails and gcode.
//!
//! Writing serialises the payload (encode, compress, header, params, data,
//! checksum). Reading mirrors it and expects the stream position at the
//! start of the block parameters, i.e. just past the block header; on
//! success the position is at the start of the next block.

use std::io::{Read, Seek, Write};

use crate::block_header::BlockHeader;
use crate::checksum::Checksum;
use crate::compress;
use crate::error::{BinaryGcodeError, Result};
use crate::file_header::FileHeader;
use crate::fio;
use crate::ini;
use crate::meatpack;
use crate::types::{
    BlockKind, ChecksumKind, CompressionAlgorithm, GCodeEncoding, MetadataEncoding,
    ThumbnailFormat,
};

/// Serialise one block: header, params, data (compressed as requested) and
/// the checksum over all of the above in on-disk order.
fn write_block<W: Write + Seek>(
    writer: &mut W,
    kind: BlockKind,
    compression: CompressionAlgorithm,
    checksum_kind: ChecksumKind,
    params: &[u8],
    data: &[u8],
) -> Result<()> {
    let stored = compress::compress(data, compression)?;
    let mut header =
        BlockHeader::new(kind, compression, data.len() as u32, stored.len() as u32);
    header.write(writer)?;
    fio::write_all(writer, params)?;
    fio::write_all(writer, &stored)?;

    if checksum_kind != ChecksumKind::None {
        let mut checksum = Checksum::new(checksum_kind);
        header.update_checksum(&mut checksum);
        checksum.append(params);
        checksum.append(&stored);
        checksum.write(writer)?;
    }
    Ok(())
}

/// Read and uncompress the data section of a block, then consume the
/// trailing checksum bytes so the position lands on the next block.
/// Verification is the traversal layer's job, not repeated here.
fn read_block_data<R: Read + Seek>(
    reader: &mut R,
    file_header: &FileHeader,
    block_header: &BlockHeader,
) -> Result<Vec<u8>> {
    let mut stored = vec![0u8; block_header.data_size() as usize];
    fio::read_exact(reader, &mut stored)?;
    let data = compress::uncompress(
        &stored,
        block_header.compression,
        block_header.uncompressed_size as usize,
    )?;
    let mut checksum = Checksum::new(file_header.checksum);
    checksum.read(reader)?;
    Ok(data)
}

/// Key/value metadata payload, shared by the file, printer, print and
/// slicer metadata block kinds.
#[derive(Debug, Clone, Default)]
pub struct MetadataBlock {
    pub encoding: MetadataEncoding,
    pub entries: Vec<(String, String)>,
}

impl MetadataBlock {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut W,
        kind: BlockKind,
        compression: CompressionAlgorithm,
        checksum_kind: ChecksumKind,
    ) -> Result<()> {
        let data = ini::encode(&self.entries)?;
        write_block(
            writer,
            kind,
            compression,
            checksum_kind,
            &self.encoding.to_le_bytes(),
            &data,
        )
    }

    pub fn read_data<R: Read + Seek>(
        reader: &mut R,
        file_header: &FileHeader,
        block_header: &BlockHeader,
    ) -> Result<Self> {
        let encoding = MetadataEncoding::new(fio::read_u16(reader)?)?;
        let data = read_block_data(reader, file_header, block_header)?;
        let entries = ini::decode(&data)?;
        Ok(Self { encoding, entries })
    }
}

/// A preview image. Thumbnail data is stored as-is: the image formats are
/// already compressed, so the block is never wrapped in a second layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailBlock {
    pub format: ThumbnailFormat,
    pub width: u16,
    pub height: u16,
    pub data: Vec<u8>,
}

impl ThumbnailBlock {
    fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(BinaryGcodeError::InvalidThumbnailWidth);
        }
        if self.height == 0 {
            return Err(BinaryGcodeError::InvalidThumbnailHeight);
        }
        if self.data.is_empty() {
            return Err(BinaryGcodeError::InvalidThumbnailDataSize);
        }
        Ok(())
    }

    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut W,
        checksum_kind: ChecksumKind,
    ) -> Result<()> {
        self.validate()?;
        let mut params = Vec::with_capacity(6);
        params.extend_from_slice(&self.format.to_le_bytes());
        params.extend_from_slice(&self.width.to_le_bytes());
        params.extend_from_slice(&self.height.to_le_bytes());
        write_block(
            writer,
            BlockKind::Thumbnail,
            CompressionAlgorithm::None,
            checksum_kind,
            &params,
            &self.data,
        )
    }

    pub fn read_data<R: Read + Seek>(
        reader: &mut R,
        file_header: &FileHeader,
        block_header: &BlockHeader,
    ) -> Result<Self> {
        let format = ThumbnailFormat::new(fio::read_u16(reader)?)?;
        let width = fio::read_u16(reader)?;
        if width == 0 {
            return Err(BinaryGcodeError::InvalidThumbnailWidth);
        }
        let height = fio::read_u16(reader)?;
        if height == 0 {
            return Err(BinaryGcodeError::InvalidThumbnailHeight);
        }
        if block_header.uncompressed_size == 0 {
            return Err(BinaryGcodeError::InvalidThumbnailDataSize);
        }
        let data = read_block_data(reader, file_header, block_header)?;
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }
}

/// A chunk of gcode text, stored plain or meatpacked.
#[derive(Debug, Clone)]
pub struct GCodeBlock {
    pub encoding: GCodeEncoding,
    pub raw_data: String,
}

impl GCodeBlock {
    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut W,
        compression: CompressionAlgorithm,
        checksum_kind: ChecksumKind,
    ) -> Result<()> {
        let data = match self.encoding {
            GCodeEncoding::None => self.raw_data.as_bytes().to_vec(),
            GCodeEncoding::MeatPack => meatpack::pack(
                &self.raw_data,
                meatpack::FLAG_OMIT_WHITESPACES | meatpack::FLAG_REMOVE_COMMENTS,
            ),
            GCodeEncoding::MeatPackComments => {
                meatpack::pack(&self.raw_data, meatpack::FLAG_OMIT_WHITESPACES)
            }
        };
        write_block(
            writer,
            BlockKind::GCode,
            compression,
            checksum_kind,
            &self.encoding.to_le_bytes(),
            &data,
        )
    }

    pub fn read_data<R: Read + Seek>(
        reader: &mut R,
        file_header: &FileHeader,
        block_header: &BlockHeader,
    ) -> Result<Self> {
        let encoding = GCodeEncoding::new(fio::read_u16(reader)?)?;
        let data = read_block_data(reader, file_header, block_header)?;
        let text = match encoding {
            GCodeEncoding::None => data,
            GCodeEncoding::MeatPack | GCodeEncoding::MeatPackComments => {
                meatpack::unpack(&data)?
            }
        };
        let raw_data =
            String::from_utf8(text).map_err(|_| BinaryGcodeError::GCodeDecodingError)?;
        Ok(Self { encoding, raw_data })
    }
}

/// Any fully decoded block, tagged by its kind.
#[derive(Debug, Clone)]
pub enum Block {
    FileMetadata(MetadataBlock),
    PrinterMetadata(MetadataBlock),
    PrintMetadata(MetadataBlock),
    SlicerMetadata(MetadataBlock),
    Thumbnail(ThumbnailBlock),
    GCode(GCodeBlock),
}

impl Block {
    /// Decode the block the given header describes. Position rules are
    /// those of the payload `read_data` methods.
    pub fn read_data<R: Read + Seek>(
        reader: &mut R,
        file_header: &FileHeader,
        block_header: &BlockHeader,
    ) -> Result<Self> {
        let block = match block_header.kind {
            BlockKind::FileMetadata => Self::FileMetadata(MetadataBlock::read_data(
                reader,
                file_header,
                block_header,
            )?),
            BlockKind::PrinterMetadata => Self::PrinterMetadata(MetadataBlock::read_data(
                reader,
                file_header,
                block_header,
            )?),
            BlockKind::PrintMetadata => Self::PrintMetadata(MetadataBlock::read_data(
                reader,
                file_header,
                block_header,
            )?),
            BlockKind::SlicerMetadata => Self::SlicerMetadata(MetadataBlock::read_data(
                reader,
                file_header,
                block_header,
            )?),
            BlockKind::Thumbnail => Self::Thumbnail(ThumbnailBlock::read_data(
                reader,
                file_header,
                block_header,
            )?),
            BlockKind::GCode => {
                Self::GCode(GCodeBlock::read_data(reader, file_header, block_header)?)
            }
        };
        Ok(block)
    }
}
