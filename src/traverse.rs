//! Sequential traversal of a binary gcode stream: validation, block header
//! reads, checksum verification and skipping. The stream position is the
//! only state these operations touch, and each documents where it leaves
//! it.

use std::io::{Read, Seek, SeekFrom};

use crate::block_header::BlockHeader;
use crate::checksum::Checksum;
use crate::error::{BinaryGcodeError, Result};
use crate::file_header::FileHeader;
use crate::fio;
use crate::types::{BlockKind, ChecksumKind, MAGIC};

/// Size of the payload (parameters + data) of the block with the given
/// header, in bytes.
pub fn block_payload_size(block_header: &BlockHeader) -> u64 {
    block_header.kind.parameter_byte_size() + block_header.data_size()
}

/// Size of the content (parameters + data + checksum) of the block with
/// the given header, in bytes.
pub fn block_content_size(file_header: &FileHeader, block_header: &BlockHeader) -> u64 {
    block_payload_size(block_header) + file_header.checksum.checksum_byte_size()
}

/// Rewind and read the file header. On success the position is at the
/// start of the first block header.
pub fn read_header<R: Read + Seek>(
    reader: &mut R,
    max_version: Option<u32>,
) -> Result<FileHeader> {
    fio::seek(reader, SeekFrom::Start(0))?;
    FileHeader::read(reader, max_version)
}

/// Recompute the checksum of the block with the given header and compare
/// it against the stored one, streaming the payload through `scratch`
/// sized reads. A bigger scratch buffer means fewer reads.
///
/// On success the position is at the start of the next block header.
pub fn verify_block_checksum<R: Read + Seek>(
    reader: &mut R,
    file_header: &FileHeader,
    block_header: &BlockHeader,
    scratch: &mut [u8],
) -> Result<()> {
    if scratch.is_empty() {
        return Err(BinaryGcodeError::InvalidBuffer);
    }
    // Nothing stored, nothing to check.
    if file_header.checksum == ChecksumKind::None {
        return Ok(());
    }

    fio::seek(
        reader,
        SeekFrom::Start(block_header.position() + block_header.size()),
    )?;

    let mut current = Checksum::new(file_header.checksum);
    block_header.update_checksum(&mut current);

    let mut remaining = block_payload_size(block_header);
    while remaining > 0 {
        let take = remaining.min(scratch.len() as u64) as usize;
        fio::read_exact(reader, &mut scratch[..take])?;
        current.append(&scratch[..take]);
        remaining -= take as u64;
    }

    let mut stored = Checksum::new(file_header.checksum);
    stored.read(reader)?;
    if !current.matches(&stored) {
        return Err(BinaryGcodeError::InvalidChecksum);
    }
    Ok(())
}

/// Read the block header at the current position. When a scratch buffer is
/// supplied the block checksum is verified as well, and the position is
/// returned to the start of the block parameters afterwards.
pub fn read_next_block_header<R: Read + Seek>(
    reader: &mut R,
    file_header: &FileHeader,
    mut scratch: Option<&mut [u8]>,
) -> Result<BlockHeader> {
    let block_header = BlockHeader::read(reader)?;
    if let Some(scratch) = scratch.take() {
        verify_block_checksum(reader, file_header, &block_header, scratch)?;
        fio::seek(
            reader,
            SeekFrom::Start(block_header.position() + block_header.size()),
        )?;
    }
    Ok(block_header)
}

/// Walk forward from the current position until a block of the given kind
/// is found. On success the position is at the start of that block's
/// parameters; on any failure, `BlockNotFound` included, the position is
/// restored to its value at entry.
pub fn read_next_block_header_of_type<R: Read + Seek>(
    reader: &mut R,
    file_header: &FileHeader,
    kind: BlockKind,
    scratch: Option<&mut [u8]>,
) -> Result<BlockHeader> {
    let entry_position = fio::tell(reader)?;
    let result = find_block(reader, file_header, kind, scratch);
    if result.is_err() {
        fio::seek(reader, SeekFrom::Start(entry_position))?;
    }
    result
}

fn find_block<R: Read + Seek>(
    reader: &mut R,
    file_header: &FileHeader,
    kind: BlockKind,
    mut scratch: Option<&mut [u8]>,
) -> Result<BlockHeader> {
    let size = fio::stream_size(reader)?;
    loop {
        if fio::tell(reader)? == size {
            return Err(BinaryGcodeError::BlockNotFound);
        }
        let block_header = BlockHeader::read(reader)?;
        if block_header.kind == kind {
            if let Some(scratch) = scratch.take() {
                verify_block_checksum(reader, file_header, &block_header, scratch)?;
                fio::seek(
                    reader,
                    SeekFrom::Start(block_header.position() + block_header.size()),
                )?;
            }
            return Ok(block_header);
        }
        skip_block(reader, file_header, &block_header)?;
    }
}

/// Skip the whole block with the given header. The header must have been
/// read or written at its recorded position. Leaves the position at the
/// start of the next block header.
pub fn skip_block<S: Seek>(
    stream: &mut S,
    file_header: &FileHeader,
    block_header: &BlockHeader,
) -> Result<()> {
    fio::seek(
        stream,
        SeekFrom::Start(
            block_header.position()
                + block_header.size()
                + block_content_size(file_header, block_header),
        ),
    )?;
    Ok(())
}

/// Skip the content (parameters + data + checksum) of a block. The
/// position must be at the start of the block parameters.
pub fn skip_block_content<S: Seek>(
    stream: &mut S,
    file_header: &FileHeader,
    block_header: &BlockHeader,
) -> Result<()> {
    fio::seek(
        stream,
        SeekFrom::Current(block_content_size(file_header, block_header) as i64),
    )?;
    Ok(())
}

/// Check that the stream holds a binary gcode file. With `check_contents`
/// the whole block sequence is walked and, if a scratch buffer is given,
/// every block checksum is verified. The position is restored on every
/// path out.
pub fn is_valid_binary_gcode<R: Read + Seek>(
    reader: &mut R,
    check_contents: bool,
    scratch: Option<&mut [u8]>,
) -> Result<()> {
    let entry_position = fio::tell(reader)?;
    let result = validate(reader, check_contents, scratch);
    fio::seek(reader, SeekFrom::Start(entry_position))?;
    result
}

fn validate<R: Read + Seek>(
    reader: &mut R,
    check_contents: bool,
    mut scratch: Option<&mut [u8]>,
) -> Result<()> {
    fio::seek(reader, SeekFrom::Start(0))?;
    let mut magic = [0u8; 4];
    fio::read_exact(reader, &mut magic)?;
    if u32::from_le_bytes(magic) != MAGIC {
        return Err(BinaryGcodeError::InvalidMagicNumber);
    }
    if !check_contents {
        return Ok(());
    }

    let size = fio::stream_size(reader)?;
    let file_header = read_header(reader, None)?;

    // File metadata is the one optional block at the front.
    let mut block_header =
        read_next_block_header(reader, &file_header, scratch.as_deref_mut())?;
    if block_header.kind != BlockKind::FileMetadata
        && block_header.kind != BlockKind::PrinterMetadata
    {
        return Err(BinaryGcodeError::InvalidBlockType);
    }
    if block_header.kind == BlockKind::FileMetadata {
        skip_block(reader, &file_header, &block_header)?;
        block_header = read_next_block_header(reader, &file_header, scratch.as_deref_mut())?;
    }
    if block_header.kind != BlockKind::PrinterMetadata {
        return Err(BinaryGcodeError::InvalidBlockType);
    }

    // Zero or more thumbnails.
    skip_block(reader, &file_header, &block_header)?;
    block_header = read_next_block_header(reader, &file_header, scratch.as_deref_mut())?;
    while block_header.kind == BlockKind::Thumbnail {
        skip_block(reader, &file_header, &block_header)?;
        block_header = read_next_block_header(reader, &file_header, scratch.as_deref_mut())?;
    }

    if block_header.kind != BlockKind::PrintMetadata {
        return Err(BinaryGcodeError::InvalidBlockType);
    }
    skip_block(reader, &file_header, &block_header)?;
    block_header = read_next_block_header(reader, &file_header, scratch.as_deref_mut())?;
    if block_header.kind != BlockKind::SlicerMetadata {
        return Err(BinaryGcodeError::InvalidBlockType);
    }

    // The rest of the file is gcode blocks.
    loop {
        skip_block(reader, &file_header, &block_header)?;
        if fio::tell(reader)? == size {
            break;
        }
        block_header = read_next_block_header(reader, &file_header, scratch.as_deref_mut())?;
        if block_header.kind != BlockKind::GCode {
            return Err(BinaryGcodeError::InvalidBlockType);
        }
    }
    Ok(())
}
