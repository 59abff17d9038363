//! Exact-size reads and writes over a byte stream, plus the little-endian
//! integer forms every multi-byte field of the format uses on disk.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{BinaryGcodeError, Result};

/// Fill `buf` completely or fail. A short read is a read error, the format
/// has no optional trailing bytes inside a record.
pub(crate) fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader
        .read_exact(buf)
        .map_err(|_| BinaryGcodeError::ReadError)
}

pub(crate) fn write_all<W: Write>(writer: &mut W, buf: &[u8]) -> Result<()> {
    writer
        .write_all(buf)
        .map_err(|_| BinaryGcodeError::WriteError)
}

pub(crate) fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    let mut bytes = [0u8; 2];
    read_exact(reader, &mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

pub(crate) fn write_u16<W: Write>(writer: &mut W, value: u16) -> Result<()> {
    write_all(writer, &value.to_le_bytes())
}

pub(crate) fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    write_all(writer, &value.to_le_bytes())
}

pub(crate) fn tell<S: Seek>(stream: &mut S) -> Result<u64> {
    stream
        .stream_position()
        .map_err(|_| BinaryGcodeError::ReadError)
}

pub(crate) fn seek<S: Seek>(stream: &mut S, pos: SeekFrom) -> Result<u64> {
    stream.seek(pos).map_err(|_| BinaryGcodeError::ReadError)
}

/// Byte size of the stream, with the current position preserved.
pub(crate) fn stream_size<S: Seek>(stream: &mut S) -> Result<u64> {
    let pos = tell(stream)?;
    let size = seek(stream, SeekFrom::End(0))?;
    seek(stream, SeekFrom::Start(pos))?;
    Ok(size)
}
