//! Whole-file conversion between ascii and binary gcode.
//!
//! Going to binary, the slicer conventions embedded in ascii files are
//! harvested into their block forms: the producer line, the printer and
//! config comment sections and any base64 thumbnail sections. Sections
//! that are absent simply leave their blocks empty.

use std::io::{Read, Seek, SeekFrom, Write};

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use log::debug;
use regex::Regex;

use crate::binarizer::{BinaryData, Binarizer, BinarizerConfig};
use crate::blocks::{GCodeBlock, ThumbnailBlock};
use crate::error::{BinaryGcodeError, Result};
use crate::fio;
use crate::traverse::{read_header, read_next_block_header, skip_block_content};
use crate::types::{BlockKind, ThumbnailFormat, MAGIC, VERSION};

/// Scratch buffer size used for checksum verification while converting.
const CHECKSUM_SCRATCH_SIZE: usize = 2048;

/// Convert an ascii gcode stream into a binary one.
pub fn from_ascii_to_binary<R, W>(
    src: &mut R,
    dst: &mut W,
    config: BinarizerConfig,
) -> Result<()>
where
    R: Read + Seek,
    W: Write + Seek,
{
    fio::seek(src, SeekFrom::Start(0))?;
    let mut raw = Vec::new();
    src.read_to_end(&mut raw)
        .map_err(|_| BinaryGcodeError::ReadError)?;
    if raw.len() >= 4 && raw[..4] == MAGIC.to_le_bytes() {
        return Err(BinaryGcodeError::AlreadyBinarized);
    }
    let ascii = String::from_utf8(raw).map_err(|_| BinaryGcodeError::InvalidAsciiGCodeFile)?;

    let mut binarizer = Binarizer::new(dst);
    harvest_metadata(&ascii, binarizer.binary_data_mut())?;
    harvest_thumbnails(&ascii, binarizer.binary_data_mut())?;
    binarizer.initialize(config)?;

    // Feed the text line by line. Thumbnail comment sections became
    // thumbnail blocks above and are left out of the gcode itself.
    let mut in_thumbnail = false;
    for line in ascii.split_inclusive('\n') {
        if in_thumbnail {
            if is_thumbnail_marker(line, "end") {
                in_thumbnail = false;
            }
            continue;
        }
        if is_thumbnail_marker(line, "begin") {
            in_thumbnail = true;
            continue;
        }
        binarizer.append_gcode(line)?;
    }
    binarizer.finalize()?;
    debug!("converted {} bytes of ascii gcode", ascii.len());
    Ok(())
}

/// Convert a binary gcode stream back into ascii. Only the gcode blocks
/// contribute to the output, every other block kind is skipped. With
/// `verify_checksum` each block's checksum is verified before decoding.
pub fn from_binary_to_ascii<R, W>(src: &mut R, dst: &mut W, verify_checksum: bool) -> Result<()>
where
    R: Read + Seek,
    W: Write,
{
    let file_header = read_header(src, Some(VERSION)).map_err(|e| match e {
        BinaryGcodeError::InvalidMagicNumber => BinaryGcodeError::InvalidBinaryGCodeFile,
        other => other,
    })?;

    let size = fio::stream_size(src)?;
    let mut scratch = [0u8; CHECKSUM_SCRATCH_SIZE];
    let mut gcode_bytes = 0usize;
    while fio::tell(src)? < size {
        let scratch = verify_checksum.then_some(&mut scratch[..]);
        let block_header = read_next_block_header(src, &file_header, scratch)?;
        match block_header.kind {
            BlockKind::GCode => {
                let block = GCodeBlock::read_data(src, &file_header, &block_header)?;
                fio::write_all(dst, block.raw_data.as_bytes())?;
                gcode_bytes += block.raw_data.len();
            }
            _ => skip_block_content(src, &file_header, &block_header)?,
        }
    }
    debug!("recovered {gcode_bytes} bytes of ascii gcode");
    Ok(())
}

fn is_thumbnail_marker(line: &str, marker: &str) -> bool {
    line.starts_with("; thumbnail") && line.contains(marker)
}

/// A `; key = value` comment line.
fn parse_comment_pair(line: &str) -> Option<(String, String)> {
    let body = line.strip_prefix(';')?;
    let (key, value) = body.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

fn harvest_metadata(ascii: &str, data: &mut BinaryData) -> Result<()> {
    // The producer line becomes the file metadata block.
    for line in ascii.lines() {
        if let Some(producer) = line.strip_prefix("; generated by ") {
            data.file_metadata
                .entries
                .push(("Producer".to_string(), producer.trim().to_string()));
            break;
        }
    }

    // Consecutive key/value comments starting at the printer model.
    if let Some(start) = ascii.find("; printer_model") {
        for line in ascii[start..].lines() {
            if line.starts_with("; prusaslicer_config") {
                break;
            }
            match parse_comment_pair(line) {
                Some(pair) => data.printer_metadata.entries.push(pair),
                None => break,
            }
        }
    }

    // Print statistics live in their own comment lines.
    for line in ascii.lines() {
        if line.starts_with("; estimated printing time") || line.starts_with("; filament used")
        {
            if let Some(pair) = parse_comment_pair(line) {
                data.print_metadata.entries.push(pair);
            }
        }
    }

    // The full slicer configuration section.
    if let Some(start) = ascii.find("; prusaslicer_config = begin") {
        let mut terminated = false;
        for line in ascii[start..].lines().skip(1) {
            if line.starts_with("; prusaslicer_config = end") {
                terminated = true;
                break;
            }
            if let Some(pair) = parse_comment_pair(line) {
                data.slicer_metadata.entries.push(pair);
            }
        }
        if !terminated {
            return Err(BinaryGcodeError::InvalidAsciiGCodeFile);
        }
    }

    Ok(())
}

/// Pull `; thumbnail[_JPG|_QOI] begin WxH N ... ; thumbnail end` sections
/// out of the comments and decode their base64 payloads.
fn harvest_thumbnails(ascii: &str, data: &mut BinaryData) -> Result<()> {
    let dimensions = Regex::new(r"\s(\d+)x(\d+)\s").unwrap();

    let mut rest = ascii;
    while let Some(start) = rest.find("; thumbnail") {
        let section = &rest[start..];
        let header_end = section
            .find('\n')
            .ok_or(BinaryGcodeError::InvalidAsciiGCodeFile)?;
        let header = &section[..header_end];
        if !header.contains("begin") {
            rest = &section[header_end..];
            continue;
        }

        let format = if header.contains("thumbnail_QOI") {
            ThumbnailFormat::Qoi
        } else if header.contains("thumbnail_JPG") {
            ThumbnailFormat::Jpg
        } else {
            ThumbnailFormat::Png
        };
        let caps = dimensions
            .captures(header)
            .ok_or(BinaryGcodeError::InvalidAsciiGCodeFile)?;
        let width: u16 = caps[1]
            .parse()
            .map_err(|_| BinaryGcodeError::InvalidAsciiGCodeFile)?;
        let height: u16 = caps[2]
            .parse()
            .map_err(|_| BinaryGcodeError::InvalidAsciiGCodeFile)?;

        let body_start = header_end + 1;
        let body_len = section[body_start..]
            .find("; thumbnail")
            .ok_or(BinaryGcodeError::InvalidAsciiGCodeFile)?;
        let end_line = &section[body_start + body_len..];
        if !end_line.starts_with("; thumbnail") || !end_line[..end_line.find('\n').unwrap_or(end_line.len())].contains("end") {
            return Err(BinaryGcodeError::InvalidAsciiGCodeFile);
        }

        let mut base64_payload = String::new();
        for line in section[body_start..body_start + body_len].lines() {
            base64_payload.push_str(line.trim_start_matches(';').trim());
        }
        let bytes = BASE64_STANDARD
            .decode(base64_payload.as_bytes())
            .map_err(|_| BinaryGcodeError::InvalidAsciiGCodeFile)?;

        data.thumbnails.push(ThumbnailBlock {
            format,
            width,
            height,
            data: bytes,
        });

        let next = body_start + body_len + end_line.find('\n').map_or(end_line.len(), |i| i + 1);
        rest = &section[next.min(section.len())..];
    }
    Ok(())
}
