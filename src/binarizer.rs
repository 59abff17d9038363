//! The streaming writer: assembles a conformant binary gcode file from the
//! metadata blocks up front and gcode text appended in arbitrary slices.

use std::io::{Seek, Write};

use log::debug;

use crate::blocks::{GCodeBlock, MetadataBlock, ThumbnailBlock};
use crate::error::{BinaryGcodeError, Result};
use crate::file_header::FileHeader;
use crate::types::{
    BlockKind, ChecksumKind, CompressionAlgorithm, GCodeEncoding, MetadataEncoding,
};

/// How many bytes of gcode text are cached before a gcode block is
/// flushed.
pub const DEFAULT_GCODE_CACHE_SIZE: usize = 65536;

/// Per-section compression choices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionCompression {
    pub file_metadata: CompressionAlgorithm,
    pub printer_metadata: CompressionAlgorithm,
    pub print_metadata: CompressionAlgorithm,
    pub slicer_metadata: CompressionAlgorithm,
    pub gcode: CompressionAlgorithm,
}

/// The writer-side configuration of a binary gcode file.
#[derive(Debug, Clone, Copy)]
pub struct BinarizerConfig {
    pub compression: SectionCompression,
    pub gcode_encoding: GCodeEncoding,
    pub metadata_encoding: MetadataEncoding,
    pub checksum: ChecksumKind,
}

impl Default for BinarizerConfig {
    fn default() -> Self {
        Self {
            compression: SectionCompression::default(),
            gcode_encoding: GCodeEncoding::None,
            metadata_encoding: MetadataEncoding::Ini,
            checksum: ChecksumKind::Crc32,
        }
    }
}

impl BinarizerConfig {
    /// The profile whole-file conversion uses: slicer metadata deflated,
    /// gcode meatpacked with comments kept and heatshrunk with the larger
    /// window.
    pub fn conversion() -> Self {
        Self {
            compression: SectionCompression {
                file_metadata: CompressionAlgorithm::None,
                printer_metadata: CompressionAlgorithm::None,
                print_metadata: CompressionAlgorithm::None,
                slicer_metadata: CompressionAlgorithm::Deflate,
                gcode: CompressionAlgorithm::Heatshrink12_4,
            },
            gcode_encoding: GCodeEncoding::MeatPackComments,
            metadata_encoding: MetadataEncoding::Ini,
            checksum: ChecksumKind::Crc32,
        }
    }
}

/// Everything a file carries besides the gcode itself.
#[derive(Debug, Clone, Default)]
pub struct BinaryData {
    pub file_metadata: MetadataBlock,
    pub printer_metadata: MetadataBlock,
    pub thumbnails: Vec<ThumbnailBlock>,
    pub print_metadata: MetadataBlock,
    pub slicer_metadata: MetadataBlock,
}

/// Streaming writer over a seekable byte sink.
///
/// Lifecycle: populate [`BinaryData`], call `initialize` once, feed text
/// through `append_gcode`, then `finalize`. Any error leaves the stream at
/// an undefined position and the file must be considered corrupt.
#[derive(Debug)]
pub struct Binarizer<W: Write + Seek> {
    stream: W,
    config: BinarizerConfig,
    data: BinaryData,
    gcode_cache: String,
    gcode_cache_size: usize,
    gcode_blocks_written: usize,
    initialized: bool,
    finalized: bool,
}

impl<W: Write + Seek> Binarizer<W> {
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            config: BinarizerConfig::default(),
            data: BinaryData::default(),
            gcode_cache: String::new(),
            gcode_cache_size: DEFAULT_GCODE_CACHE_SIZE,
            gcode_blocks_written: 0,
            initialized: false,
            finalized: false,
        }
    }

    pub fn binary_data(&self) -> &BinaryData {
        &self.data
    }

    pub fn binary_data_mut(&mut self) -> &mut BinaryData {
        &mut self.data
    }

    pub fn gcode_cache_size(&self) -> usize {
        self.gcode_cache_size
    }

    pub fn set_gcode_cache_size(&mut self, size: usize) {
        self.gcode_cache_size = size;
    }

    /// Write the file header and every non-gcode block, in the order the
    /// format mandates. File metadata is elided when empty.
    pub fn initialize(&mut self, config: BinarizerConfig) -> Result<()> {
        if self.initialized {
            return Err(BinaryGcodeError::AlreadyBinarized);
        }
        self.config = config;

        FileHeader::new(config.checksum).write(&mut self.stream)?;

        if !self.data.file_metadata.is_empty() {
            self.data.file_metadata.write(
                &mut self.stream,
                BlockKind::FileMetadata,
                config.compression.file_metadata,
                config.checksum,
            )?;
        }
        self.data.printer_metadata.write(
            &mut self.stream,
            BlockKind::PrinterMetadata,
            config.compression.printer_metadata,
            config.checksum,
        )?;
        for thumbnail in &self.data.thumbnails {
            thumbnail.write(&mut self.stream, config.checksum)?;
        }
        self.data.print_metadata.write(
            &mut self.stream,
            BlockKind::PrintMetadata,
            config.compression.print_metadata,
            config.checksum,
        )?;
        self.data.slicer_metadata.write(
            &mut self.stream,
            BlockKind::SlicerMetadata,
            config.compression.slicer_metadata,
            config.checksum,
        )?;

        self.initialized = true;
        Ok(())
    }

    /// Buffer gcode text. Once the cache passes its limit, everything up
    /// to the last complete line is flushed as one gcode block and the
    /// partial tail is retained.
    pub fn append_gcode(&mut self, gcode: &str) -> Result<()> {
        if !self.initialized || self.finalized {
            return Err(BinaryGcodeError::InvalidSequenceOfBlocks);
        }
        self.gcode_cache.push_str(gcode);
        if self.gcode_cache.len() >= self.gcode_cache_size {
            if let Some(pos) = self.gcode_cache.rfind('\n') {
                let head: String = self.gcode_cache.drain(..=pos).collect();
                self.write_gcode_block(&head)?;
            }
        }
        Ok(())
    }

    /// Flush the remaining cached text, complete line or not. Calling
    /// finalize again afterwards is a no-op.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(BinaryGcodeError::InvalidSequenceOfBlocks);
        }
        if self.finalized {
            return Ok(());
        }
        // Every file carries at least one gcode block, even an empty one.
        if !self.gcode_cache.is_empty() || self.gcode_blocks_written == 0 {
            let tail = std::mem::take(&mut self.gcode_cache);
            self.write_gcode_block(&tail)?;
        }
        self.finalized = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.stream
    }

    fn write_gcode_block(&mut self, text: &str) -> Result<()> {
        let block = GCodeBlock {
            encoding: self.config.gcode_encoding,
            raw_data: text.to_string(),
        };
        block.write(
            &mut self.stream,
            self.config.compression.gcode,
            self.config.checksum,
        )?;
        self.gcode_blocks_written += 1;
        debug!(
            "flushed gcode block {} ({} bytes of text)",
            self.gcode_blocks_written,
            text.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traverse::{
        is_valid_binary_gcode, read_header, read_next_block_header,
        read_next_block_header_of_type, skip_block,
    };
    use crate::types::ThumbnailFormat;
    use std::io::Cursor;

    fn binarize(text: &str, config: BinarizerConfig) -> Cursor<Vec<u8>> {
        let mut binarizer = Binarizer::new(Cursor::new(Vec::new()));
        binarizer.initialize(config).unwrap();
        binarizer.append_gcode(text).unwrap();
        binarizer.finalize().unwrap();
        binarizer.into_inner()
    }

    #[test]
    fn empty_gcode_produces_a_minimal_valid_file() {
        let mut cursor = binarize("", BinarizerConfig::default());
        let mut scratch = [0u8; 2048];
        assert!(is_valid_binary_gcode(&mut cursor, true, Some(&mut scratch)).is_ok());

        // File header, three empty metadata blocks and one empty gcode
        // block, each 8 byte header + 2 byte params + 4 byte checksum.
        assert_eq!(cursor.get_ref().len(), 10 + 4 * 14);

        let file_header = read_header(&mut cursor, None).unwrap();
        let gcode = read_next_block_header_of_type(
            &mut cursor,
            &file_header,
            BlockKind::GCode,
            None,
        )
        .unwrap();
        assert_eq!(gcode.uncompressed_size, 0);
    }

    #[test]
    fn initialize_twice_is_already_binarized() {
        let mut binarizer = Binarizer::new(Cursor::new(Vec::new()));
        binarizer.initialize(BinarizerConfig::default()).unwrap();
        assert_eq!(
            binarizer.initialize(BinarizerConfig::default()),
            Err(BinaryGcodeError::AlreadyBinarized)
        );
    }

    #[test]
    fn append_before_initialize_is_out_of_sequence() {
        let mut binarizer = Binarizer::new(Cursor::new(Vec::new()));
        assert_eq!(
            binarizer.append_gcode("G28\n"),
            Err(BinaryGcodeError::InvalidSequenceOfBlocks)
        );
        assert_eq!(
            binarizer.finalize(),
            Err(BinaryGcodeError::InvalidSequenceOfBlocks)
        );
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut binarizer = Binarizer::new(Cursor::new(Vec::new()));
        binarizer.initialize(BinarizerConfig::default()).unwrap();
        binarizer.append_gcode("G28\n").unwrap();
        binarizer.finalize().unwrap();
        let size = binarizer.stream.get_ref().len();
        binarizer.finalize().unwrap();
        assert_eq!(binarizer.stream.get_ref().len(), size);
    }

    #[test]
    fn cache_splits_at_the_last_newline() {
        let mut binarizer = Binarizer::new(Cursor::new(Vec::new()));
        binarizer.set_gcode_cache_size(32);
        binarizer.initialize(BinarizerConfig::default()).unwrap();
        binarizer
            .append_gcode("G1 X0 Y0\nG1 X1 Y1\nG1 X2 Y2\nG1 X3")
            .unwrap();
        // The partial line stays cached.
        assert_eq!(binarizer.gcode_cache, "G1 X3");
        assert_eq!(binarizer.gcode_blocks_written, 1);
        binarizer.append_gcode(" Y3\n").unwrap();
        binarizer.finalize().unwrap();

        let mut cursor = binarizer.into_inner();
        let mut scratch = [0u8; 2048];
        assert!(is_valid_binary_gcode(&mut cursor, true, Some(&mut scratch)).is_ok());

        // Two gcode blocks: the split head and the finalize tail.
        let file_header = read_header(&mut cursor, None).unwrap();
        let mut gcode_blocks = 0;
        while let Ok(header) = read_next_block_header_of_type(
            &mut cursor,
            &file_header,
            BlockKind::GCode,
            None,
        ) {
            gcode_blocks += 1;
            skip_block(&mut cursor, &file_header, &header).unwrap();
        }
        assert_eq!(gcode_blocks, 2);
    }

    #[test]
    fn metadata_and_thumbnails_are_written_in_order() {
        let mut binarizer = Binarizer::new(Cursor::new(Vec::new()));
        let data = binarizer.binary_data_mut();
        data.file_metadata.entries.push((
            "Producer".to_string(),
            "PrusaSlicer 2.6.0".to_string(),
        ));
        data.printer_metadata
            .entries
            .push(("printer_model".to_string(), "MK4".to_string()));
        data.thumbnails.push(ThumbnailBlock {
            format: ThumbnailFormat::Qoi,
            width: 16,
            height: 16,
            data: vec![0xAB; 32],
        });
        data.print_metadata
            .entries
            .push(("estimated printing time".to_string(), "1h 2m".to_string()));
        data.slicer_metadata
            .entries
            .push(("layer_height".to_string(), "0.2".to_string()));

        binarizer.initialize(BinarizerConfig::conversion()).unwrap();
        binarizer.append_gcode("G28\nG1 X10 Y10\n").unwrap();
        binarizer.finalize().unwrap();

        let mut cursor = binarizer.into_inner();
        let mut scratch = [0u8; 2048];
        assert!(is_valid_binary_gcode(&mut cursor, true, Some(&mut scratch)).is_ok());

        let file_header = read_header(&mut cursor, None).unwrap();
        let mut kinds = Vec::new();
        let size = cursor.get_ref().len() as u64;
        while cursor.position() < size {
            let header = read_next_block_header(&mut cursor, &file_header, None).unwrap();
            kinds.push(header.kind);
            skip_block(&mut cursor, &file_header, &header).unwrap();
        }
        assert_eq!(
            kinds,
            vec![
                BlockKind::FileMetadata,
                BlockKind::PrinterMetadata,
                BlockKind::Thumbnail,
                BlockKind::PrintMetadata,
                BlockKind::SlicerMetadata,
                BlockKind::GCode,
            ]
        );
    }
}
