#![doc = include_str!("../README.md")]

mod binarizer;
mod block_header;
mod blocks;
mod checksum;
mod compress;
mod convert;
mod error;
mod file_header;
mod fio;
mod ini;
pub mod meatpack;
mod traverse;
mod types;

pub use binarizer::{
    BinaryData, Binarizer, BinarizerConfig, SectionCompression, DEFAULT_GCODE_CACHE_SIZE,
};
pub use block_header::BlockHeader;
pub use blocks::{Block, GCodeBlock, MetadataBlock, ThumbnailBlock};
pub use checksum::Checksum;
pub use convert::{from_ascii_to_binary, from_binary_to_ascii};
pub use error::{BinaryGcodeError, Result};
pub use file_header::FileHeader;
pub use traverse::{
    block_content_size, block_payload_size, is_valid_binary_gcode, read_header,
    read_next_block_header, read_next_block_header_of_type, skip_block, skip_block_content,
    verify_block_checksum,
};
pub use types::{
    BlockKind, ChecksumKind, CompressionAlgorithm, GCodeEncoding, MetadataEncoding,
    ThumbnailFormat, VERSION,
};
