use crate::error::{BinaryGcodeError, Result};

/// A pre-defined value in the specification as part of the file header
/// defined in its u32 form.
/// ['G', 'C', 'D', 'E'] -> [u8; 4] -> u32
pub(crate) const MAGIC: u32 = 1162101575;

/// Highest binary gcode file version this crate understands.
pub const VERSION: u32 = 1;

/// Defines the various kinds of block that are in the binary gcode
/// specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    FileMetadata,
    GCode,
    SlicerMetadata,
    PrinterMetadata,
    PrintMetadata,
    Thumbnail,
}

impl BlockKind {
    /// Return a BlockKind based on a u16.
    pub const fn new(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::FileMetadata),
            1 => Ok(Self::GCode),
            2 => Ok(Self::SlicerMetadata),
            3 => Ok(Self::PrinterMetadata),
            4 => Ok(Self::PrintMetadata),
            5 => Ok(Self::Thumbnail),
            _ => Err(BinaryGcodeError::InvalidBlockType),
        }
    }

    pub const fn to_u16(&self) -> u16 {
        match *self {
            Self::FileMetadata => 0,
            Self::GCode => 1,
            Self::SlicerMetadata => 2,
            Self::PrinterMetadata => 3,
            Self::PrintMetadata => 4,
            Self::Thumbnail => 5,
        }
    }

    /// Returns the binary representation of the block kind.
    pub const fn to_le_bytes(&self) -> [u8; 2] {
        self.to_u16().to_le_bytes()
    }

    /// Return the byte size of the parameters that precede this kind of
    /// block's data.
    pub const fn parameter_byte_size(&self) -> u64 {
        match *self {
            Self::Thumbnail => 6, // format, width, height
            _ => 2,               // encoding
        }
    }
}

/// Defines the various compression algorithms used in binary gcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionAlgorithm {
    #[default]
    None,
    Deflate,        // ZLib encoded version.
    Heatshrink11_4, // Window + Lookahead
    Heatshrink12_4,
}

impl CompressionAlgorithm {
    /// Return a compression enum based on a u16.
    pub const fn new(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Deflate),
            2 => Ok(Self::Heatshrink11_4),
            3 => Ok(Self::Heatshrink12_4),
            _ => Err(BinaryGcodeError::InvalidCompressionType),
        }
    }

    pub const fn to_u16(&self) -> u16 {
        match *self {
            Self::None => 0,
            Self::Deflate => 1,
            Self::Heatshrink11_4 => 2,
            Self::Heatshrink12_4 => 3,
        }
    }

    /// Return the binary representation of the compression algorithm.
    pub const fn to_le_bytes(&self) -> [u8; 2] {
        self.to_u16().to_le_bytes()
    }
}

/// The valid checksums for the binary gcode format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    None,
    Crc32,
}

impl ChecksumKind {
    pub const fn new(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Crc32),
            _ => Err(BinaryGcodeError::InvalidChecksumType),
        }
    }

    pub const fn to_u16(&self) -> u16 {
        match *self {
            Self::None => 0,
            Self::Crc32 => 1,
        }
    }

    pub const fn to_le_bytes(&self) -> [u8; 2] {
        self.to_u16().to_le_bytes()
    }

    /// The number of bytes a checksum of this kind occupies on disk.
    pub const fn checksum_byte_size(&self) -> u64 {
        match *self {
            Self::None => 0,
            Self::Crc32 => 4,
        }
    }
}

/// The encodings a metadata block's key/value data can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataEncoding {
    #[default]
    Ini,
}

impl MetadataEncoding {
    pub const fn new(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::Ini),
            _ => Err(BinaryGcodeError::InvalidMetadataEncodingType),
        }
    }

    pub const fn to_u16(&self) -> u16 {
        match *self {
            Self::Ini => 0,
        }
    }

    pub const fn to_le_bytes(&self) -> [u8; 2] {
        self.to_u16().to_le_bytes()
    }
}

/// The encodings a gcode block's text can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GCodeEncoding {
    None,
    MeatPack,
    MeatPackComments,
}

impl GCodeEncoding {
    pub const fn new(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::MeatPack),
            2 => Ok(Self::MeatPackComments),
            _ => Err(BinaryGcodeError::InvalidGCodeEncodingType),
        }
    }

    pub const fn to_u16(&self) -> u16 {
        match *self {
            Self::None => 0,
            Self::MeatPack => 1,
            Self::MeatPackComments => 2,
        }
    }

    pub const fn to_le_bytes(&self) -> [u8; 2] {
        self.to_u16().to_le_bytes()
    }
}

/// The image formats a thumbnail block can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    Png,
    Jpg,
    Qoi,
}

impl ThumbnailFormat {
    pub const fn new(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::Png),
            1 => Ok(Self::Jpg),
            2 => Ok(Self::Qoi),
            _ => Err(BinaryGcodeError::InvalidThumbnailFormat),
        }
    }

    pub const fn to_u16(&self) -> u16 {
        match *self {
            Self::Png => 0,
            Self::Jpg => 1,
            Self::Qoi => 2,
        }
    }

    pub const fn to_le_bytes(&self) -> [u8; 2] {
        self.to_u16().to_le_bytes()
    }
}
