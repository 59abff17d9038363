//! Compression adapters for block data: identity, zlib deflate and the two
//! heatshrink variants the format allows.

use embedded_heatshrink::{
    HSDFinishRes, HSDPollRes, HSDSinkRes, HSEFinishRes, HSEPollRes, HSESinkRes,
    HeatshrinkDecoder, HeatshrinkEncoder,
};
use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib_with_limit;

use crate::error::{BinaryGcodeError, Result};
use crate::types::CompressionAlgorithm;

/// Input chunk size for the heatshrink decoder's internal window buffer.
const HEATSHRINK_DECODE_BUFFER: u16 = 2048;

const DEFLATE_LEVEL: u8 = 6;

/// Compress `data` with the given algorithm. `CompressionAlgorithm::None`
/// is the identity.
pub(crate) fn compress(data: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Deflate => Ok(compress_to_vec_zlib(data, DEFLATE_LEVEL)),
        CompressionAlgorithm::Heatshrink11_4 => shrink(11, 4, data),
        CompressionAlgorithm::Heatshrink12_4 => shrink(12, 4, data),
    }
}

/// Uncompress `data` back into `uncompressed_size` bytes.
pub(crate) fn uncompress(
    data: &[u8],
    algorithm: CompressionAlgorithm,
    uncompressed_size: usize,
) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Deflate => decompress_to_vec_zlib_with_limit(data, uncompressed_size)
            .map_err(|_| BinaryGcodeError::DataUncompressionError),
        CompressionAlgorithm::Heatshrink11_4 => unshrink(11, 4, data, uncompressed_size),
        CompressionAlgorithm::Heatshrink12_4 => unshrink(12, 4, data, uncompressed_size),
    }
}

/// A wrapper around the heatshrink sink/poll loop used to compress gcode
/// and metadata.
fn shrink(window: u8, lookahead: u8, input: &[u8]) -> Result<Vec<u8>> {
    // The window/lookahead pairs are the two fixed profiles of the format,
    // construction cannot fail for them.
    let mut encoder = HeatshrinkEncoder::new(window, lookahead).unwrap();
    let mut sunk: usize = 0;
    let mut polled: usize = 0;

    // Incompressible data can grow a little, reserve a quarter on top.
    let mut output = vec![0u8; input.len() + input.len() / 4 + 64];

    // Keep looping until we have sunk all the input data.
    while sunk < input.len() {
        match encoder.sink(&input[sunk..]) {
            HSESinkRes::Ok(sz) => sunk += sz,
            _ => return Err(BinaryGcodeError::DataCompressionError),
        }
        // Drain the encoder before sinking the next slice.
        loop {
            match encoder.poll(&mut output[polled..]) {
                HSEPollRes::Empty(sz) => {
                    polled += sz;
                    if sz == 0 {
                        break;
                    }
                }
                HSEPollRes::More(sz) => polled += sz,
                _ => return Err(BinaryGcodeError::DataCompressionError),
            }
        }
    }

    // Flush whatever is still buffered inside the encoder.
    loop {
        match encoder.finish() {
            HSEFinishRes::Done => break,
            HSEFinishRes::More => match encoder.poll(&mut output[polled..]) {
                HSEPollRes::Empty(sz) | HSEPollRes::More(sz) => polled += sz,
                _ => return Err(BinaryGcodeError::DataCompressionError),
            },
            _ => return Err(BinaryGcodeError::DataCompressionError),
        }
    }

    output.truncate(polled);
    Ok(output)
}

/// The matching sink/poll loop for decoding. The expected output size is
/// known from the block header, so the output buffer is exact.
fn unshrink(
    window: u8,
    lookahead: u8,
    input: &[u8],
    uncompressed_size: usize,
) -> Result<Vec<u8>> {
    let mut decoder = HeatshrinkDecoder::new(HEATSHRINK_DECODE_BUFFER, window, lookahead).unwrap();
    let mut output = vec![0u8; uncompressed_size];
    let mut sunk: usize = 0;
    let mut polled: usize = 0;

    while sunk < input.len() {
        let polled_before = polled;
        let sunk_now = match decoder.sink(&input[sunk..]) {
            HSDSinkRes::Ok(sz) => sz,
            // The input buffer is full, poll below to make room.
            HSDSinkRes::Full => 0,
            HSDSinkRes::ErrorNull => return Err(BinaryGcodeError::DataUncompressionError),
        };
        sunk += sunk_now;
        loop {
            match decoder.poll(&mut output[polled..]) {
                HSDPollRes::Empty(sz) => {
                    polled += sz;
                    if sz == 0 {
                        break;
                    }
                }
                HSDPollRes::More(sz) => {
                    polled += sz;
                    if polled == output.len() {
                        break;
                    }
                }
                _ => return Err(BinaryGcodeError::DataUncompressionError),
            }
        }
        // A full input buffer that also yields no output means the stream
        // does not fit the declared uncompressed size.
        if sunk_now == 0 && polled == polled_before {
            return Err(BinaryGcodeError::DataUncompressionError);
        }
    }

    loop {
        match decoder.finish() {
            HSDFinishRes::Done => break,
            HSDFinishRes::More => match decoder.poll(&mut output[polled..]) {
                HSDPollRes::Empty(sz) | HSDPollRes::More(sz) => {
                    polled += sz;
                    if sz == 0 {
                        break;
                    }
                }
                _ => return Err(BinaryGcodeError::DataUncompressionError),
            },
            HSDFinishRes::ErrorNull => return Err(BinaryGcodeError::DataUncompressionError),
        }
    }

    if polled != uncompressed_size {
        return Err(BinaryGcodeError::DataUncompressionError);
    }
    Ok(output)
}
