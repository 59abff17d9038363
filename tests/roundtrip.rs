//! Whole-file round trips: binarize, validate, traverse and convert back.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Write};

use bgcode::{
    from_ascii_to_binary, from_binary_to_ascii, is_valid_binary_gcode, read_header,
    read_next_block_header_of_type, BinaryGcodeError, Binarizer, BinarizerConfig, BlockKind,
    ChecksumKind, CompressionAlgorithm, GCodeEncoding,
};

/// Gcode that is a fixed point of the meatpack normalisation: uppercase
/// movement lines with single spaces ahead of each parameter.
const CANONICAL: &str = "\
; generated by integration test
G28
G1 X93.378 Y56.417 E0.19034 F3000
G1 X94.131 Y55.609 E0.12034
M104 S215
M140 S60
G1 X95.2 Y55.0 E0.1
";

fn binarize(text: &str, config: BinarizerConfig) -> Cursor<Vec<u8>> {
    let mut binarizer = Binarizer::new(Cursor::new(Vec::new()));
    binarizer
        .binary_data_mut()
        .printer_metadata
        .entries
        .push(("printer_model".to_string(), "MK4".to_string()));
    binarizer.initialize(config).unwrap();
    binarizer.append_gcode(text).unwrap();
    binarizer.finalize().unwrap();
    binarizer.into_inner()
}

fn to_ascii(binary: &mut Cursor<Vec<u8>>) -> String {
    binary.set_position(0);
    let mut out = Vec::new();
    from_binary_to_ascii(binary, &mut out, true).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn round_trip_across_compression_and_encoding() {
    let combos = [
        (CompressionAlgorithm::None, GCodeEncoding::None),
        (CompressionAlgorithm::Deflate, GCodeEncoding::MeatPackComments),
        (
            CompressionAlgorithm::Heatshrink11_4,
            GCodeEncoding::MeatPackComments,
        ),
        (
            CompressionAlgorithm::Heatshrink12_4,
            GCodeEncoding::MeatPackComments,
        ),
    ];
    for (compression, encoding) in combos {
        let mut config = BinarizerConfig::default();
        config.compression.gcode = compression;
        config.gcode_encoding = encoding;

        let mut binary = binarize(CANONICAL, config);
        let mut scratch = [0u8; 2048];
        is_valid_binary_gcode(&mut binary, true, Some(&mut scratch)).unwrap();
        assert_eq!(to_ascii(&mut binary), CANONICAL, "{compression:?}");
    }
}

#[test]
fn meatpack_without_comments_drops_them() {
    let mut config = BinarizerConfig::default();
    config.gcode_encoding = GCodeEncoding::MeatPack;

    let mut binary = binarize(CANONICAL, config);
    let expected: String = CANONICAL
        .lines()
        .filter(|l| !l.starts_with(';'))
        .map(|l| format!("{l}\n"))
        .collect();
    assert_eq!(to_ascii(&mut binary), expected);
}

#[test]
fn large_input_spans_multiple_gcode_blocks() {
    let mut text = String::new();
    for i in 0..8000u32 {
        let x = (i % 250) as f32 + 0.125;
        text.push_str(&format!("G1 X{x:.3} Y{:.3} E0.01942\n", x / 2.0));
    }
    assert!(text.len() > 2 * bgcode::DEFAULT_GCODE_CACHE_SIZE);

    let mut config = BinarizerConfig::default();
    config.gcode_encoding = GCodeEncoding::MeatPackComments;
    config.compression.gcode = CompressionAlgorithm::Heatshrink12_4;

    let mut binarizer = Binarizer::new(Cursor::new(Vec::new()));
    binarizer.initialize(config).unwrap();
    // Feed in awkward slices so block splits land inside lines.
    for chunk in text.as_bytes().chunks(777) {
        binarizer.append_gcode(std::str::from_utf8(chunk).unwrap()).unwrap();
    }
    binarizer.finalize().unwrap();
    let mut binary = binarizer.into_inner();

    let mut scratch = [0u8; 2048];
    is_valid_binary_gcode(&mut binary, true, Some(&mut scratch)).unwrap();

    // More than one gcode block was written.
    binary.set_position(0);
    let file_header = read_header(&mut binary, None).unwrap();
    let first = read_next_block_header_of_type(
        &mut binary,
        &file_header,
        BlockKind::GCode,
        None,
    )
    .unwrap();
    assert!((first.uncompressed_size as usize) < text.len());

    assert_eq!(to_ascii(&mut binary), text);
}

#[test]
fn conversion_through_real_files() {
    let dir = tempfile::tempdir().unwrap();
    let ascii_path = dir.path().join("model.gcode");
    let binary_path = dir.path().join("model.bgcode");

    let mut ascii_file = File::create(&ascii_path).unwrap();
    ascii_file.write_all(CANONICAL.as_bytes()).unwrap();
    drop(ascii_file);

    let mut src = BufReader::new(File::open(&ascii_path).unwrap());
    let mut dst = BufWriter::new(File::create(&binary_path).unwrap());
    from_ascii_to_binary(&mut src, &mut dst, BinarizerConfig::conversion()).unwrap();
    drop(dst);

    let mut binary = BufReader::new(File::open(&binary_path).unwrap());
    let mut scratch = [0u8; 2048];
    is_valid_binary_gcode(&mut binary, true, Some(&mut scratch)).unwrap();

    let mut out = Vec::new();
    from_binary_to_ascii(&mut binary, &mut out, true).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), CANONICAL);
}

#[test]
fn version_cap_is_enforced() {
    let mut binary = binarize("G28\n", BinarizerConfig::default());
    assert_eq!(
        read_header(&mut binary, Some(0)),
        Err(BinaryGcodeError::InvalidVersionNumber)
    );
}

#[test]
fn missing_thumbnail_lookup_restores_position() {
    let mut binary = binarize("G28\n", BinarizerConfig::default());
    let file_header = read_header(&mut binary, None).unwrap();
    let entry = binary.position();
    assert_eq!(
        read_next_block_header_of_type(&mut binary, &file_header, BlockKind::Thumbnail, None),
        Err(BinaryGcodeError::BlockNotFound)
    );
    assert_eq!(binary.position(), entry);
}

#[test]
fn corrupting_any_data_byte_is_detected() {
    let pristine = binarize(CANONICAL, BinarizerConfig::default()).into_inner();
    // Corrupt a byte inside the gcode block data, well past the metadata.
    let mut corrupted = pristine.clone();
    let target = pristine.len() - 10;
    corrupted[target] ^= 0x01;

    let mut cursor = Cursor::new(corrupted);
    let mut scratch = [0u8; 2048];
    assert_eq!(
        is_valid_binary_gcode(&mut cursor, true, Some(&mut scratch)),
        Err(BinaryGcodeError::InvalidChecksum)
    );
}

#[test]
fn no_checksum_files_are_supported() {
    let mut config = BinarizerConfig::default();
    config.checksum = ChecksumKind::None;
    let mut binary = binarize(CANONICAL, config);
    is_valid_binary_gcode(&mut binary, true, None).unwrap();
    assert_eq!(to_ascii(&mut binary), CANONICAL);
}
