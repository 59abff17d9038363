//! The line-oriented INI form metadata blocks store their key/value pairs
//! in: one `key=value` pair per line, order preserved.

use crate::error::{BinaryGcodeError, Result};

pub(crate) fn encode(entries: &[(String, String)]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (key, value) in entries {
        if key.contains('=') || key.contains('\n') || value.contains('\n') {
            return Err(BinaryGcodeError::MetadataEncodingError);
        }
        out.extend_from_slice(key.as_bytes());
        out.push(b'=');
        out.extend_from_slice(value.as_bytes());
        out.push(b'\n');
    }
    Ok(out)
}

pub(crate) fn decode(data: &[u8]) -> Result<Vec<(String, String)>> {
    let text =
        core::str::from_utf8(data).map_err(|_| BinaryGcodeError::MetadataDecodingError)?;
    let mut entries = Vec::new();
    for line in text.split('\n') {
        if line.is_empty() {
            continue;
        }
        // Lines with no separator carry nothing, skip them silently.
        if let Some((key, value)) = line.split_once('=') {
            entries.push((key.to_string(), value.to_string()));
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn encode_decode_preserves_order() {
        let entries = pairs(&[
            ("printer_model", "MK4"),
            ("filament_type", "PLA"),
            ("nozzle_diameter", "0.4"),
        ]);
        let encoded = encode(&entries).unwrap();
        assert_eq!(
            encoded,
            b"printer_model=MK4\nfilament_type=PLA\nnozzle_diameter=0.4\n"
        );
        assert_eq!(decode(&encoded).unwrap(), entries);
    }

    #[test]
    fn value_may_contain_separator() {
        let entries = pairs(&[("compatible_printers_condition", "nozzle==0.4")]);
        let encoded = encode(&entries).unwrap();
        assert_eq!(decode(&encoded).unwrap(), entries);
    }

    #[test]
    fn separator_in_key_is_an_error() {
        let entries = pairs(&[("bad=key", "value")]);
        assert_eq!(encode(&entries), Err(BinaryGcodeError::MetadataEncodingError));
    }

    #[test]
    fn newline_in_value_is_an_error() {
        let entries = pairs(&[("key", "two\nlines")]);
        assert_eq!(encode(&entries), Err(BinaryGcodeError::MetadataEncodingError));
    }

    #[test]
    fn lines_without_separator_are_skipped() {
        let decoded = decode(b"a=1\nnot a pair\nb=2\n").unwrap();
        assert_eq!(decoded, pairs(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn empty_data_decodes_to_no_entries() {
        assert!(decode(b"").unwrap().is_empty());
    }
}
