//! The MeatPack gcode codec: the common gcode alphabet is packed two
//! characters per byte, four bits each, with escapes to raw bytes for
//! everything outside the alphabet and an in-band command channel for
//! toggling the packer on and off.

use crate::error::Result;

/// Signal byte. Two in a row announce a command byte.
const SIGNAL: u8 = 0xFF;

const CMD_ENABLE_PACKING: u8 = 251;
const CMD_DISABLE_PACKING: u8 = 250;
const CMD_RESET_ALL: u8 = 249;
const CMD_QUERY_CONFIG: u8 = 248;
const CMD_ENABLE_NO_SPACES: u8 = 247;
const CMD_DISABLE_NO_SPACES: u8 = 246;

/// Strip spaces from normalised lines and pack `E` in the slot spaces
/// would otherwise use.
pub const FLAG_OMIT_WHITESPACES: u8 = 0x01;
/// Drop comment lines instead of embedding them verbatim.
pub const FLAG_REMOVE_COMMENTS: u8 = 0x02;

/// The lower-nibble escape: the character is carried as a full raw byte
/// after the packed one.
const NIBBLE_RAW: u8 = 0x0F;

/// Characters the unpacker regenerates for nibbles 0..=14. Slot 11 is
/// always `E`; the packer only uses that slot for spaces when whitespace
/// omission is off, a pairing kept for wire compatibility with the
/// reference streams.
const UNPACK_ALPHABET: [u8; 15] = [
    b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'.', b'E', b'\n', b'G', b'X',
];

/// Letters that start a gcode parameter. The unpacker reinserts a space
/// ahead of each of these when rebuilding a `G` line.
const PARAMETER_LETTERS: &[u8] = b"XYZEFIJRPWHCA";

/// Line-oriented packer. Feed it gcode text, it emits the packed byte
/// stream including the command prologue.
#[derive(Debug)]
pub struct Packer {
    flags: u8,
    packing: bool,
}

impl Packer {
    pub fn new(flags: u8) -> Self {
        Self {
            flags,
            packing: false,
        }
    }

    /// Emit the stream prologue: packing starts enabled.
    pub fn begin(&mut self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[SIGNAL, SIGNAL, CMD_ENABLE_PACKING]);
        self.packing = true;
    }

    /// Pack a single line. `line` is expected to carry its trailing
    /// newline except possibly for the final line of the stream.
    pub fn pack_line(&mut self, line: &str, out: &mut Vec<u8>) {
        // Kept comment lines travel as plain text outside packing mode.
        if self.flags & FLAG_REMOVE_COMMENTS == 0 && line.starts_with(';') {
            if self.packing {
                out.extend_from_slice(&[SIGNAL, SIGNAL, CMD_DISABLE_PACKING]);
                self.packing = false;
            }
            out.extend_from_slice(line.as_bytes());
            return;
        }
        if line.starts_with(';')
            || line.starts_with('\n')
            || line.starts_with('\r')
            || line.len() < 2
        {
            return;
        }

        let mut text = if is_gline(line) {
            self.normalise(line)
        } else {
            line.to_string()
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }

        let bytes = text.as_bytes();
        let mut packed: Vec<u8> = Vec::with_capacity(bytes.len() / 2 + 4);
        let mut i = 0;
        while i < bytes.len() {
            let c1 = bytes[i];
            // An odd trailing character is paired with a pad newline the
            // unpacker discards.
            let c2 = if i + 1 < bytes.len() { bytes[i + 1] } else { b'\n' };
            match (self.nibble(c1), self.nibble(c2)) {
                (Some(n1), Some(n2)) => packed.push((n2 << 4) | n1),
                (Some(n1), None) => {
                    packed.push((NIBBLE_RAW << 4) | n1);
                    packed.push(c2);
                }
                (None, Some(n2)) => {
                    packed.push((n2 << 4) | NIBBLE_RAW);
                    packed.push(c1);
                }
                (None, None) => {
                    // Both escape nibbles collapse into the signal byte.
                    // Gcode text is ASCII, so the two raw bytes that follow
                    // can never be 0xFF themselves and the command
                    // detector stays in sync.
                    packed.push(SIGNAL);
                    packed.push(c1);
                    packed.push(c2);
                }
            }
            i += 2;
        }

        if !self.packing && !packed.is_empty() {
            out.extend_from_slice(&[SIGNAL, SIGNAL, CMD_ENABLE_PACKING]);
            self.packing = true;
        }
        out.extend_from_slice(&packed);
    }

    /// Emit the stream epilogue.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.flags & FLAG_REMOVE_COMMENTS != 0 {
            out.extend_from_slice(&[SIGNAL, SIGNAL, CMD_RESET_ALL]);
            self.packing = false;
        }
    }

    fn nibble(&self, c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'.' => Some(10),
            b' ' if self.flags & FLAG_OMIT_WHITESPACES == 0 => Some(11),
            b'E' if self.flags & FLAG_OMIT_WHITESPACES != 0 => Some(11),
            b'\n' => Some(12),
            b'G' => Some(13),
            b'X' => Some(14),
            _ => None,
        }
    }

    /// Rework a movement line into its canonical packed form: inline
    /// comment dropped, trailing spaces trimmed, axis letters uppercased,
    /// spaces removed and any line checksum recomputed over the reworked
    /// bytes.
    fn normalise(&self, line: &str) -> String {
        let code = match line.find(';') {
            Some(i) => &line[..i],
            None => line,
        };
        let code = code.trim_end_matches(' ');

        let mut out = String::with_capacity(code.len());
        if self.flags & FLAG_OMIT_WHITESPACES != 0 {
            for c in code.chars() {
                match c {
                    'x' => out.push('X'),
                    'g' => out.push('G'),
                    'e' => out.push('E'),
                    ' ' => {}
                    _ => out.push(c),
                }
            }
        } else {
            for c in code.chars() {
                match c {
                    'x' => out.push('X'),
                    'g' => out.push('G'),
                    ' ' => {}
                    _ => out.push(c),
                }
            }
        }

        if let Some(i) = out.find('*') {
            out.truncate(i);
            let checksum = out.bytes().fold(0u8, |acc, b| acc ^ b);
            out.push('*');
            out.push_str(&checksum.to_string());
        }

        out
    }
}

/// A movement line is one containing `G` directly followed by a digit.
/// Everything else travels through unmodified.
fn is_gline(line: &str) -> bool {
    line.as_bytes()
        .windows(2)
        .any(|w| w[0] == b'G' && w[1].is_ascii_digit())
}

/// Streaming unpacker: the inverse state machine, including the space
/// reinsertion pass that rebuilds parser-friendly `G` lines.
#[derive(Debug, Default)]
pub struct Unpacker {
    unbinarizing: bool,
    cmd_count: u8,
    cmd_active: bool,
    full_char_queue: u8,
    char_buf: Option<u8>,
    line: Vec<u8>,
    out: Vec<u8>,
}

impl Unpacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, data: &[u8]) {
        for byte in data {
            self.feed_byte(*byte);
        }
    }

    /// Flush the trailing partial line and return the rebuilt text.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.line.is_empty() {
            self.flush_line();
        }
        self.out
    }

    fn feed_byte(&mut self, b: u8) {
        if b == SIGNAL {
            if self.cmd_count == 1 {
                self.cmd_active = true;
                self.cmd_count = 0;
            } else {
                self.cmd_count = 1;
            }
            return;
        }
        if self.cmd_active {
            self.apply_command(b);
            self.cmd_active = false;
        } else if self.cmd_count == 1 {
            // A lone signal byte was data: the packer's sentinel for a
            // fully escaped character pair.
            self.cmd_count = 0;
            self.handle_char(SIGNAL);
            self.handle_char(b);
        } else {
            self.handle_char(b);
        }
    }

    fn apply_command(&mut self, cmd: u8) {
        match cmd {
            CMD_ENABLE_PACKING => self.unbinarizing = true,
            CMD_DISABLE_PACKING | CMD_RESET_ALL => self.unbinarizing = false,
            CMD_QUERY_CONFIG | CMD_ENABLE_NO_SPACES | CMD_DISABLE_NO_SPACES => {}
            _ => {}
        }
    }

    fn handle_char(&mut self, b: u8) {
        if !self.unbinarizing {
            self.emit(b);
            return;
        }
        if self.full_char_queue > 0 {
            self.emit(b);
            if let Some(second) = self.char_buf.take() {
                self.emit(second);
            }
            self.full_char_queue -= 1;
            return;
        }

        let low = b & 0x0F;
        let high = (b >> 4) & 0x0F;
        if low == NIBBLE_RAW {
            self.full_char_queue += 1;
            if high == NIBBLE_RAW {
                self.full_char_queue += 1;
            } else {
                self.char_buf = Some(UNPACK_ALPHABET[high as usize]);
            }
        } else {
            let first = UNPACK_ALPHABET[low as usize];
            self.emit(first);
            if first != b'\n' {
                if high == NIBBLE_RAW {
                    self.full_char_queue += 1;
                } else {
                    self.emit(UNPACK_ALPHABET[high as usize]);
                }
            }
        }
    }

    fn emit(&mut self, b: u8) {
        self.line.push(b);
        if b == b'\n' {
            self.flush_line();
        }
    }

    fn flush_line(&mut self) {
        // Runs of newlines collapse into one.
        if self.line == b"\n" && self.out.last() == Some(&b'\n') {
            self.line.clear();
            return;
        }
        if self.line.first() == Some(&b'G') {
            let first = self.line[0];
            self.out.push(first);
            for i in 1..self.line.len() {
                let b = self.line[i];
                if PARAMETER_LETTERS.contains(&b) && self.out.last() != Some(&b' ') {
                    self.out.push(b' ');
                }
                self.out.push(b);
            }
        } else {
            self.out.extend_from_slice(&self.line);
        }
        self.line.clear();
    }
}

/// Pack a whole gcode text into one self-contained byte stream.
pub fn pack(text: &str, flags: u8) -> Vec<u8> {
    let mut packer = Packer::new(flags);
    let mut out = Vec::with_capacity(text.len() / 2 + 16);
    packer.begin(&mut out);
    for line in text.split_inclusive('\n') {
        packer.pack_line(line, &mut out);
    }
    packer.finish(&mut out);
    out
}

/// Unpack a self-contained packed stream back into gcode text bytes.
pub fn unpack(data: &[u8]) -> Result<Vec<u8>> {
    let mut unpacker = Unpacker::new();
    unpacker.feed(data);
    Ok(unpacker.finish())
}
