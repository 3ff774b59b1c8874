//! EBCDIC transcoding
//!
//! Bidirectional EBCDIC/Unicode conversion for mainframe data streams.
//! Code page 037 (EBCDIC US/Canada) is the default; CP500 (International)
//! and CP285 (UK) are selectable at codec construction. The tables are
//! immutable and shared across sessions.
//!
//! Unmappable code points decode to U+FFFD; unmappable characters encode
//! to the EBCDIC substitute byte 0x3F. Round-trip equality is guaranteed
//! on the shared printable subset only.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// EBCDIC substitute character, emitted for unmappable input.
pub const EBCDIC_SUB: u8 = 0x3F;

/// EBCDIC space, the fill byte for cleared screen buffers.
pub const EBCDIC_SPACE: u8 = 0x40;

/// EBCDIC to Unicode translation table (CP037)
///
/// Maps all 256 EBCDIC code points to their Unicode equivalents.
/// Based on the IBM Code Page 37 specification with full character coverage.
const CP037_TO_UNICODE: [char; 256] = [
    // 0x00-0x0F: Control characters
    '\x00', '\x01', '\x02', '\x03', '\u{009C}', '\t', '\u{0086}', '\x7F',
    '\u{0097}', '\u{008D}', '\u{008E}', '\x0B', '\x0C', '\r', '\x0E', '\x0F',
    // 0x10-0x1F: Control characters
    '\x10', '\x11', '\x12', '\x13', '\u{009D}', '\u{0085}', '\x08', '\u{0087}',
    '\x18', '\x19', '\u{0092}', '\u{008F}', '\x1C', '\x1D', '\x1E', '\x1F',
    // 0x20-0x2F: Control characters and special
    '\u{0080}', '\u{0081}', '\u{0082}', '\u{0083}', '\u{0084}', '\n', '\x17', '\x1B',
    '\u{0088}', '\u{0089}', '\u{008A}', '\u{008B}', '\u{008C}', '\x05', '\x06', '\x07',
    // 0x30-0x3F: Control characters
    '\u{0090}', '\u{0091}', '\x16', '\u{0093}', '\u{0094}', '\u{0095}', '\u{0096}', '\x04',
    '\u{0098}', '\u{0099}', '\u{009A}', '\u{009B}', '\x14', '\x15', '\u{009E}', '\x1A',
    // 0x40-0x4F: Space and special characters
    ' ', '\u{00A0}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E1}', '\u{00E3}', '\u{00E5}',
    '\u{00E7}', '\u{00F1}', '\u{00A2}', '.', '<', '(', '+', '|',
    // 0x50-0x5F: Ampersand and special characters
    '&', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{00EC}', '\u{00DF}', '!', '$', '*', ')', ';', '\u{00AC}',
    // 0x60-0x6F: Dash and special characters
    '-', '/', '\u{00C2}', '\u{00C4}', '\u{00C0}', '\u{00C1}', '\u{00C3}', '\u{00C5}',
    '\u{00C7}', '\u{00D1}', '\u{00A6}', ',', '%', '_', '>', '?',
    // 0x70-0x7F: Special characters and quotes
    '\u{00F8}', '\u{00C9}', '\u{00CA}', '\u{00CB}', '\u{00C8}', '\u{00CD}', '\u{00CE}', '\u{00CF}',
    '\u{00CC}', '`', ':', '#', '@', '\'', '=', '"',
    // 0x80-0x8F: Special character and lowercase a-i
    '\u{00D8}', 'a', 'b', 'c', 'd', 'e', 'f', 'g',
    'h', 'i', '\u{00AB}', '\u{00BB}', '\u{00F0}', '\u{00FD}', '\u{00FE}', '\u{00B1}',
    // 0x90-0x9F: Degree symbol and lowercase j-r
    '\u{00B0}', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
    'q', 'r', '\u{00AA}', '\u{00BA}', '\u{00E6}', '\u{00B8}', '\u{00C6}', '\u{00A4}',
    // 0xA0-0xAF: Micro sign and lowercase s-z
    '\u{00B5}', '~', 's', 't', 'u', 'v', 'w', 'x',
    'y', 'z', '\u{00A1}', '\u{00BF}', '\u{00D0}', '\u{00DD}', '\u{00DE}', '\u{00AE}',
    // 0xB0-0xBF: Caret and special characters
    '^', '\u{00A3}', '\u{00A5}', '\u{00B7}', '\u{00A9}', '\u{00A7}', '\u{00B6}', '\u{00BC}',
    '\u{00BD}', '\u{00BE}', '[', ']', '\u{00AF}', '\u{00A8}', '\u{00B4}', '\u{00D7}',
    // 0xC0-0xCF: Left brace and uppercase A-I
    '{', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', '\u{00AD}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00F3}', '\u{00F5}',
    // 0xD0-0xDF: Right brace and uppercase J-R
    '}', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'Q', 'R', '\u{00B9}', '\u{00FB}', '\u{00FC}', '\u{00F9}', '\u{00FA}', '\u{00FF}',
    // 0xE0-0xEF: Backslash and uppercase S-Z
    '\\', '\u{00F7}', 'S', 'T', 'U', 'V', 'W', 'X',
    'Y', 'Z', '\u{00B2}', '\u{00D4}', '\u{00D6}', '\u{00D2}', '\u{00D3}', '\u{00D5}',
    // 0xF0-0xFF: Digits 0-9 and special characters
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '\u{00B3}', '\u{00DB}', '\u{00DC}', '\u{00D9}', '\u{00DA}', '\u{009F}',
];

/// CP500 differs from CP037 in seven code points.
const CP500_DELTA: [(u8, char); 7] = [
    (0x4A, '['),
    (0x4F, '!'),
    (0x5A, ']'),
    (0x5F, '^'),
    (0xB0, '\u{00A2}'),
    (0xBA, '\u{00AC}'),
    (0xBB, '|'),
];

/// CP285 (UK) swaps the currency positions.
const CP285_DELTA: [(u8, char); 2] = [
    (0x4A, '$'),
    (0x5B, '\u{00A3}'),
];

fn apply_delta(base: &[char; 256], delta: &[(u8, char)]) -> [char; 256] {
    let mut table = *base;
    for &(pos, ch) in delta {
        table[pos as usize] = ch;
    }
    table
}

fn build_reverse(table: &[char; 256]) -> HashMap<char, u8> {
    let mut map = HashMap::with_capacity(256);
    for (byte, &ch) in table.iter().enumerate() {
        map.entry(ch).or_insert(byte as u8);
    }
    map
}

static CP500_TO_UNICODE: Lazy<[char; 256]> =
    Lazy::new(|| apply_delta(&CP037_TO_UNICODE, &CP500_DELTA));
static CP285_TO_UNICODE: Lazy<[char; 256]> =
    Lazy::new(|| apply_delta(&CP037_TO_UNICODE, &CP285_DELTA));

static CP037_REVERSE: Lazy<HashMap<char, u8>> = Lazy::new(|| build_reverse(&CP037_TO_UNICODE));
static CP500_REVERSE: Lazy<HashMap<char, u8>> = Lazy::new(|| build_reverse(&CP500_TO_UNICODE));
static CP285_REVERSE: Lazy<HashMap<char, u8>> = Lazy::new(|| build_reverse(&CP285_TO_UNICODE));

/// Supported EBCDIC code pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodePage {
    /// EBCDIC US/Canada (the mainframe default)
    #[default]
    Cp037,
    /// EBCDIC International
    Cp500,
    /// EBCDIC United Kingdom
    Cp285,
}

impl CodePage {
    /// Parse a code page name such as "cp037" or "IBM-500".
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cp037" | "ibm-037" | "ibm037" | "037" => Some(Self::Cp037),
            "cp500" | "ibm-500" | "ibm500" | "500" => Some(Self::Cp500),
            "cp285" | "ibm-285" | "ibm285" | "285" => Some(Self::Cp285),
            _ => None,
        }
    }

    fn forward(&self) -> &'static [char; 256] {
        match self {
            Self::Cp037 => &CP037_TO_UNICODE,
            Self::Cp500 => &CP500_TO_UNICODE,
            Self::Cp285 => &CP285_TO_UNICODE,
        }
    }

    fn reverse(&self) -> &'static HashMap<char, u8> {
        match self {
            Self::Cp037 => &CP037_REVERSE,
            Self::Cp500 => &CP500_REVERSE,
            Self::Cp285 => &CP285_REVERSE,
        }
    }
}

/// EBCDIC codec bound to a code page
#[derive(Debug, Clone, Copy, Default)]
pub struct EbcdicCodec {
    page: CodePage,
}

impl EbcdicCodec {
    /// Create a codec for the given code page
    pub fn new(page: CodePage) -> Self {
        Self { page }
    }

    /// The code page this codec was constructed with
    pub fn page(&self) -> CodePage {
        self.page
    }

    /// Decode a single EBCDIC byte
    pub fn decode_byte(&self, byte: u8) -> char {
        self.page.forward()[byte as usize]
    }

    /// Decode an EBCDIC byte slice into a string
    pub fn decode(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| self.decode_byte(b)).collect()
    }

    /// Encode a single character, substituting 0x3F when unmappable
    pub fn encode_char(&self, ch: char) -> u8 {
        self.page.reverse().get(&ch).copied().unwrap_or(EBCDIC_SUB)
    }

    /// Encode a string into EBCDIC bytes
    ///
    /// Returns the bytes together with the number of characters consumed.
    /// Every character is consumed; unmappable ones become 0x3F.
    pub fn encode(&self, s: &str) -> (Vec<u8>, usize) {
        let mut out = Vec::with_capacity(s.len());
        let mut consumed = 0;
        for ch in s.chars() {
            out.push(self.encode_char(ch));
            consumed += 1;
        }
        (out, consumed)
    }
}

/// Convert an EBCDIC byte to a Unicode character using CP037.
///
/// Convenience for screen rendering paths that never change code page.
pub fn ebcdic_to_ascii(byte: u8) -> char {
    CP037_TO_UNICODE[byte as usize]
}

/// Convert a character to its CP037 EBCDIC byte (0x3F if unmappable).
pub fn ascii_to_ebcdic(ch: char) -> u8 {
    CP037_REVERSE.get(&ch).copied().unwrap_or(EBCDIC_SUB)
}

/// Convert an EBCDIC byte slice to a String using CP037.
pub fn ebcdic_to_ascii_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| ebcdic_to_ascii(b)).collect()
}

/// Convert a string to CP037 EBCDIC bytes.
pub fn ascii_to_ebcdic_vec(s: &str) -> Vec<u8> {
    s.chars().map(ascii_to_ebcdic).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ebcdic_to_ascii_letters() {
        assert_eq!(ebcdic_to_ascii(0xC1), 'A');
        assert_eq!(ebcdic_to_ascii(0xC8), 'H');
        assert_eq!(ebcdic_to_ascii(0xE9), 'Z');

        assert_eq!(ebcdic_to_ascii(0x81), 'a');
        assert_eq!(ebcdic_to_ascii(0x88), 'h');
        assert_eq!(ebcdic_to_ascii(0xA9), 'z');
    }

    #[test]
    fn test_ebcdic_to_ascii_digits() {
        assert_eq!(ebcdic_to_ascii(0xF0), '0');
        assert_eq!(ebcdic_to_ascii(0xF5), '5');
        assert_eq!(ebcdic_to_ascii(0xF9), '9');
    }

    #[test]
    fn test_ascii_to_ebcdic_letters() {
        assert_eq!(ascii_to_ebcdic('A'), 0xC1);
        assert_eq!(ascii_to_ebcdic('Z'), 0xE9);
        assert_eq!(ascii_to_ebcdic('a'), 0x81);
        assert_eq!(ascii_to_ebcdic('z'), 0xA9);
    }

    #[test]
    fn test_unmappable_encodes_to_substitute() {
        let codec = EbcdicCodec::default();
        assert_eq!(codec.encode_char('\u{4E2D}'), EBCDIC_SUB);
        let (bytes, consumed) = codec.encode("A\u{4E2D}B");
        assert_eq!(bytes, vec![0xC1, EBCDIC_SUB, 0xC2]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_round_trip_printable_subset() {
        let codec = EbcdicCodec::default();
        let printable: String = (0x20u8..0x7F).map(|b| b as char).collect();
        let (bytes, _) = codec.encode(&printable);
        assert_eq!(codec.decode(&bytes), printable);
    }

    #[test]
    fn test_cp500_delta_positions() {
        let codec = EbcdicCodec::new(CodePage::Cp500);
        assert_eq!(codec.decode_byte(0x4A), '[');
        assert_eq!(codec.decode_byte(0x5A), ']');
        assert_eq!(codec.decode_byte(0x4F), '!');
        // Unaffected positions stay on the CP037 mapping
        assert_eq!(codec.decode_byte(0xC1), 'A');
        assert_eq!(codec.encode_char('['), 0x4A);
    }

    #[test]
    fn test_cp285_currency_swap() {
        let codec = EbcdicCodec::new(CodePage::Cp285);
        assert_eq!(codec.decode_byte(0x4A), '$');
        assert_eq!(codec.decode_byte(0x5B), '\u{00A3}');
        assert_eq!(codec.encode_char('\u{00A3}'), 0x5B);
    }

    #[test]
    fn test_code_page_names() {
        assert_eq!(CodePage::from_name("cp037"), Some(CodePage::Cp037));
        assert_eq!(CodePage::from_name("IBM-500"), Some(CodePage::Cp500));
        assert_eq!(CodePage::from_name("cp1252"), None);
    }

    #[test]
    fn test_string_conversion() {
        let ascii_str = "HELLO WORLD";
        let ebcdic_vec = ascii_to_ebcdic_vec(ascii_str);
        assert_eq!(ebcdic_to_ascii_string(&ebcdic_vec), ascii_str);
    }
}
