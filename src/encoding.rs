//! Component B: Encoding Resolver.
//!
//! Detects a byte-order mark; absent that, classifies the encoding from a
//! byte-frequency heuristic over the first chunk. Decodes to a Unicode
//! scalar stream, replacing malformed sequences with U+FFFD and counting
//! them. Never fails — per spec §4.B this stage always decodes.

use serde::Serialize;

/// Encoding tag assigned by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Latin1,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Utf32Le => "utf-32le",
            Encoding::Utf32Be => "utf-32be",
            Encoding::Latin1 => "latin-1",
        }
    }
}

/// Outcome of BOM/heuristic classification over the leading bytes.
#[derive(Debug, Clone, Copy)]
pub struct EncodingDecision {
    pub encoding: Encoding,
    pub confidence: f64,
    pub bom_present: bool,
    /// Number of leading bytes consumed by the BOM (0 if none).
    pub bom_len: usize,
}

/// Inspect the leading bytes of the stream and decide an encoding.
/// `sniff_window` should be the first chunk, at least 4 bytes where
/// possible (fewer is tolerated for tiny inputs).
pub fn detect(sniff_window: &[u8]) -> EncodingDecision {
    if let Some((enc, len)) = detect_bom(sniff_window) {
        return EncodingDecision {
            encoding: enc,
            confidence: 1.0,
            bom_present: true,
            bom_len: len,
        };
    }

    let window = &sniff_window[..sniff_window.len().min(crate::config::defaults::ENCODING_SNIFF_BYTES)];
    if window.is_empty() {
        return EncodingDecision {
            encoding: Encoding::Utf8,
            confidence: 0.5,
            bom_present: false,
            bom_len: 0,
        };
    }

    let high_bit_count = window.iter().filter(|&&b| b >= 0x80).count();
    if high_bit_count == 0 {
        return EncodingDecision {
            encoding: Encoding::Utf8,
            confidence: 0.95,
            bom_present: false,
            bom_len: 0,
        };
    }

    if std::str::from_utf8(window).is_ok() {
        return EncodingDecision {
            encoding: Encoding::Utf8,
            confidence: 0.90,
            bom_present: false,
            bom_len: 0,
        };
    }

    if looks_like_utf16(window, true) {
        return EncodingDecision {
            encoding: Encoding::Utf16Le,
            confidence: 0.85,
            bom_present: false,
            bom_len: 0,
        };
    }
    if looks_like_utf16(window, false) {
        return EncodingDecision {
            encoding: Encoding::Utf16Be,
            confidence: 0.85,
            bom_present: false,
            bom_len: 0,
        };
    }

    EncodingDecision {
        encoding: Encoding::Latin1,
        confidence: 0.50,
        bom_present: false,
        bom_len: 0,
    }
}

fn detect_bom(bytes: &[u8]) -> Option<(Encoding, usize)> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some((Encoding::Utf8, 3));
    }
    if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        return Some((Encoding::Utf32Le, 4));
    }
    if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        return Some((Encoding::Utf32Be, 4));
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Some((Encoding::Utf16Le, 2));
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Some((Encoding::Utf16Be, 2));
    }
    None
}

/// Heuristic: alternating null bytes at even/odd positions suggest a
/// 16-bit encoding carrying mostly-ASCII text. `little` selects which
/// position is expected to be null (LE ASCII text nulls the high byte,
/// i.e. odd positions; BE nulls the low byte, i.e. even positions).
fn looks_like_utf16(window: &[u8], little: bool) -> bool {
    if window.len() < 4 {
        return false;
    }
    let null_at = |i: usize| window[i] == 0;
    let expected_null_parity = if little { 1 } else { 0 };
    let pairs = window.len() / 2;
    if pairs == 0 {
        return false;
    }
    let matches = (0..pairs)
        .filter(|&i| null_at(2 * i + expected_null_parity))
        .count();
    (matches as f64 / pairs as f64) > 0.7
}

/// Decodes a byte stream of a known encoding into Unicode scalars,
/// replacing invalid sequences with U+FFFD and counting them. Operates
/// incrementally over chunks, carrying over any incomplete trailing
/// sequence between calls.
pub struct Decoder {
    encoding: Encoding,
    carry: Vec<u8>,
    pub replacement_count: u64,
}

impl Decoder {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            carry: Vec::new(),
            replacement_count: 0,
        }
    }

    /// Decode one chunk, returning the scalar characters produced. Any
    /// bytes that look like the start of a multi-byte sequence but are
    /// truncated by the chunk boundary are held back in `carry` until
    /// the next call (or flushed as replacement on `finish`).
    pub fn decode_chunk(&mut self, chunk: &[u8]) -> Vec<char> {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(chunk);
        let (chars, remainder) = match self.encoding {
            Encoding::Utf8 => decode_utf8_lossy_incremental(&buf),
            Encoding::Utf16Le => decode_utf16_incremental(&buf, true),
            Encoding::Utf16Be => decode_utf16_incremental(&buf, false),
            Encoding::Utf32Le => decode_utf32_incremental(&buf, true),
            Encoding::Utf32Be => decode_utf32_incremental(&buf, false),
            Encoding::Latin1 => (buf.iter().map(|&b| b as char).collect(), Vec::new()),
        };
        self.carry = remainder;
        self.replacement_count += chars.iter().filter(|&&c| c == '\u{FFFD}').count() as u64;
        chars
    }

    /// Flush any trailing bytes at end-of-stream; an incomplete sequence
    /// here is necessarily malformed and becomes a single replacement char.
    pub fn finish(&mut self) -> Vec<char> {
        if self.carry.is_empty() {
            return Vec::new();
        }
        self.replacement_count += 1;
        self.carry.clear();
        vec!['\u{FFFD}']
    }
}

fn decode_utf8_lossy_incremental(buf: &[u8]) -> (Vec<char>, Vec<u8>) {
    let mut chars = Vec::new();
    let mut i = 0;
    while i < buf.len() {
        match std::str::from_utf8(&buf[i..]) {
            Ok(s) => {
                chars.extend(s.chars());
                i = buf.len();
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                if let Ok(s) = std::str::from_utf8(&buf[i..i + valid_up_to]) {
                    chars.extend(s.chars());
                }
                match e.error_len() {
                    Some(bad_len) => {
                        chars.push('\u{FFFD}');
                        i += valid_up_to + bad_len;
                    }
                    None => {
                        // Incomplete sequence at the end of the buffer;
                        // carry it over to the next chunk.
                        return (chars, buf[i + valid_up_to..].to_vec());
                    }
                }
            }
        }
    }
    (chars, Vec::new())
}

fn decode_utf16_incremental(buf: &[u8], little: bool) -> (Vec<char>, Vec<u8>) {
    let mut units = Vec::with_capacity(buf.len() / 2);
    let mut i = 0;
    while i + 1 < buf.len() {
        let u = if little {
            u16::from_le_bytes([buf[i], buf[i + 1]])
        } else {
            u16::from_be_bytes([buf[i], buf[i + 1]])
        };
        units.push(u);
        i += 2;
    }
    let remainder = buf[i..].to_vec();
    let chars: Vec<char> = char::decode_utf16(units)
        .map(|r| r.unwrap_or('\u{FFFD}'))
        .collect();
    (chars, remainder)
}

fn decode_utf32_incremental(buf: &[u8], little: bool) -> (Vec<char>, Vec<u8>) {
    let mut chars = Vec::with_capacity(buf.len() / 4);
    let mut i = 0;
    while i + 3 < buf.len() {
        let bytes = [buf[i], buf[i + 1], buf[i + 2], buf[i + 3]];
        let scalar = if little {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        };
        chars.push(char::from_u32(scalar).unwrap_or('\u{FFFD}'));
        i += 4;
    }
    (chars, buf[i..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_utf8_bom() {
        let d = detect(&[0xEF, 0xBB, 0xBF, b'a']);
        assert_eq!(d.encoding, Encoding::Utf8);
        assert!(d.bom_present);
        assert_eq!(d.bom_len, 3);
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn ascii_detects_as_utf8_high_confidence() {
        let d = detect(b"id,name,amount\n1,a,2.0\n");
        assert_eq!(d.encoding, Encoding::Utf8);
        assert!(d.confidence >= 0.9);
        assert!(!d.bom_present);
    }

    #[test]
    fn valid_utf8_no_replacement() {
        let mut decoder = Decoder::new(Encoding::Utf8);
        let chars = decoder.decode_chunk("héllo, wörld".as_bytes());
        let s: String = chars.into_iter().collect();
        assert_eq!(s, "héllo, wörld");
        assert_eq!(decoder.replacement_count, 0);
    }

    #[test]
    fn utf8_boundary_split_mid_codepoint_reassembles() {
        let bytes = "café".as_bytes().to_vec();
        // split right inside the 2-byte 'é' sequence
        let split = bytes.len() - 1;
        let mut decoder = Decoder::new(Encoding::Utf8);
        let mut out = decoder.decode_chunk(&bytes[..split]);
        out.extend(decoder.decode_chunk(&bytes[split..]));
        let s: String = out.into_iter().collect();
        assert_eq!(s, "café");
        assert_eq!(decoder.replacement_count, 0);
    }

    #[test]
    fn invalid_utf8_counts_replacement() {
        let mut decoder = Decoder::new(Encoding::Utf8);
        let bytes = [b'a', 0xFF, b'b'];
        let chars = decoder.decode_chunk(&bytes);
        let s: String = chars.into_iter().collect();
        assert_eq!(s, "a\u{FFFD}b");
        assert_eq!(decoder.replacement_count, 1);
    }
}
