//! WinAnsiEncoding, the single-byte encoding of the standard 14 fonts.

/// Code points 0x80..=0x9F; `None` marks unassigned slots.
const HIGH_CONTROL: [Option<char>; 32] = [
    Some('€'),
    None,
    Some('‚'),
    Some('ƒ'),
    Some('„'),
    Some('…'),
    Some('†'),
    Some('‡'),
    Some('ˆ'),
    Some('‰'),
    Some('Š'),
    Some('‹'),
    Some('Œ'),
    None,
    Some('Ž'),
    None,
    None,
    Some('‘'),
    Some('’'),
    Some('“'),
    Some('”'),
    Some('•'),
    Some('–'),
    Some('—'),
    Some('˜'),
    Some('™'),
    Some('š'),
    Some('›'),
    Some('œ'),
    None,
    Some('ž'),
    Some('Ÿ'),
];

pub fn encode_char(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => HIGH_CONTROL
            .iter()
            .position(|candidate| *candidate == Some(ch))
            .map(|idx| 0x80 + idx as u8),
    }
}

pub fn encode(text: &str) -> Result<Vec<u8>, char> {
    text.chars().map(|ch| encode_char(ch).ok_or(ch)).collect()
}

pub fn decode_byte(byte: u8) -> char {
    match byte {
        0x80..=0x9F => HIGH_CONTROL[(byte - 0x80) as usize].unwrap_or('\u{FFFD}'),
        _ => byte as char,
    }
}

/// Decodes a PDF text string: UTF-16BE when it carries a byte-order mark,
/// WinAnsi otherwise.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().copied().map(decode_byte).collect()
}
