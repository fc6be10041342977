//! PETSCII / host-ASCII conversion for filenames and listings.
//!
//! Unshifted PETSCII $41-$5A displays as uppercase glyphs but sits where
//! ASCII puts lowercase, so drive filenames map to lowercase host names
//! and back.

/// Convert one PETSCII byte to a host ASCII character (basic conversion).
#[must_use]
pub fn petscii_to_ascii(c: u8) -> char {
    match c {
        0x41..=0x5A => (c + 0x20) as char, // Upper to lower
        0x61..=0x7A => (c - 0x20) as char, // Lower to upper
        0xC1..=0xDA => (c - 0x80) as char, // Shifted upper to upper
        0x20..=0x3F => c as char,          // Punctuation/numbers
        _ => '?',
    }
}

/// Convert one host ASCII character to PETSCII.
#[must_use]
pub fn ascii_to_petscii(c: char) -> u8 {
    match c {
        'a'..='z' => c as u8 - 0x20,
        'A'..='Z' | ' '..='?' => c as u8,
        _ => b'?',
    }
}

/// Convert an accumulated PETSCII name to a host string.
#[must_use]
pub fn to_host(name: &[u8]) -> String {
    name.iter().map(|&c| petscii_to_ascii(c)).collect()
}

/// Convert a host name to PETSCII bytes.
#[must_use]
pub fn to_petscii(name: &str) -> Vec<u8> {
    name.chars().map(ascii_to_petscii).collect()
}
