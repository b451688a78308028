//! Repair of UTF-8 text that was decoded as Windows-1252 somewhere between
//! the bank and the mail forwarder ("ThÃ´ng bÃ¡o" instead of "Thông báo").

use std::borrow::Cow;

/// Windows-1252 bytes in `0x80..=0x9F` that decode to something other than
/// the matching C1 control character.
const CP1252_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

fn cp1252_byte(c: char) -> Option<u8> {
    match u32::from(c) {
        0..=0xFF => u8::try_from(u32::from(c)).ok(),
        _ => CP1252_HIGH.iter().find(|(_, ch)| *ch == c).map(|(b, _)| *b),
    }
}

/// Re-encodes `text` as Windows-1252 and decodes the bytes as UTF-8.
///
/// The text comes back unchanged unless every character has a Windows-1252
/// byte and those bytes form valid UTF-8 that differs from the input. Text
/// that is already correct Vietnamese fails the first test, since letters
/// like `ệ` have no single-byte encoding.
pub fn repair_mojibake(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }
    let Some(bytes) = text.chars().map(cp1252_byte).collect::<Option<Vec<u8>>>() else {
        return Cow::Borrowed(text);
    };
    match String::from_utf8(bytes) {
        Ok(fixed) if fixed != text => {
            tracing::debug!("repaired mis-decoded email text");
            Cow::Owned(fixed)
        }
        _ => Cow::Borrowed(text),
    }
}
