//! Invite codes
//!
//! Codes are drawn from a 32-symbol alphabet without the look-alike
//! characters `I`, `O`, `0` and `1`. Lookups are case-insensitive: every code
//! is normalized before it is stored or compared, and the stored form is
//! always uppercase.

use uuid::Uuid;

/// Symbols used for generated codes
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Shortest accepted code
pub const MIN_CODE_LENGTH: usize = 4;

/// Longest accepted code
pub const MAX_CODE_LENGTH: usize = 12;

/// Generate a fresh code of `length` symbols.
///
/// `length` is clamped to `MIN_CODE_LENGTH..=MAX_CODE_LENGTH`. Uniqueness is
/// not checked here; the store rejects a taken code.
pub fn generate_invite_code(length: usize) -> String {
    let length = length.clamp(MIN_CODE_LENGTH, MAX_CODE_LENGTH);
    let uuid = Uuid::new_v4();

    // Byte 6 carries the version nibble, so only its low bits are random
    uuid.as_bytes()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 6)
        .take(length)
        .map(|(_, b)| ALPHABET[(*b & 0x1f) as usize] as char)
        .collect()
}

/// Canonical form of a user-entered code: whitespace removed, ASCII uppercase.
pub fn normalize_invite_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Whether a normalized code is acceptable as a creator-assigned code
pub fn is_valid_custom_code(code: &str) -> bool {
    (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphanumeric())
}
