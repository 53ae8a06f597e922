//! Byte packing within a 64-bit word by shift-and-mask.
//!
//! Positions `0..8` address the bytes of a word least-significant first, so
//! position `i` corresponds to byte `i` of the word's little-endian encoding.
//! These are a portable substitute for raw per-byte addressing when a
//! component only needs to pack byte fields inside an already loaded word.

/// Number of bytes in a word.
pub const WORD_BYTES: u32 = 8;

/// Extracts the byte at `position` from `word`.
#[inline]
pub const fn get_byte(word: u64, position: u32) -> u8 {
    debug_assert!(position < WORD_BYTES);
    ((word >> (position * 8)) & 0xFF) as u8
}

/// Returns `word` with the byte at `position` replaced by `value`.
#[inline]
pub const fn put_byte(word: u64, position: u32, value: u8) -> u64 {
    debug_assert!(position < WORD_BYTES);
    let shift = position * 8;
    (word & !(0xFF << shift)) | ((value as u64) << shift)
}

/// Splits a word into its eight bytes, least significant first.
#[inline]
pub fn split_word(word: u64) -> [u8; 8] {
    std::array::from_fn(|i| get_byte(word, i as u32))
}

/// Reassembles a word from eight bytes, least significant first.
#[inline]
pub fn join_bytes(bytes: [u8; 8]) -> u64 {
    bytes
        .iter()
        .enumerate()
        .fold(0u64, |word, (i, &b)| put_byte(word, i as u32, b))
}
