//! Bitfield helpers for packed pin vectors and bus words.

pub fn set_1(pins: u8, bit: u8, val: bool) -> u8 {
    let mask = 1 << bit;
    let val = (val as u8) << bit;
    (pins & !mask) | val
}

pub fn get_1(pins: u8, bit: u8) -> bool {
    (pins & (1 << bit)) > 0
}

/// Extracts `width` bits of `word` starting at `lsb`.
#[inline(always)]
pub fn field(word: u16, lsb: u8, width: u8) -> u16 {
    (word >> lsb) & ((1 << width) - 1)
}

/// Extracts the nibble of `word` starting at `lsb`.
pub fn nibble(word: u16, lsb: u8) -> u8 {
    field(word, lsb, 4) as u8
}
