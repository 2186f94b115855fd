//! Bit-level helpers for single bytes.
//!
//! Bit positions are 0-indexed from the least significant bit. Field
//! extraction counts offsets from the most significant bit, which matches
//! the way RFC 6455 draws the frame header.

/// Returns whether `bit` is set in `byte`.
pub const fn get_bit(byte: u8, bit: u8) -> bool {
    debug_assert!(bit < 8);
    byte & (1 << bit) != 0
}

/// Returns `byte` with `bit` set.
pub const fn enable_bit(byte: u8, bit: u8) -> u8 {
    debug_assert!(bit < 8);
    byte | (1 << bit)
}

/// Returns `byte` with `bit` cleared.
pub const fn disable_bit(byte: u8, bit: u8) -> u8 {
    debug_assert!(bit < 8);
    byte & !(1 << bit)
}

/// Returns `byte` with `bit` set to `value`.
pub const fn set_bit(byte: u8, bit: u8, value: bool) -> u8 {
    if value {
        enable_bit(byte, bit)
    } else {
        disable_bit(byte, bit)
    }
}

/// Splits a byte into its eight bits, most significant first.
pub fn decode(byte: u8) -> [bool; 8] {
    let mut bits = [false; 8];
    for (i, slot) in bits.iter_mut().enumerate() {
        *slot = get_bit(byte, 7 - i as u8);
    }
    bits
}

/// Extracts `length` bits starting `offset` bits from the most significant
/// end, returned right-aligned.
///
/// `extract(0b1000_0001, 4, 4)` yields the low nibble `0b0001`.
pub fn extract(byte: u8, offset: u8, length: u8) -> u8 {
    debug_assert!(offset + length <= 8);
    let mut result = 0;
    for i in 0..length {
        let bit = get_bit(byte, 7 - offset - i);
        result = set_bit(result, length - i - 1, bit);
    }
    result
}

/// Renders a byte as space-separated bits, most significant first.
pub fn bits_string(byte: u8) -> String {
    decode(byte)
        .iter()
        .map(|bit| if *bit { "1" } else { "0" })
        .collect::<Vec<_>>()
        .join(" ")
}
