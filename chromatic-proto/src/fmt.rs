//! No-std hex helpers shared by the cheat code codec and identity formatting.

/// Hex digits lookup table for fast conversion.
const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Write a u8 as 2 uppercase hex digits.
///
/// Returns the number of bytes written (always 2).
///
/// # Panics
///
/// Panics if `buf.len() < 2`.
#[inline]
pub fn write_hex_u8(buf: &mut [u8], value: u8) -> usize {
    debug_assert!(buf.len() >= 2, "buffer too small for hex u8");
    buf[0] = HEX_DIGITS[(value >> 4) as usize];
    buf[1] = HEX_DIGITS[(value & 0xF) as usize];
    2
}

/// Write a u32 as 8 uppercase hex digits.
///
/// # Panics
///
/// Panics if `buf.len() < 8`.
#[inline]
pub fn write_hex_u32(buf: &mut [u8], value: u32) -> usize {
    debug_assert!(buf.len() >= 8, "buffer too small for hex u32");
    for (i, byte) in value.to_be_bytes().iter().enumerate() {
        write_hex_u8(&mut buf[i * 2..], *byte);
    }
    8
}

/// Uppercase hex digit for the low nibble of `n`.
#[inline]
#[must_use]
pub fn hex_digit(n: u8) -> u8 {
    HEX_DIGITS[(n & 0xF) as usize]
}

/// Value of an ASCII hex digit (either case).
#[inline]
#[must_use]
pub fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Parse two hex digits into a byte.
#[inline]
#[must_use]
pub fn parse_hex_u8(digits: &[u8]) -> Option<u8> {
    match digits {
        [hi, lo, ..] => Some((nibble(*hi)? << 4) | nibble(*lo)?),
        _ => None,
    }
}

/// Render a radio address as `XX:XX:XX:XX:XX:XX`.
///
/// The radio reports addresses least-significant byte first; the rendered
/// form starts with the most significant byte.
#[must_use]
pub fn format_address(addr: &[u8; 6]) -> [u8; 17] {
    let mut out = [b':'; 17];
    for (i, byte) in addr.iter().rev().enumerate() {
        write_hex_u8(&mut out[i * 3..], *byte);
    }
    out
}
