//! GameShark-style cheat code text codec.
//!
//! A code is 8 hex characters laid out as four bytes:
//!
//! ```text
//! TT VV LL HH
//! │  │  │  └─ address high byte
//! │  │  └──── address low byte
//! │  └─────── value written
//! └────────── type (0x01 plain write, 0x91 write with compare)
//! ```
//!
//! Codes are kept as uppercase text so a half-edited, undecodable code can
//! still be stored and edited further.
//!
//! # Example
//!
//! ```
//! use chromatic_proto::cheat::{CheatCode, CheatType};
//!
//! let code = CheatCode::parse(b"91ff34c1").unwrap();
//! assert_eq!(code.as_str(), "91FF34C1");
//!
//! let patch = code.decode().unwrap();
//! assert_eq!(patch.kind, CheatType::Compare);
//! assert_eq!(patch.value, 0xFF);
//! assert_eq!(patch.address, 0xC134);
//! ```

use crate::fmt::{hex_digit, nibble, parse_hex_u8, write_hex_u8};

/// Number of hex characters in a code.
pub const CODE_LEN: usize = 8;

/// Supported cheat types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CheatType {
    /// `0x01`: write the value to the address.
    Plain = 0x01,
    /// `0x91`: write the value; the device also receives it as a compare byte.
    Compare = 0x91,
}

impl CheatType {
    /// Map a raw type byte to a supported type.
    #[inline]
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Plain),
            0x91 => Some(Self::Compare),
            _ => None,
        }
    }

    /// Raw type byte.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Decoded contents of a valid code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CheatPatch {
    pub kind: CheatType,
    pub value: u8,
    pub address: u16,
}

impl CheatPatch {
    /// Encode back to its code text.
    #[must_use]
    pub fn encode(&self) -> CheatCode {
        let mut text = [0u8; CODE_LEN];
        let [lo, hi] = self.address.to_le_bytes();
        write_hex_u8(&mut text[0..], self.kind.as_u8());
        write_hex_u8(&mut text[2..], self.value);
        write_hex_u8(&mut text[4..], lo);
        write_hex_u8(&mut text[6..], hi);
        CheatCode(text)
    }
}

/// Error type for cheat code handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodeError {
    /// Input is not exactly 8 characters.
    Length,
    /// A character is not a hex digit.
    NotHex,
    /// The type byte is not a supported cheat type.
    UnsupportedType(u8),
}

impl core::fmt::Display for CodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Length => write!(f, "code must be 8 characters"),
            Self::NotHex => write!(f, "code contains a non-hex character"),
            Self::UnsupportedType(t) => write!(f, "unsupported cheat type {:#04x}", t),
        }
    }
}

/// An 8-character uppercase hex code.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CheatCode([u8; CODE_LEN]);

impl CheatCode {
    /// The code a fresh slot starts with.
    pub const DEFAULT: Self = Self(*b"01000000");

    /// Parse exactly 8 hex characters, normalizing to uppercase.
    ///
    /// This does not check the type byte; see [`CheatCode::decode`].
    pub fn parse(text: &[u8]) -> Result<Self, CodeError> {
        if text.len() != CODE_LEN {
            return Err(CodeError::Length);
        }
        let mut out = [0u8; CODE_LEN];
        for (dst, &c) in out.iter_mut().zip(text) {
            if nibble(c).is_none() {
                return Err(CodeError::NotHex);
            }
            *dst = c.to_ascii_uppercase();
        }
        Ok(Self(out))
    }

    /// Decode the code into a patch.
    pub fn decode(&self) -> Result<CheatPatch, CodeError> {
        let byte = |i: usize| parse_hex_u8(&self.0[i..]).ok_or(CodeError::NotHex);
        let raw_type = byte(0)?;
        let kind = CheatType::from_u8(raw_type).ok_or(CodeError::UnsupportedType(raw_type))?;
        let value = byte(2)?;
        let address = u16::from_le_bytes([byte(4)?, byte(6)?]);
        Ok(CheatPatch {
            kind,
            value,
            address,
        })
    }

    /// Nibble value at character `index` (0..8).
    #[inline]
    #[must_use]
    pub fn nibble(&self, index: usize) -> u8 {
        nibble(self.0[index]).unwrap_or(0)
    }

    /// Replace the character at `index` with the hex digit for `value`.
    #[inline]
    pub fn set_nibble(&mut self, index: usize, value: u8) {
        self.0[index] = hex_digit(value);
    }

    /// Case-insensitive comparison against raw text.
    #[must_use]
    pub fn matches(&self, text: &[u8]) -> bool {
        self.0.eq_ignore_ascii_case(text)
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; CODE_LEN] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Construction only ever stores ASCII hex digits.
        core::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl Default for CheatCode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl core::fmt::Debug for CheatCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CheatCode({})", self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CheatCode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}
