//! Payload layouts for device commands that carry more than a plain level.

use crate::cheat::CheatPatch;

/// Number of cheat slots the device tracks.
pub const MAX_CHEAT_SLOTS: usize = 8;

/// One cheat slot update for the co-processor.
///
/// Wire layout (6 bytes):
///
/// ```text
/// slot, flags (bit7 enable | bits6:0 type), addr hi, addr lo, value, compare
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CheatPoke {
    slot: u8,
    enable: bool,
    raw_type: u8,
    address: u16,
    value: u8,
}

impl CheatPoke {
    /// Size of the serialized payload.
    pub const SIZE: usize = 6;

    /// Build a poke for `slot`. Returns `None` for slots outside the device table.
    #[must_use]
    pub fn new(slot: u8, enable: bool, raw_type: u8, address: u16, value: u8) -> Option<Self> {
        if slot as usize >= MAX_CHEAT_SLOTS {
            return None;
        }
        Some(Self {
            slot,
            enable,
            raw_type,
            address,
            value,
        })
    }

    /// Build a poke from a decoded code.
    #[must_use]
    pub fn from_patch(slot: u8, enable: bool, patch: &CheatPatch) -> Option<Self> {
        Self::new(slot, enable, patch.kind.as_u8(), patch.address, patch.value)
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> u8 {
        self.slot
    }

    #[inline]
    #[must_use]
    pub fn is_enable(&self) -> bool {
        self.enable
    }

    /// Serialize to the wire layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let [hi, lo] = self.address.to_be_bytes();
        let flags = (self.raw_type & 0x7F) | if self.enable { 0x80 } else { 0 };
        let compare = if self.raw_type == 0x91 { self.value } else { 0 };
        [self.slot, flags, hi, lo, self.value, compare]
    }
}

/// Color correction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ColorCorrection {
    pub lcd: bool,
    pub usb: bool,
}

impl ColorCorrection {
    #[inline]
    const fn bits(self) -> u16 {
        (self.lcd as u16) | ((self.usb as u16) << 1)
    }
}

/// System control flags packed into one 16-bit word.
///
/// | Bits   | Field                  |
/// |--------|------------------------|
/// | 0      | mute                   |
/// | 1      | frame blend            |
/// | 2..3   | color correction       |
/// | 4..10  | player number          |
/// | 11     | reject diagonal input  |
/// | 12     | screen transition fix  |
/// | 13..15 | low battery icon mode  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SysCtl {
    pub mute: bool,
    pub frame_blend: bool,
    pub color_correction: ColorCorrection,
    pub player_number: u8,
    pub reject_diagonals: bool,
    pub screen_transition_fix: bool,
    pub low_battery_icon: u8,
}

impl SysCtl {
    /// Pack into the wire word.
    #[must_use]
    pub const fn to_word(&self) -> u16 {
        (self.mute as u16)
            | ((self.frame_blend as u16) << 1)
            | (self.color_correction.bits() << 2)
            | (((self.player_number & 0x7F) as u16) << 4)
            | ((self.reject_diagonals as u16) << 11)
            | ((self.screen_transition_fix as u16) << 12)
            | (((self.low_battery_icon & 0x07) as u16) << 13)
    }
}

/// Palette words ready for the wire, one per palette register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PaletteWords {
    pub background: u64,
    pub sprite0: u64,
    pub sprite1: u64,
}
