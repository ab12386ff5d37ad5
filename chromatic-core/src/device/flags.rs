//! Pending command categories.

use core::ops::{BitOr, BitOrAssign};

/// Bitfield of command categories waiting for the writer.
///
/// Setting a category that is already pending is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxFlags(pub u16);

impl TxFlags {
    pub const NONE: Self = Self(0);
    pub const BRIGHTNESS: Self = Self(1 << 0);
    pub const SYS_CTL: Self = Self(1 << 1);
    pub const FW_VERSION: Self = Self(1 << 2);
    pub const POKE_BUTTON: Self = Self(1 << 3);
    pub const PALETTE: Self = Self(1 << 4);
    pub const COLOR_TEMP: Self = Self(1 << 5);
    pub const BG_PALETTE_DATA: Self = Self(1 << 6);
    pub const CHEAT: Self = Self(1 << 7);
    pub const WRAM_SNAPSHOT: Self = Self(1 << 8);
    pub const FB_PREVIEW: Self = Self(1 << 9);

    /// Everything a full resync resends. Snapshot and preview requests are
    /// on-demand only.
    pub const RESYNC: Self = Self(
        Self::BRIGHTNESS.0
            | Self::SYS_CTL.0
            | Self::FW_VERSION.0
            | Self::POKE_BUTTON.0
            | Self::PALETTE.0
            | Self::COLOR_TEMP.0
            | Self::BG_PALETTE_DATA.0
            | Self::CHEAT.0,
    );

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for TxFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TxFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
