//! Device command identifiers and protocol versions.

/// Command identifiers understood by the co-processor.
///
/// Ids `0x0..=0x3` are reserved and never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandId {
    SysCtl = 0x04,
    Backlight = 0x05,
    FirmwareVersion = 0x06,
    PokeButton = 0x09,
    BackgroundPalette = 0x0B,
    SpritePalette = 0x0C,
    BackgroundPaletteData = 0x0D,
    CheatPoke = 0x0E,
    WramSnapshot = 0x0F,
    FramebufferPreview = 0x10,
    ColorTemperature = 0x11,
}

/// Number of command ids, reserved ones included.
pub const NUM_COMMAND_IDS: u8 = 0x12;

impl CommandId {
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Look up a command by its wire id.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x04 => Self::SysCtl,
            0x05 => Self::Backlight,
            0x06 => Self::FirmwareVersion,
            0x09 => Self::PokeButton,
            0x0B => Self::BackgroundPalette,
            0x0C => Self::SpritePalette,
            0x0D => Self::BackgroundPaletteData,
            0x0E => Self::CheatPoke,
            0x0F => Self::WramSnapshot,
            0x10 => Self::FramebufferPreview,
            0x11 => Self::ColorTemperature,
            _ => return None,
        })
    }
}

/// Framing negotiated with the co-processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolVersion {
    /// Fixed 4-byte frames: `marker, id, payload[2]`.
    Legacy,
    /// `marker, id, len, payload[len], crc8`.
    #[default]
    Versioned,
}

impl ProtocolVersion {
    /// First byte of every frame in this version.
    #[inline]
    #[must_use]
    pub const fn marker(self) -> u8 {
        match self {
            Self::Legacy => LEGACY_MARKER,
            Self::Versioned => VERSIONED_MARKER,
        }
    }
}

/// Marker byte opening a legacy frame.
pub const LEGACY_MARKER: u8 = 0x5A;

/// Marker byte opening a versioned frame.
pub const VERSIONED_MARKER: u8 = 0xA5;
