//! Per-game persistence keys.

use chromatic_proto::fmt::write_hex_u32;

/// Longest key the store accepts.
pub const MAX_KEY_LEN: usize = 16;

/// Size of the cartridge title field hashed into a key.
pub const TITLE_LEN: usize = 16;

const DEFAULT_KEY: &str = "default";

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a, 32-bit.
#[must_use]
pub fn fnv1a32(data: &[u8]) -> u32 {
    data.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Namespace for one game's persisted cheats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameKey(heapless::String<MAX_KEY_LEN>);

impl GameKey {
    /// Key from explicit text: ASCII only, truncated to [`MAX_KEY_LEN`],
    /// `"default"` when nothing usable remains.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut key = heapless::String::new();
        for c in text.chars().filter(char::is_ascii).take(MAX_KEY_LEN) {
            // Capacity is exactly MAX_KEY_LEN ASCII chars.
            let _ = key.push(c);
        }
        if key.is_empty() {
            Self::default()
        } else {
            Self(key)
        }
    }

    /// Key rendered as 8 uppercase hex digits of the byte-swapped hash,
    /// so `0x12345678` becomes `"78563412"`.
    #[must_use]
    pub fn from_hash(hash: u32) -> Self {
        let mut digits = [0u8; 8];
        write_hex_u32(&mut digits, hash.swap_bytes());
        Self::new(core::str::from_utf8(&digits).unwrap_or(DEFAULT_KEY))
    }

    /// Key derived from a cartridge title field.
    #[must_use]
    pub fn from_title(title: &[u8; TITLE_LEN]) -> Self {
        Self::from_hash(fnv1a32(title))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GameKey {
    fn default() -> Self {
        let mut key = heapless::String::new();
        let _ = key.push_str(DEFAULT_KEY);
        Self(key)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for GameKey {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}
