//! Persisted cheat record layout.
//!
//! ```text
//! version:u8 slot_count:u8 active_index:u8 reserved:u8 slots[8]
//! ```
//!
//! Each slot occupies 16 bytes:
//!
//! ```text
//! code[9] (8 chars + NUL), type, value, pad, addr (LE u16), enabled, valid
//! ```

use crate::cheat::CheatCode;
use crate::payload::MAX_CHEAT_SLOTS;

/// Current record version.
pub const RECORD_VERSION: u8 = 1;

/// Serialized size of one slot.
pub const SLOT_SIZE: usize = 16;

/// Serialized size of a whole record.
pub const RECORD_SIZE: usize = HEADER_SIZE + MAX_CHEAT_SLOTS * SLOT_SIZE;

const HEADER_SIZE: usize = 4;

/// Error type for record decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Stored blob is not [`RECORD_SIZE`] bytes.
    Length,
    /// Stored blob was written by an unknown version.
    Version(u8),
    /// Slot count exceeds the slot table.
    SlotCount(u8),
}

impl core::fmt::Display for RecordError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Length => write!(f, "record has wrong length"),
            Self::Version(v) => write!(f, "unsupported record version {}", v),
            Self::SlotCount(n) => write!(f, "slot count {} out of range", n),
        }
    }
}

/// One persisted slot.
///
/// Only the code text is authoritative; the decoded fields are stored for
/// compatibility with earlier records and recomputed on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoredSlot {
    pub code: CheatCode,
    pub raw_type: u8,
    pub value: u8,
    pub address: u16,
    pub enabled: bool,
    pub valid: bool,
}

impl StoredSlot {
    fn write(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(self.code.as_bytes());
        out[8] = 0;
        out[9] = self.raw_type;
        out[10] = self.value;
        out[11] = 0;
        out[12..14].copy_from_slice(&self.address.to_le_bytes());
        out[14] = self.enabled as u8;
        out[15] = self.valid as u8;
    }

    fn read(raw: &[u8]) -> Self {
        // Garbage text falls back to the default code; callers revalidate.
        let code = CheatCode::parse(&raw[..8]).unwrap_or_default();
        Self {
            code,
            raw_type: raw[9],
            value: raw[10],
            address: u16::from_le_bytes([raw[12], raw[13]]),
            enabled: raw[14] != 0,
            valid: raw[15] != 0,
        }
    }
}

/// Fixed-size persisted cheat state for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CheatRecord {
    pub slot_count: u8,
    pub active_index: u8,
    pub slots: [StoredSlot; MAX_CHEAT_SLOTS],
}

impl CheatRecord {
    /// Serialize the record.
    #[must_use]
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0] = RECORD_VERSION;
        out[1] = self.slot_count;
        out[2] = self.active_index;
        for (slot, chunk) in self
            .slots
            .iter()
            .zip(out[HEADER_SIZE..].chunks_exact_mut(SLOT_SIZE))
        {
            slot.write(chunk);
        }
        out
    }

    /// Deserialize a record. An active index past the last slot becomes 0.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] if the blob is not a version 1 record.
    pub fn decode(raw: &[u8]) -> Result<Self, RecordError> {
        if raw.len() != RECORD_SIZE {
            return Err(RecordError::Length);
        }
        if raw[0] != RECORD_VERSION {
            return Err(RecordError::Version(raw[0]));
        }
        let slot_count = raw[1];
        if slot_count as usize > MAX_CHEAT_SLOTS {
            return Err(RecordError::SlotCount(slot_count));
        }
        let active_index = if raw[2] < slot_count { raw[2] } else { 0 };

        let mut slots = [StoredSlot::default(); MAX_CHEAT_SLOTS];
        for (slot, chunk) in slots
            .iter_mut()
            .zip(raw[HEADER_SIZE..].chunks_exact(SLOT_SIZE))
        {
            *slot = StoredSlot::read(chunk);
        }

        Ok(Self {
            slot_count,
            active_index,
            slots,
        })
    }
}
