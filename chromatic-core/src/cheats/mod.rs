//! Cheat engine: slot table, interactive editing, text import/export and
//! per-game persistence.
//!
//! The engine owns up to [`MAX_CHEAT_SLOTS`] slots for the active game. It
//! reaches the outside world through two narrow traits:
//!
//! - [`CheatStore`]: blocking key/value persistence of the slot record
//! - [`CheatSink`]: cheat pokes bound for the co-processor
//!
//! # Modes
//!
//! ```text
//! Browse ──A──▶ Edit
//!   ▲            │
//!   └─────A──────┘  (saves if dirty)
//! ```
//!
//! Browse selects slots and toggles them with B. Edit moves a cursor over
//! the slot label and the 8 hex digits. A slot being edited is always
//! disabled on the device first.

mod engine;
mod key;
mod slot;
mod text;

#[cfg(test)]
pub(crate) mod testing;

pub use chromatic_proto::MAX_CHEAT_SLOTS;
use chromatic_proto::record::RECORD_SIZE;
use chromatic_proto::CheatPoke;

pub use engine::{CheatButton, CheatEngine, Cursor, Mode};
pub use key::{fnv1a32, GameKey, MAX_KEY_LEN, TITLE_LEN};
pub use slot::CheatSlot;

/// Blocking persistence for cheat records.
///
/// Stores raw records so a corrupt or foreign blob is simply ignored by the
/// engine.
pub trait CheatStore {
    type Error: core::fmt::Debug;

    /// Read the record stored under `key` into `buf`.
    ///
    /// Returns `Ok(false)` if nothing is stored.
    fn load(&mut self, key: &str, buf: &mut [u8; RECORD_SIZE]) -> Result<bool, Self::Error>;

    /// Replace the record stored under `key`.
    fn save(&mut self, key: &str, record: &[u8; RECORD_SIZE]) -> Result<(), Self::Error>;
}

/// Destination for cheat pokes.
pub trait CheatSink {
    fn send_cheat(&self, poke: CheatPoke);
}

impl<T: CheatSink + ?Sized> CheatSink for &T {
    fn send_cheat(&self, poke: CheatPoke) {
        (**self).send_cheat(poke)
    }
}
