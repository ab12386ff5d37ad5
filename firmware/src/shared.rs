//! Statics shared between tasks.
//!
//! Cross-task handoff only goes through these primitives. The BLE task
//! never touches the cheat engine or flash directly.

use core::cell::{Cell, RefCell};

use chromatic_core::cheats::CheatButton;
use chromatic_core::config::{STATUS_CAPACITY, WRITE_CAP};
use chromatic_core::telemetry::{MemoryWindow, WINDOW_LEN};
use chromatic_core::CommandQueue;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::{String, Vec};

use crate::settings::SharedSettings;

/// Longest identity string (`XX:XX:XX:XX:XX:XX`).
pub const IDENTITY_LEN: usize = 17;

/// Work for the cheat task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheatInput {
    /// One ingest characteristic write.
    Ingest(Vec<u8, WRITE_CAP>),
    Button(CheatButton),
    /// Menu shown or hidden.
    Menu(bool),
    /// The phone announced the running game.
    GameHash(u32),
    /// Re-render the status payload.
    Refresh,
}

impl defmt::Format for CheatInput {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Ingest(data) => defmt::write!(f, "Ingest({} bytes)", data.len()),
            Self::Button(button) => defmt::write!(f, "Button({})", button),
            Self::Menu(open) => defmt::write!(f, "Menu({})", open),
            Self::GameHash(hash) => defmt::write!(f, "GameHash({=u32:08X})", hash),
            Self::Refresh => defmt::write!(f, "Refresh"),
        }
    }
}

pub type StatusBuf = Vec<u8, STATUS_CAPACITY>;

/// Device commands, drained by the device task.
pub static COMMANDS: CommandQueue<CriticalSectionRawMutex> = CommandQueue::new();

/// Live device settings read by the device writer.
pub static SETTINGS: SharedSettings = SharedSettings::new();

pub static CHEAT_INPUT: Channel<CriticalSectionRawMutex, CheatInput, 4> = Channel::new();

/// Rendered status payload served on reads.
pub static STATUS: Mutex<CriticalSectionRawMutex, RefCell<StatusBuf>> =
    Mutex::new(RefCell::new(Vec::new()));

/// Raised whenever [`STATUS`] changes.
pub static STATUS_CHANGED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Radio identity, published by the BLE task once synced.
pub static IDENTITY: Mutex<CriticalSectionRawMutex, RefCell<String<IDENTITY_LEN>>> =
    Mutex::new(RefCell::new(String::new()));

/// Game hash last reported by the co-processor.
pub static GAME_HASH: Mutex<CriticalSectionRawMutex, Cell<Option<u32>>> =
    Mutex::new(Cell::new(None));

/// Work RAM window mirrored from co-processor replies.
pub static WRAM: Mutex<CriticalSectionRawMutex, RefCell<MemoryWindow>> =
    Mutex::new(RefCell::new(MemoryWindow::new()));

/// Record a reported game hash. Returns `true` if it differs from the
/// last one, in which case the mirrored window is stale and dropped.
pub fn publish_game_hash(hash: u32) -> bool {
    let changed = GAME_HASH.lock(|cell| cell.replace(Some(hash)) != Some(hash));
    if changed {
        WRAM.lock(|window| window.borrow_mut().clear());
    }
    changed
}

pub fn game_hash() -> Option<u32> {
    GAME_HASH.lock(Cell::get)
}

/// Store a work RAM chunk. Bytes outside the window are ignored.
pub fn store_wram(address: u16, data: &[u8]) -> usize {
    WRAM.lock(|window| window.borrow_mut().write(address, data))
}

pub fn wram_snapshot() -> Option<[u8; WINDOW_LEN]> {
    WRAM.lock(|window| window.borrow().snapshot())
}

/// Copy of the identity, or `"unknown"` before sync.
pub fn identity() -> String<IDENTITY_LEN> {
    let id = IDENTITY.lock(|id| id.borrow().clone());
    if id.is_empty() {
        let mut unknown = String::new();
        let _ = unknown.push_str("unknown");
        unknown
    } else {
        id
    }
}

/// Replace the published status payload.
pub fn publish_status(payload: &[u8]) {
    STATUS.lock(|status| {
        let mut status = status.borrow_mut();
        status.clear();
        let _ = status.extend_from_slice(payload);
    });
    STATUS_CHANGED.signal(());
}
