//! Slot table state machine and persistence.

use chromatic_proto::record::{CheatRecord, StoredSlot, RECORD_SIZE};
use chromatic_proto::{CheatCode, CheatPoke, CODE_LEN, MAX_CHEAT_SLOTS};

use super::key::{GameKey, TITLE_LEN};
use super::slot::CheatSlot;
use super::{CheatSink, CheatStore};

/// Interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Browse,
    Edit,
}

/// Edit cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cursor {
    /// The slot label; Up/Down select slots.
    Label,
    /// One of the 8 code digits.
    Digit(u8),
}

impl Cursor {
    fn next(self) -> Self {
        match self {
            Self::Label => Self::Digit(0),
            Self::Digit(d) if (d as usize) + 1 < CODE_LEN => Self::Digit(d + 1),
            Self::Digit(_) => Self::Label,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Label => Self::Digit(CODE_LEN as u8 - 1),
            Self::Digit(0) => Self::Label,
            Self::Digit(d) => Self::Digit(d - 1),
        }
    }
}

/// Button presses the engine reacts to. Releases are never delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CheatButton {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

/// Cheat slots for the active game.
pub struct CheatEngine<S, P> {
    store: S,
    sink: P,
    pub(super) slots: [CheatSlot; MAX_CHEAT_SLOTS],
    pub(super) count: usize,
    pub(super) active: usize,
    mode: Mode,
    pub(super) cursor: Cursor,
    /// Enable state last pushed to the device, per slot.
    live: [bool; MAX_CHEAT_SLOTS],
    key: GameKey,
    /// A record exists for this key, or one has been written.
    persisted: bool,
    reload_pending: bool,
    pub(super) dirty: bool,
}

impl<S: CheatStore, P: CheatSink> CheatEngine<S, P> {
    /// Create an engine for the default game key. Nothing is read from the
    /// store until the first operation.
    pub fn new(store: S, sink: P) -> Self {
        Self {
            store,
            sink,
            slots: [CheatSlot::default(); MAX_CHEAT_SLOTS],
            count: 0,
            active: 0,
            mode: Mode::Browse,
            cursor: Cursor::Label,
            live: [false; MAX_CHEAT_SLOTS],
            key: GameKey::default(),
            persisted: false,
            reload_pending: true,
            dirty: false,
        }
    }

    /// Effective slots. Call [`Self::open`] first for freshly loaded state.
    #[inline]
    #[must_use]
    pub fn slots(&self) -> &[CheatSlot] {
        &self.slots[..self.count]
    }

    #[inline]
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.mode == Mode::Edit
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn has_enabled(&self) -> bool {
        self.slots().iter().any(CheatSlot::is_enabled)
    }

    #[inline]
    #[must_use]
    pub fn game_key(&self) -> &GameKey {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn into_parts(self) -> (S, P) {
        (self.store, self.sink)
    }

    /// Switch to another game's slots. They are loaded on next access.
    ///
    /// Unsaved edits are written under the old key first.
    pub fn set_game_key(&mut self, key: GameKey) {
        if key == self.key {
            return;
        }
        if self.dirty && !self.reload_pending {
            self.save();
        }
        info!("cheats: game key {}", key.as_str());
        self.key = key;
        self.reload_pending = true;
    }

    pub fn set_game_hash(&mut self, hash: u32) {
        self.set_game_key(GameKey::from_hash(hash));
    }

    pub fn set_game_title(&mut self, title: &[u8; TITLE_LEN]) {
        self.set_game_key(GameKey::from_title(title));
    }

    /// The menu became visible: load if needed and make sure there is a
    /// slot to show.
    pub fn open(&mut self) {
        self.ensure_loaded();
        if self.count == 0 {
            self.slots[0] = CheatSlot::default();
            self.count = 1;
            self.active = 0;
        }
    }

    /// The menu was left: flush edits and reload on the next open.
    pub fn close(&mut self) {
        if self.dirty {
            self.save();
        }
        self.mode = Mode::Browse;
        self.cursor = Cursor::Label;
        self.reload_pending = true;
    }

    /// React to one button press.
    pub fn on_button(&mut self, button: CheatButton) {
        self.ensure_loaded();
        match button {
            CheatButton::Up => self.step(true),
            CheatButton::Down => self.step(false),
            CheatButton::Left if self.is_editing() => self.cursor = self.cursor.prev(),
            CheatButton::Right if self.is_editing() => self.cursor = self.cursor.next(),
            CheatButton::A => self.toggle_mode(),
            CheatButton::B => {
                self.toggle_active();
            }
            CheatButton::Start if self.is_editing() => self.append_slot(),
            CheatButton::Select if self.is_editing() => self.remove_active(),
            _ => {}
        }
    }

    /// Flip the enable state of the selected slot, push it and persist.
    ///
    /// Returns `false` if there is no slot or its code does not decode.
    pub fn toggle_active(&mut self) -> bool {
        self.ensure_loaded();
        if self.count == 0 {
            return false;
        }
        let slot = &mut self.slots[self.active];
        let target = !slot.is_enabled();
        if !slot.set_enabled(target) {
            debug!("cheats: slot {} invalid, not enabling", self.active);
            return false;
        }
        self.push_slots(self.count);
        self.dirty = true;
        self.save();
        true
    }

    /// Up/Down: change a digit, or move the selection.
    fn step(&mut self, up: bool) {
        if self.count == 0 {
            return;
        }
        match (self.mode, self.cursor) {
            (Mode::Edit, Cursor::Digit(d)) => self.edit_digit(d as usize, up),
            _ => {
                self.active = if up {
                    (self.active + self.count - 1) % self.count
                } else {
                    (self.active + 1) % self.count
                };
            }
        }
    }

    fn edit_digit(&mut self, digit: usize, up: bool) {
        let index = self.active;
        if self.slots[index].is_enabled() {
            // Never leave a half-edited code live on the device.
            self.slots[index].set_enabled(false);
            self.push_slot(index);
        }

        let mut code = *self.slots[index].code();
        let n = code.nibble(digit);
        code.set_nibble(digit, if up { (n + 1) & 0xF } else { n.wrapping_sub(1) & 0xF });
        self.slots[index].set_code(code);
        self.dirty = true;
    }

    fn toggle_mode(&mut self) {
        match self.mode {
            Mode::Browse => {
                if self.count == 0 {
                    self.slots[0] = CheatSlot::default();
                    self.count = 1;
                    self.active = 0;
                }
                self.mode = Mode::Edit;
                self.cursor = Cursor::Label;
            }
            Mode::Edit => {
                self.mode = Mode::Browse;
                if self.dirty {
                    self.save();
                }
            }
        }
    }

    fn append_slot(&mut self) {
        if self.count >= MAX_CHEAT_SLOTS {
            return;
        }
        self.slots[self.count] = CheatSlot::default();
        self.active = self.count;
        self.count += 1;
        self.cursor = Cursor::Digit(0);
        self.dirty = true;
        self.push_slots(self.count);
    }

    fn remove_active(&mut self) {
        let previous = self.count;
        match self.count {
            0 => return,
            1 if self.slots[0].is_placeholder() => return,
            1 => {
                self.slots[0] = CheatSlot::default();
                self.active = 0;
                self.cursor = Cursor::Digit(0);
            }
            _ => self.remove_at(self.active),
        }
        self.dirty = true;
        self.push_slots(previous);
    }

    /// Remove slot `index`, shifting later slots down.
    pub(super) fn remove_at(&mut self, index: usize) {
        self.slots.copy_within(index + 1..self.count, index);
        self.count -= 1;
        self.slots[self.count] = CheatSlot::default();
        self.clamp_active();
    }

    pub(super) fn clamp_active(&mut self) {
        if self.active >= self.count {
            self.active = self.count.saturating_sub(1);
        }
    }

    /// Bring the device's copy of slot `index` in line with the table.
    fn push_slot(&mut self, index: usize) {
        let slot = &self.slots[index];
        let effective = index < self.count;
        let slot_id = index as u8;

        if effective && slot.is_enabled() {
            if let Some(poke) = slot.patch().and_then(|p| CheatPoke::from_patch(slot_id, true, p)) {
                self.sink.send_cheat(poke);
                self.live[index] = true;
            }
        } else if self.live[index] {
            let poke = match slot.patch() {
                Some(p) if effective => CheatPoke::from_patch(slot_id, false, p),
                _ => CheatPoke::new(slot_id, false, 0x01, 0, 0),
            };
            if let Some(poke) = poke {
                self.sink.send_cheat(poke);
            }
            self.live[index] = false;
        }
    }

    /// Push the first `upto` slots; pass the larger of the old and new count
    /// so vacated slots get switched off.
    pub(super) fn push_slots(&mut self, upto: usize) {
        for index in 0..upto.min(MAX_CHEAT_SLOTS) {
            self.push_slot(index);
        }
    }

    pub(super) fn ensure_loaded(&mut self) {
        if self.reload_pending {
            self.reload_pending = false;
            self.load();
        }
    }

    fn load(&mut self) {
        let previous = self.count;
        self.slots = [CheatSlot::default(); MAX_CHEAT_SLOTS];
        self.count = 0;
        self.active = 0;
        self.persisted = false;
        self.dirty = false;

        let mut raw = [0u8; RECORD_SIZE];
        match self.store.load(self.key.as_str(), &mut raw) {
            Ok(true) => match CheatRecord::decode(&raw) {
                Ok(record) => {
                    for (slot, stored) in self.slots.iter_mut().zip(record.slots.iter()) {
                        *slot = CheatSlot::from_stored(stored);
                    }
                    self.count = record.slot_count as usize;
                    self.active = record.active_index as usize;
                    self.persisted = true;
                    info!("cheats: loaded {} slots for {}", self.count, self.key.as_str());
                }
                Err(e) => warn!("cheats: ignoring stored record: {:?}", e),
            },
            Ok(false) => debug!("cheats: nothing stored for {}", self.key.as_str()),
            Err(_) => error!("cheats: load failed for {}", self.key.as_str()),
        }

        // Slots past the new count only need switching off.
        self.push_slots(previous.max(self.count));
    }

    /// Still the untouched single placeholder nobody has edited.
    fn is_pristine(&self) -> bool {
        self.count <= 1 && !self.slots[0].is_enabled() && *self.slots[0].code() == CheatCode::DEFAULT
    }

    /// Write the slot table if it changed.
    ///
    /// Returns `true` if a record was written.
    pub fn save(&mut self) -> bool {
        if !self.persisted && self.is_pristine() {
            debug!("cheats: skipping save of default state");
            return false;
        }
        if !self.dirty {
            return false;
        }

        let mut record = CheatRecord {
            slot_count: self.count as u8,
            active_index: self.active as u8,
            slots: [StoredSlot::default(); MAX_CHEAT_SLOTS],
        };
        for (stored, slot) in record.slots.iter_mut().zip(self.slots()) {
            *stored = slot.to_stored();
        }

        match self.store.save(self.key.as_str(), &record.encode()) {
            Ok(()) => {
                info!("cheats: saved {} slots for {}", self.count, self.key.as_str());
                self.persisted = true;
                self.dirty = false;
                true
            }
            Err(_) => {
                error!("cheats: save failed for {}", self.key.as_str());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::cheats::testing::{engine, MemoryStore, RecordingSink};
    use std::vec;

    #[test]
    fn test_open_creates_placeholder_without_saving() {
        let mut e = engine();
        e.open();
        assert_eq!(e.slots().len(), 1);
        assert!(e.slots()[0].is_placeholder());

        e.close();
        assert_eq!(e.store().saves, 0);
    }

    #[test]
    fn test_browse_selection_wraps() {
        let mut e = engine();
        e.import_codes(b"0101C000\n0102C000\n0103C000");
        assert_eq!(e.active_index(), 0);

        e.on_button(CheatButton::Up);
        assert_eq!(e.active_index(), 2);
        e.on_button(CheatButton::Down);
        assert_eq!(e.active_index(), 0);
        e.on_button(CheatButton::Down);
        assert_eq!(e.active_index(), 1);
    }

    #[test]
    fn test_toggle_pushes_and_persists() {
        let mut e = engine();
        e.import_codes(b"0163A0DA");
        let saves = e.store().saves;

        e.on_button(CheatButton::B);
        assert!(e.slots()[0].is_enabled());
        assert!(e.has_enabled());
        assert_eq!(e.store().saves, saves + 1);

        let pokes = e.sink().take();
        assert_eq!(pokes, vec![CheatPoke::new(0, true, 0x01, 0xDAA0, 0x63).unwrap()]);

        e.on_button(CheatButton::B);
        assert_eq!(
            e.sink().take(),
            vec![CheatPoke::new(0, false, 0x01, 0xDAA0, 0x63).unwrap()]
        );
    }

    #[test]
    fn test_toggle_rejects_invalid_code() {
        let mut e = engine();
        e.open();
        e.on_button(CheatButton::A);
        e.on_button(CheatButton::Right); // digit 0
        e.on_button(CheatButton::Up); // "11000000": unsupported type
        assert!(!e.slots()[0].is_valid());

        e.on_button(CheatButton::A);
        e.on_button(CheatButton::B);
        assert!(!e.slots()[0].is_enabled());
        assert!(e.sink().take().is_empty());
    }

    #[test]
    fn test_edit_disables_enabled_slot_first() {
        let mut e = engine();
        e.import_codes(b"0163A0DA");
        e.on_button(CheatButton::B);
        e.sink().take();

        e.on_button(CheatButton::A);
        assert!(e.is_editing());
        for _ in 0..8 {
            e.on_button(CheatButton::Right);
        }
        assert_eq!(e.cursor(), Cursor::Digit(7));
        e.on_button(CheatButton::Down);

        let slot = e.slots()[0];
        assert!(!slot.is_enabled());
        assert_eq!(slot.code().as_str(), "0163A0D9");
        // The disable went out before the code changed
        assert_eq!(
            e.sink().take(),
            vec![CheatPoke::new(0, false, 0x01, 0xDAA0, 0x63).unwrap()]
        );

        // Stays disabled after further edits
        e.on_button(CheatButton::Up);
        assert!(!e.slots()[0].is_enabled());
        assert!(e.sink().take().is_empty());
    }

    #[test]
    fn test_digit_wraps() {
        let mut e = engine();
        e.open();
        e.on_button(CheatButton::A);
        e.on_button(CheatButton::Left); // digit 7
        assert_eq!(e.cursor(), Cursor::Digit(7));
        e.on_button(CheatButton::Down);
        assert_eq!(e.slots()[0].code().as_str(), "0100000F");
        e.on_button(CheatButton::Up);
        assert_eq!(e.slots()[0].code().as_str(), "01000000");

        e.on_button(CheatButton::Right);
        assert_eq!(e.cursor(), Cursor::Label);
    }

    #[test]
    fn test_leaving_edit_saves() {
        let mut e = engine();
        e.open();
        e.on_button(CheatButton::A);
        e.on_button(CheatButton::Right);
        e.on_button(CheatButton::Right); // digit 1
        e.on_button(CheatButton::Up); // "02000000"
        assert!(e.is_dirty());
        e.on_button(CheatButton::A);
        assert!(!e.is_dirty());
        assert_eq!(e.store().saves, 1);
    }

    #[test]
    fn test_start_appends_until_full() {
        let mut e = engine();
        e.open();
        e.on_button(CheatButton::A);
        for _ in 0..10 {
            e.on_button(CheatButton::Start);
        }
        assert_eq!(e.slots().len(), MAX_CHEAT_SLOTS);
        assert_eq!(e.active_index(), MAX_CHEAT_SLOTS - 1);
        assert_eq!(e.cursor(), Cursor::Digit(0));
    }

    #[test]
    fn test_select_removes_or_resets() {
        let mut e = engine();
        e.import_codes(b"0101C000\n0102C000\n0103C000");
        e.on_button(CheatButton::Down); // select 1
        e.on_button(CheatButton::A);
        e.on_button(CheatButton::Select);
        let codes: std::vec::Vec<&str> = e.slots().iter().map(|s| s.code().as_str()).collect();
        assert_eq!(codes, vec!["0101C000", "0103C000"]);

        e.on_button(CheatButton::Select);
        e.on_button(CheatButton::Select);
        assert_eq!(e.slots().len(), 1);
        assert!(e.slots()[0].is_placeholder());

        // Sole placeholder cannot be removed
        e.on_button(CheatButton::Select);
        assert_eq!(e.slots().len(), 1);
    }

    #[test]
    fn test_resetting_sole_slot_rewinds_cursor() {
        let mut e = engine();
        e.import_codes(b"0163A0DA");
        e.on_button(CheatButton::A);
        e.on_button(CheatButton::Left);
        e.on_button(CheatButton::Left);
        assert_eq!(e.cursor(), Cursor::Digit(6));

        e.on_button(CheatButton::Select);
        assert!(e.slots()[0].is_placeholder());
        assert_eq!(e.active_index(), 0);
        assert_eq!(e.cursor(), Cursor::Digit(0));
    }

    #[test]
    fn test_removing_live_slot_switches_it_off() {
        let mut e = engine();
        e.import_codes(b"0101C000\n0102C000");
        e.on_button(CheatButton::B); // enable slot 0
        e.sink().take();

        e.on_button(CheatButton::A);
        e.on_button(CheatButton::Select); // remove slot 0
        // Slot 1 moved down; its old position is switched off on the device
        assert_eq!(
            e.sink().take(),
            vec![CheatPoke::new(0, false, 0x01, 0x00C0, 0x02).unwrap()]
        );
    }

    #[test]
    fn test_pristine_state_is_not_saved() {
        let mut e = engine();
        e.open();
        e.dirty = true;
        assert!(!e.save());
        assert_eq!(e.store().saves, 0);
    }

    #[test]
    fn test_state_survives_reload() {
        let mut e = engine();
        e.import_codes(b"0163A0DA\n91FF34C1");
        e.on_button(CheatButton::Down);
        e.on_button(CheatButton::B);

        let (store, _) = e.into_parts();
        let mut e = CheatEngine::new(store, RecordingSink::default());
        e.open();
        assert_eq!(e.slots().len(), 2);
        assert_eq!(e.active_index(), 1);
        assert!(e.slots()[1].is_enabled());
        // Restored live slot is pushed to the device
        assert_eq!(
            e.sink().take(),
            vec![CheatPoke::new(1, true, 0x91, 0xC134, 0xFF).unwrap()]
        );
    }

    #[test]
    fn test_game_key_switch_reloads() {
        let mut e = engine();
        e.import_codes(b"0163A0DA");
        e.set_game_hash(0x1234_5678);
        assert_eq!(e.game_key().as_str(), "78563412");
        e.open();
        assert!(e.slots()[0].is_placeholder());

        e.set_game_key(GameKey::default());
        e.open();
        assert_eq!(e.slots()[0].code().as_str(), "0163A0DA");
    }

    #[test]
    fn test_corrupt_record_is_ignored() {
        let mut store = MemoryStore::default();
        let mut raw = [0u8; RECORD_SIZE];
        raw[0] = 9;
        store.records.insert("default".into(), raw);

        let mut e = CheatEngine::new(store, RecordingSink::default());
        e.open();
        assert_eq!(e.slots().len(), 1);
        assert!(e.slots()[0].is_placeholder());
    }

    #[test]
    fn test_dirty_state_saved_before_key_switch() {
        let mut e = engine();
        e.open();
        e.on_button(CheatButton::A);
        e.on_button(CheatButton::Right);
        e.on_button(CheatButton::Right);
        e.on_button(CheatButton::Up); // "02000000"

        e.set_game_key(GameKey::new("other"));
        assert!(e.store().records.contains_key("default"));
        assert!(!e.is_dirty());
    }
}
