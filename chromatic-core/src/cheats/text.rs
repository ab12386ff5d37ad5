//! Newline-delimited code import and export.
//!
//! ```text
//! 0163A0DA      add (disabled)
//! - 91FF34C1    remove, case-insensitive
//! ```

use chromatic_proto::{CheatCode, CODE_LEN, MAX_CHEAT_SLOTS};

use super::engine::{CheatEngine, Cursor};
use super::slot::CheatSlot;
use super::{CheatSink, CheatStore};

impl<S: CheatStore, P: CheatSink> CheatEngine<S, P> {
    /// Apply a block of code lines.
    ///
    /// Returns how many adds and removes took effect. Any change is pushed
    /// to the device and persisted.
    pub fn import_codes(&mut self, text: &[u8]) -> usize {
        self.ensure_loaded();
        let previous = self.count;
        let mut added = 0;
        let mut removed = 0;

        for line in text.split(|&c| c == b'\n' || c == b'\r') {
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            let (remove, body) = match line.strip_prefix(b"-") {
                Some(rest) => (true, rest.trim_ascii_start()),
                None => (false, line),
            };
            let Ok(code) = CheatCode::parse(body) else {
                debug!("cheats: skipping malformed line");
                continue;
            };

            let existing = self.find(&code);
            if remove {
                if let Some(index) = existing {
                    self.remove_at(index);
                    removed += 1;
                }
                continue;
            }
            if existing.is_some() || self.count >= MAX_CHEAT_SLOTS {
                continue;
            }

            let slot = CheatSlot::new(code);
            if !slot.is_valid() {
                debug!("cheats: skipping unsupported code {}", code.as_str());
                continue;
            }
            if self.count == 1 && self.slots[0].is_placeholder() {
                self.slots[0] = slot;
            } else {
                self.slots[self.count] = slot;
                self.count += 1;
            }
            added += 1;
        }

        self.clamp_active();
        self.cursor = Cursor::Digit(0);

        let applied = added + removed;
        if applied > 0 {
            info!("cheats: applied {} (+{} -{})", applied, added, removed);
            self.dirty = true;
            self.push_slots(previous.max(self.count));
            self.save();
        }
        applied
    }

    /// Write valid codes as newline-separated text into `out`.
    ///
    /// Stops at the last whole code that fits. Returns the bytes written.
    pub fn export_slots(&mut self, out: &mut [u8]) -> usize {
        self.ensure_loaded();
        let mut used = 0;
        for slot in self.slots().iter().filter(|s| s.is_valid()) {
            let sep = usize::from(used > 0);
            if used + sep + CODE_LEN > out.len() {
                break;
            }
            if sep == 1 {
                out[used] = b'\n';
            }
            out[used + sep..used + sep + CODE_LEN].copy_from_slice(slot.code().as_bytes());
            used += sep + CODE_LEN;
        }
        used
    }

    fn find(&self, code: &CheatCode) -> Option<usize> {
        self.slots().iter().position(|s| s.code().matches(code.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::cheats::testing::engine;
    use chromatic_proto::CheatPoke;
    use std::vec;
    use std::vec::Vec;

    fn codes<S: CheatStore, P: CheatSink>(e: &CheatEngine<S, P>) -> Vec<&str> {
        e.slots().iter().map(|s| s.code().as_str()).collect()
    }

    #[test]
    fn test_add_then_remove_cancels_out() {
        let mut e = engine();
        assert_eq!(e.import_codes(b"01000000\n-01000000"), 2);
        assert!(e.slots().is_empty());
    }

    #[test]
    fn test_import_trims_and_normalizes() {
        let mut e = engine();
        assert_eq!(e.import_codes(b"  0163a0da \r\n\t91ff34c1\n\n"), 2);
        assert_eq!(codes(&e), vec!["0163A0DA", "91FF34C1"]);
        assert!(e.slots().iter().all(|s| !s.is_enabled()));
    }

    #[test]
    fn test_duplicate_is_not_added() {
        let mut e = engine();
        e.import_codes(b"0163A0DA");
        assert_eq!(e.import_codes(b"0163a0da"), 0);
        assert_eq!(e.slots().len(), 1);
    }

    #[test]
    fn test_remove_compacts_in_order() {
        let mut e = engine();
        e.import_codes(b"0101C000\n0102C000\n0103C000\n0104C000");
        assert_eq!(e.import_codes(b"- 0102c000"), 1);
        assert_eq!(codes(&e), vec!["0101C000", "0103C000", "0104C000"]);

        // Removing something absent changes nothing
        assert_eq!(e.import_codes(b"-0199C000"), 0);
        assert_eq!(e.slots().len(), 3);
    }

    #[test]
    fn test_import_replaces_placeholder() {
        let mut e = engine();
        e.open();
        assert_eq!(e.import_codes(b"0163A0DA"), 1);
        assert_eq!(codes(&e), vec!["0163A0DA"]);
    }

    #[test]
    fn test_import_rejects_bad_lines() {
        let mut e = engine();
        let applied = e.import_codes(b"0163A0D\n0163A0DA00\nZZ000000\n02000000\n0163A0DA");
        assert_eq!(applied, 1);
        assert_eq!(codes(&e), vec!["0163A0DA"]);
    }

    #[test]
    fn test_import_stops_at_capacity() {
        let mut e = engine();
        let text = b"0101C000\n0102C000\n0103C000\n0104C000\n0105C000\n0106C000\n0107C000\n0108C000\n0109C000";
        assert_eq!(e.import_codes(text), 8);
        assert_eq!(e.slots().len(), MAX_CHEAT_SLOTS);
    }

    #[test]
    fn test_import_persists_and_disables_removed_live_slot() {
        let mut e = engine();
        e.import_codes(b"0163A0DA");
        assert_eq!(e.store().saves, 1);
        e.toggle_active();
        e.sink().take();

        e.import_codes(b"-0163A0DA");
        assert_eq!(e.store().saves, 3);
        assert_eq!(
            e.sink().take(),
            vec![CheatPoke::new(0, false, 0x01, 0, 0).unwrap()]
        );
    }

    #[test]
    fn test_export_only_valid_codes() {
        let mut e = engine();
        e.import_codes(b"0163A0DA\n91FF34C1");
        e.on_button(crate::cheats::CheatButton::A);
        e.on_button(crate::cheats::CheatButton::Start); // placeholder, valid
        e.on_button(crate::cheats::CheatButton::Right);
        e.on_button(crate::cheats::CheatButton::Up); // "0200..." -> invalid

        let mut out = [0u8; 64];
        let len = e.export_slots(&mut out);
        assert_eq!(&out[..len], b"0163A0DA\n91FF34C1");
    }

    #[test]
    fn test_export_truncates_at_line_boundary() {
        let mut e = engine();
        e.import_codes(b"0101C000\n0102C000\n0103C000");
        let mut out = [0u8; 20];
        let len = e.export_slots(&mut out);
        assert_eq!(&out[..len], b"0101C000\n0102C000");

        let mut tiny = [0u8; 7];
        assert_eq!(e.export_slots(&mut tiny), 0);
    }

    #[test]
    fn test_export_import_reproduces_codes() {
        let mut source = engine();
        source.import_codes(b"0163A0DA\n91FF34C1\n0105D2C8");
        let mut out = [0u8; 128];
        let len = source.export_slots(&mut out);

        let mut copy = engine();
        assert_eq!(copy.import_codes(&out[..len]), 3);
        assert_eq!(codes(&copy), codes(&source));
    }
}
