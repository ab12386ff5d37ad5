//! Coalescing request queue between producers and the device writer.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;

use chromatic_proto::{CheatPoke, ProtocolVersion, MAX_CHEAT_SLOTS};

use super::flags::TxFlags;
use crate::cheats::CheatSink;

/// Highest color temperature level.
pub const MAX_COLOR_TEMP: u8 = 5;

/// Resyncs issued at boot while the co-processor comes up.
pub const BOOT_RESYNC_COUNT: usize = 6;

/// Gap between boot resyncs.
pub const BOOT_RESYNC_GAP_MS: u32 = 10;

#[derive(Clone, Copy)]
struct Pending {
    flags: TxFlags,
    color_temp: u8,
    /// Last poke per device slot, kept so a resync can replay it.
    cheats: [Option<CheatPoke>; MAX_CHEAT_SLOTS],
    /// Slots whose poke has not been written yet.
    cheat_mask: u8,
    version: ProtocolVersion,
    paused: bool,
}

impl Pending {
    fn replay_cheats(&mut self) {
        for (slot, poke) in self.cheats.iter().enumerate() {
            if poke.is_some() {
                self.cheat_mask |= 1 << slot;
            }
        }
    }
}

/// Everything the writer took in one drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Drained {
    pub flags: TxFlags,
    pub color_temp: u8,
    /// Latest unwritten poke per device slot.
    pub cheats: [Option<CheatPoke>; MAX_CHEAT_SLOTS],
    pub version: ProtocolVersion,
}

/// Requests waiting for the device writer.
///
/// Any context may request; only the writer takes. Payload-bearing
/// categories keep just the latest payload.
pub struct CommandQueue<M: RawMutex> {
    pending: Mutex<M, RefCell<Pending>>,
    wake: Signal<M, ()>,
}

impl<M: RawMutex> CommandQueue<M> {
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(RefCell::new(Pending {
                flags: TxFlags::NONE,
                color_temp: 0,
                cheats: [None; MAX_CHEAT_SLOTS],
                cheat_mask: 0,
                version: ProtocolVersion::Versioned,
                paused: false,
            })),
            wake: Signal::new(),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut Pending) -> R) -> R {
        self.pending.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Mark categories pending and wake the writer.
    pub fn request(&self, flags: TxFlags) {
        self.update(|p| p.flags.insert(flags));
        self.wake.signal(());
    }

    /// Queue a color temperature change, clamped to [`MAX_COLOR_TEMP`].
    pub fn set_color_temp(&self, level: u8) {
        self.update(|p| {
            p.color_temp = level.min(MAX_COLOR_TEMP);
            p.flags.insert(TxFlags::COLOR_TEMP);
        });
        self.wake.signal(());
    }

    /// Queue a cheat poke, replacing any poke still pending for its slot.
    pub fn push_cheat(&self, poke: CheatPoke) {
        self.update(|p| {
            let slot = poke.slot() as usize;
            p.cheats[slot] = Some(poke);
            p.cheat_mask |= 1 << slot;
            p.flags.insert(TxFlags::CHEAT);
        });
        self.wake.signal(());
    }

    /// Request everything the co-processor needs after a reset, replaying
    /// the last poke of every slot.
    pub fn send_all(&self) {
        self.update(|p| {
            p.flags.insert(TxFlags::RESYNC);
            p.replay_cheats();
        });
        self.wake.signal(());
    }

    /// Issue the boot resync burst.
    pub async fn boot_resync<D: DelayNs>(&self, delay: &mut D) {
        for _ in 0..BOOT_RESYNC_COUNT {
            self.send_all();
            delay.delay_ms(BOOT_RESYNC_GAP_MS).await;
        }
    }

    /// Hold all writes until [`Self::resume`]. Requests keep accumulating.
    pub fn pause(&self) {
        self.update(|p| p.paused = true);
    }

    pub fn resume(&self) {
        self.update(|p| p.paused = false);
        self.wake.signal(());
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.update(|p| p.paused)
    }

    pub fn set_protocol_version(&self, version: ProtocolVersion) {
        self.update(|p| p.version = version);
    }

    #[must_use]
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.update(|p| p.version)
    }

    #[must_use]
    pub fn pending(&self) -> TxFlags {
        self.update(|p| p.flags)
    }

    /// Take and clear everything pending in one step.
    ///
    /// Returns `None` while paused or when nothing is pending.
    pub fn take(&self) -> Option<Drained> {
        self.update(|p| {
            if p.paused || p.flags.is_empty() {
                return None;
            }
            let mut cheats = [None; MAX_CHEAT_SLOTS];
            for (slot, out) in cheats.iter_mut().enumerate() {
                if p.cheat_mask & (1 << slot) != 0 {
                    *out = p.cheats[slot];
                }
            }
            let drained = Drained {
                flags: p.flags,
                color_temp: p.color_temp,
                cheats,
                version: p.version,
            };
            p.flags = TxFlags::NONE;
            p.cheat_mask = 0;
            Some(drained)
        })
    }

    /// Wait until something is requested.
    pub async fn wait(&self) {
        self.wake.wait().await
    }
}

impl<M: RawMutex> Default for CommandQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> CheatSink for CommandQueue<M> {
    fn send_cheat(&self, poke: CheatPoke) {
        self.push_cheat(poke);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_take_clears_atomically() {
        let queue = CommandQueue::<NoopRawMutex>::new();
        assert!(queue.take().is_none());

        queue.request(TxFlags::SYS_CTL | TxFlags::FW_VERSION);
        queue.request(TxFlags::SYS_CTL);
        let drained = queue.take().unwrap();
        assert_eq!(drained.flags, TxFlags::SYS_CTL | TxFlags::FW_VERSION);
        assert!(queue.pending().is_empty());
        assert!(queue.take().is_none());
    }

    #[test]
    fn test_latest_payload_wins() {
        let queue = CommandQueue::<NoopRawMutex>::new();
        queue.set_color_temp(2);
        queue.set_color_temp(9);
        assert_eq!(queue.take().unwrap().color_temp, MAX_COLOR_TEMP);

        let first = CheatPoke::new(1, true, 0x01, 0xC000, 1).unwrap();
        let second = CheatPoke::new(1, false, 0x01, 0xC000, 1).unwrap();
        let other = CheatPoke::new(4, true, 0x91, 0xD000, 7).unwrap();
        queue.send_cheat(first);
        queue.send_cheat(other);
        queue.send_cheat(second);
        let drained = queue.take().unwrap();
        assert_eq!(drained.cheats[1], Some(second));
        assert_eq!(drained.cheats[4], Some(other));
        assert_eq!(drained.cheats.iter().flatten().count(), 2);
    }

    #[test]
    fn test_pause_holds_requests() {
        let queue = CommandQueue::<NoopRawMutex>::new();
        queue.pause();
        queue.request(TxFlags::BRIGHTNESS);
        assert!(queue.is_paused());
        assert!(queue.take().is_none());

        queue.resume();
        assert_eq!(queue.take().unwrap().flags, TxFlags::BRIGHTNESS);
    }

    #[test]
    fn test_send_all_requests_resync_set() {
        let queue = CommandQueue::<NoopRawMutex>::new();
        queue.send_all();
        assert_eq!(queue.pending(), TxFlags::RESYNC);
        assert!(queue.take().unwrap().cheats.iter().all(Option::is_none));
    }

    #[test]
    fn test_send_all_replays_last_pokes() {
        let queue = CommandQueue::<NoopRawMutex>::new();
        let poke = CheatPoke::new(2, true, 0x01, 0xC0DE, 9).unwrap();
        queue.send_cheat(poke);
        queue.take();
        assert!(queue.take().is_none());

        queue.send_all();
        let drained = queue.take().unwrap();
        assert_eq!(drained.cheats[2], Some(poke));
        assert_eq!(drained.cheats.iter().flatten().count(), 1);
    }
}
