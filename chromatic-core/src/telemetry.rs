//! Memory telemetry pushed to the phone over the proxy channel.
//!
//! ```text
//! co-processor WRAM chunks ──▶ MemoryWindow ──tick──▶ GameInfo / MemChunk / WatchHit ──▶ ProxyChannel
//! ```
//!
//! Each tick announces the game until one announcement gets through,
//! pushes the work RAM window when it differs from the last one
//! delivered, and reports every watch that fired on it.

use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

use chromatic_proto::proxy::{encode_game_info, encode_mem_chunk, MAX_PROXY_MESSAGE};

use crate::config::BridgeConfig;
use crate::link::{Characteristic, LinkStateMachine};
use crate::proxy::{NotifyTransport, ProxyChannel, ProxyConsumer};
use crate::router::WatchTable;

/// First address of the watched work RAM window.
pub const WINDOW_BASE: u16 = 0xC000;

pub const WINDOW_LEN: usize = 64;

/// Shortest tick period.
pub const MIN_INTERVAL_MS: u32 = 100;

/// Platform byte closing the game info message.
pub const PLATFORM_GAME_BOY: u8 = 0x01;

/// Longest announced title.
pub const MAX_TITLE_LEN: usize = 16;

const UNKNOWN_TITLE: &[u8] = b"UNKNOWN";

/// Tick period for `config`.
#[inline]
#[must_use]
pub fn tick_interval_ms(config: &BridgeConfig) -> u32 {
    config.telemetry_interval_ms.max(MIN_INTERVAL_MS)
}

/// Local copy of the watched window, filled from co-processor replies.
pub struct MemoryWindow {
    bytes: [u8; WINDOW_LEN],
    filled: bool,
}

impl MemoryWindow {
    pub const fn new() -> Self {
        Self {
            bytes: [0; WINDOW_LEN],
            filled: false,
        }
    }

    /// Copy the part of a chunk starting at `address` that overlaps the
    /// window. Returns how many bytes landed.
    pub fn write(&mut self, address: u16, data: &[u8]) -> usize {
        let base = u32::from(WINDOW_BASE);
        let start = u32::from(address);
        let lo = start.max(base);
        let hi = (start + data.len() as u32).min(base + WINDOW_LEN as u32);
        if lo >= hi {
            return 0;
        }
        let (dst, src) = ((lo - base) as usize, (lo - start) as usize);
        let n = (hi - lo) as usize;
        self.bytes[dst..dst + n].copy_from_slice(&data[src..src + n]);
        self.filled = true;
        n
    }

    /// Window contents, `None` until a chunk has landed.
    #[must_use]
    pub fn snapshot(&self) -> Option<[u8; WINDOW_LEN]> {
        self.filled.then_some(self.bytes)
    }

    pub fn clear(&mut self) {
        self.filled = false;
    }
}

impl Default for MemoryWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// What one tick delivered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub game_info: bool,
    pub mem_chunk: bool,
    pub watch_hits: usize,
}

/// Per-connection telemetry state.
pub struct Telemetry {
    title: Vec<u8, MAX_TITLE_LEN>,
    game_sent: bool,
    last: Option<[u8; WINDOW_LEN]>,
}

impl Telemetry {
    pub fn new() -> Self {
        let mut title = Vec::new();
        let _ = title.extend_from_slice(UNKNOWN_TITLE);
        Self {
            title,
            game_sent: false,
            last: None,
        }
    }

    /// Title for the game info message, cut to [`MAX_TITLE_LEN`]. A new
    /// title is announced again and resends the window.
    pub fn set_title(&mut self, title: &[u8]) {
        let title = &title[..title.len().min(MAX_TITLE_LEN)];
        if self.title.as_slice() == title {
            return;
        }
        self.title.clear();
        let _ = self.title.extend_from_slice(title);
        self.reset();
    }

    #[must_use]
    pub fn title(&self) -> &[u8] {
        &self.title
    }

    /// Forget what was delivered, e.g. for a new connection.
    pub fn reset(&mut self) {
        self.game_sent = false;
        self.last = None;
    }

    /// Run one period. Does nothing until the peer subscribes to the proxy
    /// characteristic.
    ///
    /// Game info and the window are only marked delivered when their send
    /// succeeds, so failures are retried next tick.
    pub async fn tick<T, D, C>(
        &mut self,
        proxy: &mut ProxyChannel<T, D, C>,
        link: &LinkStateMachine,
        window: Option<&[u8; WINDOW_LEN]>,
        watches: &mut WatchTable,
    ) -> TickReport
    where
        T: NotifyTransport,
        D: DelayNs,
        C: ProxyConsumer,
    {
        let mut report = TickReport::default();
        if !link.is_subscribed(Characteristic::Proxy) {
            return report;
        }
        let hits = window
            .map(|w| watches.evaluate(WINDOW_BASE, w))
            .unwrap_or_default();
        let mut buf = [0u8; MAX_PROXY_MESSAGE];

        if !self.game_sent {
            if let Ok(len) = encode_game_info(&mut buf, &self.title, PLATFORM_GAME_BOY) {
                match proxy.send(link, &buf[..len]).await {
                    Ok(()) => {
                        info!("telemetry: game info sent ({} bytes)", len);
                        self.game_sent = true;
                        report.game_info = true;
                    }
                    Err(e) => warn!("telemetry: game info failed: {:?}", e),
                }
            }
        }

        if let Some(window) = window.filter(|w| self.last.as_ref() != Some(*w)) {
            if let Ok(len) = encode_mem_chunk(&mut buf, WINDOW_BASE, window) {
                match proxy.send(link, &buf[..len]).await {
                    Ok(()) => {
                        debug!("telemetry: window sent");
                        self.last = Some(*window);
                        report.mem_chunk = true;
                    }
                    Err(e) => warn!("telemetry: window failed: {:?}", e),
                }
            }
        }

        for hit in &hits {
            let Ok(len) = hit.encode(&mut buf) else {
                continue;
            };
            match proxy.send(link, &buf[..len]).await {
                Ok(()) => report.watch_hits += 1,
                Err(e) => warn!("telemetry: watch {} hit lost: {:?}", hit.id, e),
            }
        }
        report
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::RetryPolicy;
    use crate::link::{ConnHandle, LinkEvent, RadioError, RadioStack};
    use crate::proxy::TransportError;
    use chromatic_proto::advert::AdvertisingData;
    use chromatic_proto::proxy::WatchSpec;
    use embassy_futures::block_on;
    use std::vec::Vec as StdVec;

    struct NullRadio;

    impl RadioStack for NullRadio {
        fn identity_address(&mut self) -> Option<[u8; 6]> {
            None
        }
        fn start_advertising(&mut self, _: &AdvertisingData) -> Result<(), RadioError> {
            Ok(())
        }
        fn stop_advertising(&mut self) {}
    }

    #[derive(Default)]
    struct Phone {
        got: StdVec<StdVec<u8>>,
        fail_next: usize,
    }

    impl Phone {
        fn opcodes(&self) -> StdVec<u8> {
            self.got.iter().map(|m| m[0]).collect()
        }
    }

    impl NotifyTransport for Phone {
        async fn notify(
            &mut self,
            _conn: ConnHandle,
            _characteristic: Characteristic,
            data: &[u8],
        ) -> Result<(), TransportError> {
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return Err(TransportError::Busy);
            }
            self.got.push(data.to_vec());
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    type Proxy = ProxyChannel<Phone, NoDelay, fn(&[u8])>;

    fn proxy() -> Proxy {
        ProxyChannel::new(Phone::default(), NoDelay, RetryPolicy { attempts: 1, delay_ms: 0 })
    }

    fn subscribed_link() -> LinkStateMachine {
        let mut radio = NullRadio;
        let mut link = LinkStateMachine::new(&BridgeConfig::DEFAULT).unwrap();
        link.handle_event(&mut radio, LinkEvent::Connected(3));
        link.handle_event(
            &mut radio,
            LinkEvent::Subscribe {
                characteristic: Characteristic::Proxy,
                notify: true,
            },
        );
        link
    }

    #[test]
    fn test_game_info_once_window_on_change() {
        let mut proxy = proxy();
        let link = subscribed_link();
        let mut watches = WatchTable::new();
        let mut telemetry = Telemetry::new();
        telemetry.set_title(b"TETRIS");

        let mut window = [0u8; WINDOW_LEN];
        let r = block_on(telemetry.tick(&mut proxy, &link, Some(&window), &mut watches));
        assert_eq!(
            r,
            TickReport {
                game_info: true,
                mem_chunk: true,
                watch_hits: 0
            }
        );
        assert_eq!(proxy.transport().got[0], b"\x01TETRIS\x01".to_vec());
        let chunk = &proxy.transport().got[1];
        assert_eq!(&chunk[..4], &[0x02, 0xC0, 0x00, 64]);
        assert_eq!(chunk.len(), 4 + WINDOW_LEN);

        // Unchanged window: nothing to send
        let r = block_on(telemetry.tick(&mut proxy, &link, Some(&window), &mut watches));
        assert_eq!(r, TickReport::default());

        window[5] = 9;
        let r = block_on(telemetry.tick(&mut proxy, &link, Some(&window), &mut watches));
        assert!(r.mem_chunk && !r.game_info);
        assert_eq!(proxy.transport().opcodes(), [0x01, 0x02, 0x02]);
        assert_eq!(proxy.transport().got[2][4 + 5], 9);
    }

    #[test]
    fn test_failed_sends_retry_next_tick() {
        let mut proxy = proxy();
        proxy.transport_mut().fail_next = 2;
        let link = subscribed_link();
        let mut watches = WatchTable::new();
        let mut telemetry = Telemetry::new();
        let window = [1u8; WINDOW_LEN];

        let r = block_on(telemetry.tick(&mut proxy, &link, Some(&window), &mut watches));
        assert_eq!(r, TickReport::default());

        let r = block_on(telemetry.tick(&mut proxy, &link, Some(&window), &mut watches));
        assert!(r.game_info && r.mem_chunk);
        assert_eq!(&proxy.transport().got[0][1..8], b"UNKNOWN");
    }

    #[test]
    fn test_threshold_watch_fires_at_or_above() {
        let mut proxy = proxy();
        let link = subscribed_link();
        let mut watches = WatchTable::new();
        assert!(watches.set(WatchSpec {
            id: 4,
            address: 0xC010,
            span: 2,
            comparator: 1,
            threshold: 0x80,
        }));
        let mut telemetry = Telemetry::new();
        let mut window = [0u8; WINDOW_LEN];

        window[0x11] = 0x7F;
        let r = block_on(telemetry.tick(&mut proxy, &link, Some(&window), &mut watches));
        assert_eq!(r.watch_hits, 0);

        window[0x11] = 0x80;
        let r = block_on(telemetry.tick(&mut proxy, &link, Some(&window), &mut watches));
        assert_eq!(r.watch_hits, 1);
        let hit = proxy.transport().got.last().unwrap();
        assert_eq!(hit, &[0x20, 4, 0xC0, 0x10, 2, 0x00, 0x80].to_vec());
    }

    #[test]
    fn test_idle_without_subscription_or_window() {
        let mut proxy = proxy();
        let mut watches = WatchTable::new();
        let mut telemetry = Telemetry::new();
        let idle = LinkStateMachine::new(&BridgeConfig::DEFAULT).unwrap();
        let window = [0u8; WINDOW_LEN];

        let r = block_on(telemetry.tick(&mut proxy, &idle, Some(&window), &mut watches));
        assert_eq!(r, TickReport::default());
        assert!(proxy.transport().got.is_empty());

        // No window yet: only the announcement goes out
        let link = subscribed_link();
        let r = block_on(telemetry.tick(&mut proxy, &link, None, &mut watches));
        assert!(r.game_info && !r.mem_chunk);
    }

    #[test]
    fn test_new_title_is_announced_again() {
        let mut proxy = proxy();
        let link = subscribed_link();
        let mut watches = WatchTable::new();
        let mut telemetry = Telemetry::new();
        block_on(telemetry.tick(&mut proxy, &link, None, &mut watches));

        telemetry.set_title(b"0123456789ABCDEFXYZ");
        assert_eq!(telemetry.title(), b"0123456789ABCDEF");
        let r = block_on(telemetry.tick(&mut proxy, &link, None, &mut watches));
        assert!(r.game_info);
    }

    #[test]
    fn test_window_takes_overlapping_bytes() {
        let mut mem = MemoryWindow::new();
        assert_eq!(mem.snapshot(), None);
        assert_eq!(mem.write(0xBFF0, &[1; 8]), 0);

        assert_eq!(mem.write(0xBFFE, &[7, 7, 5, 6]), 2);
        assert_eq!(mem.write(0xC03E, &[8, 9, 10, 11]), 2);
        let snap = mem.snapshot().unwrap();
        assert_eq!(&snap[..3], &[5, 6, 0]);
        assert_eq!(&snap[62..], &[8, 9]);

        assert_eq!(mem.write(0xFFFC, &[1; 8]), 0);
        mem.clear();
        assert_eq!(mem.snapshot(), None);
    }

    #[test]
    fn test_interval_floor() {
        let config = BridgeConfig {
            telemetry_interval_ms: 20,
            ..BridgeConfig::DEFAULT
        };
        assert_eq!(tick_interval_ms(&config), MIN_INTERVAL_MS);
        assert_eq!(tick_interval_ms(&BridgeConfig::DEFAULT), 1000);
    }
}
