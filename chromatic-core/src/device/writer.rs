//! The single writer of device frames.

use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::Write;

use chromatic_proto::{serialize_frame, CommandId, ProtocolVersion, SerializeError, MAX_FRAME_SIZE};

use super::flags::TxFlags;
use super::queue::{CommandQueue, Drained};
use super::settings::DeviceSettings;
use crate::config::BridgeConfig;

/// Brightness levels at or above this are not sent.
pub const BRIGHTNESS_LEVELS: u8 = 16;

/// Payload of request commands.
const REQUEST: [u8; 2] = 0u16.to_be_bytes();

/// Error writing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriterError {
    /// The frame could not be built for the current protocol version.
    Serialize(SerializeError),
    /// The byte stream rejected the write.
    Io,
}

impl From<SerializeError> for WriterError {
    fn from(e: SerializeError) -> Self {
        Self::Serialize(e)
    }
}

impl core::fmt::Display for WriterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "frame error: {e}"),
            Self::Io => write!(f, "device write failed"),
        }
    }
}

/// Outcome of one drain. A failed frame does not stop the rest.
#[derive(Debug, Default)]
struct DrainReport {
    written: usize,
    first_error: Option<WriterError>,
}

impl DrainReport {
    fn note(&mut self, result: Result<(), WriterError>) {
        match result {
            Ok(()) => self.written += 1,
            Err(e) => {
                if self.first_error.is_none() {
                    self.first_error = Some(e);
                }
            }
        }
    }
}

/// Drains the [`CommandQueue`] into a byte stream.
///
/// Wakes on any request or after the poll interval, takes everything
/// pending at once and writes one frame per category in a fixed order.
pub struct DeviceWriter<'q, M: RawMutex, W, S, T> {
    queue: &'q CommandQueue<M>,
    out: W,
    settings: S,
    timer: T,
    poll_ms: u32,
}

impl<'q, M, W, S, T> DeviceWriter<'q, M, W, S, T>
where
    M: RawMutex,
    W: Write,
    S: DeviceSettings,
    T: DelayNs,
{
    pub fn new(
        queue: &'q CommandQueue<M>,
        out: W,
        settings: S,
        timer: T,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            queue,
            out,
            settings,
            timer,
            poll_ms: config.writer_poll_ms,
        }
    }

    /// Run the writer forever.
    pub async fn run(&mut self) -> ! {
        loop {
            if let Err(e) = self.poll_once().await {
                warn!("device: {:?}", e);
            }
        }
    }

    /// Wait for a request or the poll interval, then drain.
    ///
    /// Returns how many frames were written.
    pub async fn poll_once(&mut self) -> Result<usize, WriterError> {
        select(self.queue.wait(), self.timer.delay_ms(self.poll_ms)).await;
        match self.queue.take() {
            Some(pending) => self.drain(&pending).await,
            None => Ok(0),
        }
    }

    /// Write one frame per category in `pending`.
    ///
    /// # Errors
    ///
    /// The first error hit. Later categories are still written.
    pub async fn drain(&mut self, pending: &Drained) -> Result<usize, WriterError> {
        let version = pending.version;
        let flags = pending.flags;
        let mut report = DrainReport::default();

        if flags.contains(TxFlags::BRIGHTNESS) {
            let level = self.settings.brightness();
            if level < BRIGHTNESS_LEVELS {
                let r = self.emit(version, CommandId::Backlight, &u16::from(level).to_be_bytes()).await;
                report.note(r);
            } else {
                debug!("device: brightness {} out of range", level);
            }
        }
        if flags.contains(TxFlags::SYS_CTL) {
            let word = self.settings.sys_ctl().to_word();
            let r = self.emit(version, CommandId::SysCtl, &word.to_be_bytes()).await;
            report.note(r);
        }
        if flags.contains(TxFlags::FW_VERSION) {
            let r = self.emit(version, CommandId::FirmwareVersion, &REQUEST).await;
            report.note(r);
        }
        if flags.contains(TxFlags::POKE_BUTTON) {
            let buttons = self.settings.poked_buttons();
            let r = self.emit(version, CommandId::PokeButton, &buttons.to_be_bytes()).await;
            report.note(r);
        }
        if flags.contains(TxFlags::BG_PALETTE_DATA) {
            let r = self.emit(version, CommandId::BackgroundPaletteData, &REQUEST).await;
            report.note(r);
        }
        if flags.contains(TxFlags::WRAM_SNAPSHOT) {
            let r = self.emit(version, CommandId::WramSnapshot, &REQUEST).await;
            report.note(r);
        }
        if flags.contains(TxFlags::FB_PREVIEW) {
            let r = self.emit(version, CommandId::FramebufferPreview, &REQUEST).await;
            report.note(r);
        }
        if flags.contains(TxFlags::PALETTE) {
            if let Some(palette) = self.settings.palette() {
                let words = [
                    (CommandId::BackgroundPalette, palette.background),
                    (CommandId::SpritePalette, palette.sprite0),
                    (CommandId::SpritePalette, palette.sprite1),
                ];
                for (id, word) in words {
                    let r = self.emit(version, id, &word.to_be_bytes()).await;
                    report.note(r);
                }
            }
        }
        if flags.contains(TxFlags::COLOR_TEMP) {
            let level = u16::from(pending.color_temp);
            let r = self.emit(version, CommandId::ColorTemperature, &level.to_be_bytes()).await;
            report.note(r);
        }
        if flags.contains(TxFlags::CHEAT) {
            for poke in pending.cheats.iter().flatten() {
                let r = self.emit(version, CommandId::CheatPoke, &poke.to_bytes()).await;
                report.note(r);
            }
        }

        match report.first_error {
            None => Ok(report.written),
            Some(e) => Err(e),
        }
    }

    async fn emit(
        &mut self,
        version: ProtocolVersion,
        id: CommandId,
        payload: &[u8],
    ) -> Result<(), WriterError> {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = serialize_frame(&mut buf, version, id, payload).inspect_err(|e| {
            error!("device: cannot frame {:?}: {:?}", id, e);
        })?;
        self.out.write_all(&buf[..len]).await.map_err(|_| {
            error!("device: write of {:?} failed", id);
            WriterError::Io
        })?;
        trace!("device: sent {:?}", id);
        Ok(())
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    /// Decompose into the byte stream, settings and timer.
    pub fn into_parts(self) -> (W, S, T) {
        (self.out, self.settings, self.timer)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use chromatic_proto::{CheatPoke, PaletteWords, SysCtl};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use std::vec;
    use std::vec::Vec;

    #[derive(Default)]
    struct Wire {
        frames: Vec<Vec<u8>>,
    }

    impl embedded_io_async::ErrorType for Wire {
        type Error = core::convert::Infallible;
    }

    impl embedded_io_async::Write for Wire {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.frames.push(buf.to_vec());
            Ok(buf.len())
        }
    }

    struct Board {
        brightness: u8,
        sys_ctl: SysCtl,
        palette: Option<PaletteWords>,
    }

    impl Default for Board {
        fn default() -> Self {
            Self {
                brightness: 7,
                sys_ctl: SysCtl {
                    mute: true,
                    ..SysCtl::default()
                },
                palette: None,
            }
        }
    }

    impl DeviceSettings for Board {
        fn brightness(&self) -> u8 {
            self.brightness
        }
        fn sys_ctl(&self) -> SysCtl {
            self.sys_ctl
        }
        fn poked_buttons(&self) -> u16 {
            0x0102
        }
        fn palette(&self) -> Option<PaletteWords> {
            self.palette
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    fn writer(
        queue: &CommandQueue<NoopRawMutex>,
        board: Board,
    ) -> DeviceWriter<'_, NoopRawMutex, Wire, Board, NoDelay> {
        DeviceWriter::new(queue, Wire::default(), board, NoDelay, &BridgeConfig::DEFAULT)
    }

    fn ids(w: DeviceWriter<'_, NoopRawMutex, Wire, Board, NoDelay>) -> Vec<u8> {
        let (wire, _, _) = w.into_parts();
        wire.frames.iter().map(|f| f[1]).collect()
    }

    #[test]
    fn test_versioned_frames_on_the_wire() {
        let queue = CommandQueue::new();
        let mut w = writer(&queue, Board::default());
        queue.request(TxFlags::SYS_CTL | TxFlags::BRIGHTNESS);
        queue.set_color_temp(3);

        assert_eq!(block_on(w.poll_once()), Ok(3));
        let (wire, _, _) = w.into_parts();
        assert_eq!(
            wire.frames,
            vec![
                vec![0xA5, 0x05, 0x02, 0x00, 0x07, 0xAE],
                vec![0xA5, 0x04, 0x02, 0x00, 0x01, 0x7D],
                vec![0xA5, 0x11, 0x02, 0x00, 0x03, 0xB1],
            ]
        );
    }

    #[test]
    fn test_coalesced_requests_write_once_with_latest_payload() {
        let queue = CommandQueue::new();
        let mut w = writer(&queue, Board::default());
        queue.set_color_temp(1);
        queue.set_color_temp(4);
        let stale = CheatPoke::new(0, true, 0x01, 0xC000, 1).unwrap();
        let latest = CheatPoke::new(0, false, 0x01, 0xC000, 1).unwrap();
        queue.push_cheat(stale);
        queue.push_cheat(latest);

        assert_eq!(block_on(w.poll_once()), Ok(2));
        let (wire, _, _) = w.into_parts();
        assert_eq!(wire.frames[0][4], 4);
        assert_eq!(&wire.frames[1][3..9], &latest.to_bytes());
    }

    #[test]
    fn test_drain_order() {
        let queue = CommandQueue::new();
        let board = Board {
            palette: Some(PaletteWords {
                background: 1,
                sprite0: 2,
                sprite1: 3,
            }),
            ..Board::default()
        };
        let mut w = writer(&queue, board);
        queue.push_cheat(CheatPoke::new(5, true, 0x91, 0xD000, 2).unwrap());
        queue.request(TxFlags::FB_PREVIEW | TxFlags::WRAM_SNAPSHOT);
        queue.send_all();

        assert_eq!(block_on(w.poll_once()), Ok(12));
        assert_eq!(
            ids(w),
            vec![0x05, 0x04, 0x06, 0x09, 0x0D, 0x0F, 0x10, 0x0B, 0x0C, 0x0C, 0x11, 0x0E]
        );
    }

    #[test]
    fn test_out_of_range_brightness_and_missing_palette_are_skipped() {
        let queue = CommandQueue::new();
        let board = Board {
            brightness: BRIGHTNESS_LEVELS,
            ..Board::default()
        };
        let mut w = writer(&queue, board);
        queue.request(TxFlags::BRIGHTNESS | TxFlags::PALETTE | TxFlags::POKE_BUTTON);

        assert_eq!(block_on(w.poll_once()), Ok(1));
        let (wire, _, _) = w.into_parts();
        assert_eq!(wire.frames, vec![vec![0xA5, 0x09, 0x02, 0x01, 0x02, 0x59]]);
    }

    #[test]
    fn test_legacy_rejects_wide_payloads_but_keeps_going() {
        let queue = CommandQueue::new();
        queue.set_protocol_version(ProtocolVersion::Legacy);
        let mut w = writer(&queue, Board::default());
        queue.push_cheat(CheatPoke::new(0, true, 0x01, 0xC000, 1).unwrap());
        queue.request(TxFlags::FW_VERSION);

        assert_eq!(
            block_on(w.poll_once()),
            Err(WriterError::Serialize(SerializeError::PayloadTooLarge))
        );
        let (wire, _, _) = w.into_parts();
        assert_eq!(wire.frames, vec![vec![0x5A, 0x06, 0x00, 0x00]]);
    }

    #[test]
    fn test_paused_writer_is_idle() {
        let queue = CommandQueue::new();
        let mut w = writer(&queue, Board::default());
        queue.pause();
        queue.send_all();
        assert_eq!(block_on(w.poll_once()), Ok(0));

        queue.resume();
        assert!(block_on(w.poll_once()).unwrap() > 0);
        assert_eq!(block_on(w.poll_once()), Ok(0));
    }
}
