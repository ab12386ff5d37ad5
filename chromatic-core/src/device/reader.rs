//! Replies from the co-processor.
//!
//! Every resync asks the co-processor for its firmware version. The
//! framing of whatever comes back decides the framing the writer uses.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_io_async::Read;

use chromatic_proto::{ReplyFrame, ReplyParser};

use super::queue::CommandQueue;

/// Read buffer size.
const CHUNK: usize = 16;

/// Parses the device byte stream and keeps the queue's protocol version in
/// line with it.
pub struct DeviceReader<'q, M: RawMutex, R> {
    queue: &'q CommandQueue<M>,
    rx: R,
    parser: ReplyParser,
    buf: [u8; CHUNK],
    head: usize,
    tail: usize,
}

impl<'q, M: RawMutex, R: Read> DeviceReader<'q, M, R> {
    pub fn new(queue: &'q CommandQueue<M>, rx: R) -> Self {
        Self {
            queue,
            rx,
            parser: ReplyParser::new(),
            buf: [0; CHUNK],
            head: 0,
            tail: 0,
        }
    }

    /// Wait for the next valid reply frame.
    ///
    /// Returns `Ok(None)` at end of stream. Dropped frames are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Whatever the byte stream reports.
    pub async fn next(&mut self) -> Result<Option<ReplyFrame>, R::Error> {
        loop {
            while self.head < self.tail {
                let byte = self.buf[self.head];
                self.head += 1;
                match self.parser.push_byte(byte) {
                    Ok(Some(frame)) => {
                        self.adopt(&frame);
                        return Ok(Some(frame));
                    }
                    Ok(None) => {}
                    Err(e) => warn!("device: reply dropped: {:?}", e),
                }
            }
            let n = self.rx.read(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.head = 0;
            self.tail = n;
        }
    }

    /// Switch framing to match the reply. A switch replays full state in
    /// the new framing.
    fn adopt(&self, frame: &ReplyFrame) {
        if self.queue.protocol_version() == frame.version {
            return;
        }
        info!("device: co-processor speaks {:?} framing", frame.version);
        self.queue.set_protocol_version(frame.version);
        self.queue.send_all();
    }

    pub fn into_inner(self) -> R {
        self.rx
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::BridgeConfig;
    use crate::device::{DeviceSettings, DeviceWriter, TxFlags};
    use chromatic_proto::{ProtocolVersion, Reply, SysCtl};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embedded_hal_async::delay::DelayNs;
    use std::vec;
    use std::vec::Vec;

    /// Byte stream handing out at most `step` bytes per read.
    struct Stream {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Stream {
        fn new(data: &[u8], step: usize) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                step,
            }
        }
    }

    impl embedded_io_async::ErrorType for Stream {
        type Error = core::convert::Infallible;
    }

    impl Read for Stream {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

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

    struct Fixed;

    impl DeviceSettings for Fixed {
        fn brightness(&self) -> u8 {
            3
        }
        fn sys_ctl(&self) -> SysCtl {
            SysCtl::default()
        }
        fn poked_buttons(&self) -> u16 {
            0
        }
        fn palette(&self) -> Option<chromatic_proto::PaletteWords> {
            None
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_legacy_reply_switches_writer_framing() {
        let queue = CommandQueue::<NoopRawMutex>::new();
        let mut reader = DeviceReader::new(&queue, Stream::new(&[0x5A, 0x06, 0x00, 0x07], 3));

        let frame = block_on(reader.next()).unwrap().unwrap();
        assert_eq!(frame.reply(), Reply::FirmwareVersion(7));
        assert_eq!(queue.protocol_version(), ProtocolVersion::Legacy);
        assert!(queue.pending().contains(TxFlags::RESYNC));
        assert_eq!(block_on(reader.next()), Ok(None));

        let mut writer = DeviceWriter::new(&queue, Wire::default(), Fixed, NoDelay, &BridgeConfig::DEFAULT);
        let _ = queue.take();
        queue.request(TxFlags::BRIGHTNESS);
        assert_eq!(block_on(writer.poll_once()), Ok(1));
        let (wire, _, _) = writer.into_parts();
        assert_eq!(wire.frames, vec![vec![0x5A, 0x05, 0x00, 0x03]]);
    }

    #[test]
    fn test_same_framing_changes_nothing() {
        let queue = CommandQueue::<NoopRawMutex>::new();
        // Versioned firmware version reply, 0x0102
        let raw = [0xA5, 0x06, 0x02, 0x01, 0x02, 0x31];
        let mut reader = DeviceReader::new(&queue, Stream::new(&raw, 16));

        let frame = block_on(reader.next()).unwrap().unwrap();
        assert_eq!(frame.reply(), Reply::FirmwareVersion(0x0102));
        assert_eq!(queue.protocol_version(), ProtocolVersion::Versioned);
        assert!(queue.pending().is_empty());
    }

    #[test]
    fn test_corrupt_reply_keeps_framing() {
        let queue = CommandQueue::<NoopRawMutex>::new();
        queue.set_protocol_version(ProtocolVersion::Legacy);
        let raw = [0xA5, 0x06, 0x02, 0x01, 0x02, 0x32, 0x5A, 0x06, 0x00, 0x01];
        let mut reader = DeviceReader::new(&queue, Stream::new(&raw, 4));

        let frame = block_on(reader.next()).unwrap().unwrap();
        assert_eq!(frame.version, ProtocolVersion::Legacy);
        assert_eq!(queue.protocol_version(), ProtocolVersion::Legacy);
        assert!(queue.pending().is_empty());
    }
}
