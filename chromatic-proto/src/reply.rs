//! Frames sent back by the co-processor.
//!
//! Replies use the same two framings as commands. The marker of each
//! reply tells which one the co-processor speaks:
//!
//! ```text
//! <0x5A> <id> <payload hi> <payload lo>
//! <0xA5> <id> <len> <payload[len]> <crc8>
//! ```
//!
//! Versioned replies with a bad trailer are dropped. Legacy replies only
//! have room for 2 payload bytes, so the game hash and memory chunks need
//! versioned framing.

use crate::command::{ProtocolVersion, LEGACY_MARKER, VERSIONED_MARKER};
use crate::crc::check_frame;
use crate::frame::{LEGACY_FRAME_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_LEN};

/// Reply identifiers the bridge acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReplyId {
    FirmwareVersion = 0x06,
    /// Hash of the cartridge title.
    GameHash = 0x0A,
    /// Work RAM bytes following a 2-byte address.
    WramChunk = 0x0B,
    /// Framebuffer preview bytes following a 2-byte address.
    FramebufferChunk = 0x0C,
}

impl ReplyId {
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x06 => Self::FirmwareVersion,
            0x0A => Self::GameHash,
            0x0B => Self::WramChunk,
            0x0C => Self::FramebufferChunk,
            _ => return None,
        })
    }
}

/// Error type for reply parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplyError {
    /// Versioned frame announced more payload than any frame carries.
    Length(u8),
    /// Versioned frame trailer did not match.
    Checksum,
}

impl core::fmt::Display for ReplyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Length(len) => write!(f, "reply length {} too large", len),
            Self::Checksum => write!(f, "reply checksum mismatch"),
        }
    }
}

/// One complete reply frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReplyFrame {
    /// Framing the frame arrived in.
    pub version: ProtocolVersion,
    pub id: u8,
    payload: [u8; MAX_PAYLOAD_LEN],
    len: u8,
}

impl ReplyFrame {
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload[..usize::from(self.len)]
    }

    /// Interpret the payload. Unknown ids and short payloads come back as
    /// [`Reply::Other`].
    #[must_use]
    pub fn reply(&self) -> Reply<'_> {
        let payload = self.payload();
        let other = Reply::Other(self.id);
        match ReplyId::from_u8(self.id) {
            Some(ReplyId::FirmwareVersion) => match payload {
                [hi, lo, ..] => Reply::FirmwareVersion(u16::from_be_bytes([*hi, *lo])),
                _ => other,
            },
            Some(ReplyId::GameHash) => match payload {
                [a, b, c, d, ..] => Reply::GameHash(u32::from_be_bytes([*a, *b, *c, *d])),
                _ => other,
            },
            Some(ReplyId::WramChunk) => match payload {
                [hi, lo, data @ ..] => Reply::WramChunk {
                    address: u16::from_be_bytes([*hi, *lo]),
                    data,
                },
                _ => other,
            },
            Some(ReplyId::FramebufferChunk) => match payload {
                [hi, lo, data @ ..] => Reply::FramebufferChunk {
                    offset: u16::from_be_bytes([*hi, *lo]),
                    data,
                },
                _ => other,
            },
            None => other,
        }
    }
}

/// Decoded reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    FirmwareVersion(u16),
    GameHash(u32),
    WramChunk { address: u16, data: &'a [u8] },
    FramebufferChunk { offset: u16, data: &'a [u8] },
    Other(u8),
}

#[derive(Clone, Copy)]
enum ParserState {
    WaitingForMarker,
    Legacy,
    VersionedHeader,
    VersionedBody { expected_len: usize },
}

/// Byte-at-a-time reply parser.
pub struct ReplyParser {
    buffer: [u8; MAX_FRAME_SIZE],
    pos: usize,
    state: ParserState,
}

impl ReplyParser {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; MAX_FRAME_SIZE],
            pos: 0,
            state: ParserState::WaitingForMarker,
        }
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.state = ParserState::WaitingForMarker;
    }

    /// Feed one byte.
    ///
    /// Returns `Some(frame)` once a frame completes. Bytes outside a frame
    /// are skipped until the next marker.
    ///
    /// # Errors
    ///
    /// A [`ReplyError`] when a versioned frame is dropped. The parser is
    /// ready for the next marker either way.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<ReplyFrame>, ReplyError> {
        match self.state {
            ParserState::WaitingForMarker => {
                self.state = match byte {
                    LEGACY_MARKER => ParserState::Legacy,
                    VERSIONED_MARKER => ParserState::VersionedHeader,
                    _ => return Ok(None),
                };
                self.buffer[0] = byte;
                self.pos = 1;
                Ok(None)
            }
            ParserState::Legacy => {
                self.store(byte);
                if self.pos < LEGACY_FRAME_SIZE {
                    return Ok(None);
                }
                let frame = self.frame(ProtocolVersion::Legacy, 2, 2);
                self.reset();
                Ok(Some(frame))
            }
            ParserState::VersionedHeader => {
                self.store(byte);
                if self.pos < 3 {
                    return Ok(None);
                }
                let len = usize::from(byte);
                if len > MAX_PAYLOAD_LEN {
                    self.reset();
                    return Err(ReplyError::Length(byte));
                }
                self.state = ParserState::VersionedBody {
                    expected_len: 3 + len + 1,
                };
                Ok(None)
            }
            ParserState::VersionedBody { expected_len } => {
                self.store(byte);
                if self.pos < expected_len {
                    return Ok(None);
                }
                let result = if check_frame(&self.buffer[..expected_len]) {
                    let len = usize::from(self.buffer[2]);
                    Ok(Some(self.frame(ProtocolVersion::Versioned, 3, len)))
                } else {
                    Err(ReplyError::Checksum)
                };
                self.reset();
                result
            }
        }
    }

    #[inline]
    fn store(&mut self, byte: u8) {
        self.buffer[self.pos] = byte;
        self.pos += 1;
    }

    fn frame(&self, version: ProtocolVersion, start: usize, len: usize) -> ReplyFrame {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        payload[..len].copy_from_slice(&self.buffer[start..start + len]);
        ReplyFrame {
            version,
            id: self.buffer[1],
            payload,
            len: len as u8,
        }
    }
}

impl Default for ReplyParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::crc::frame_crc;
    use std::vec::Vec;

    fn feed(parser: &mut ReplyParser, bytes: &[u8]) -> Vec<Result<ReplyFrame, ReplyError>> {
        bytes
            .iter()
            .filter_map(|&b| parser.push_byte(b).transpose())
            .collect()
    }

    fn versioned(id: u8, payload: &[u8]) -> Vec<u8> {
        let mut raw = Vec::from([VERSIONED_MARKER, id, payload.len() as u8]);
        raw.extend_from_slice(payload);
        raw.push(frame_crc(&raw));
        raw
    }

    #[test]
    fn test_legacy_version_reply() {
        let mut parser = ReplyParser::new();
        let frames = feed(&mut parser, &[0x00, 0x5A, 0x06, 0x01, 0x02]);
        assert_eq!(frames.len(), 1);
        let frame = frames[0].unwrap();
        assert_eq!(frame.version, ProtocolVersion::Legacy);
        assert_eq!(frame.reply(), Reply::FirmwareVersion(0x0102));
    }

    #[test]
    fn test_versioned_replies() {
        let mut parser = ReplyParser::new();
        let mut stream = versioned(0x0A, &[0x1A, 0x53, 0x45, 0x68]);
        stream.extend(versioned(0x0B, &[0xC0, 0x10, 1, 2, 3, 4, 5, 6, 7, 8]));
        let frames = feed(&mut parser, &stream);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].unwrap().version, ProtocolVersion::Versioned);
        assert_eq!(frames[0].unwrap().reply(), Reply::GameHash(0x1A53_4568));
        assert_eq!(
            frames[1].unwrap().reply(),
            Reply::WramChunk {
                address: 0xC010,
                data: &[1, 2, 3, 4, 5, 6, 7, 8],
            }
        );
    }

    #[test]
    fn test_bad_trailer_is_dropped() {
        let mut parser = ReplyParser::new();
        let mut raw = versioned(0x06, &[0x00, 0x03]);
        raw[4] ^= 0xFF;
        raw.extend(versioned(0x06, &[0x00, 0x04]));
        let frames = feed(&mut parser, &raw);

        assert_eq!(frames[0], Err(ReplyError::Checksum));
        assert_eq!(frames[1].unwrap().reply(), Reply::FirmwareVersion(4));
    }

    #[test]
    fn test_oversized_length_resyncs() {
        let mut parser = ReplyParser::new();
        let mut raw = Vec::from([0xA5, 0x0B, 0x40]);
        raw.extend(versioned(0x06, &[0x00, 0x05]));
        let frames = feed(&mut parser, &raw);

        assert_eq!(frames[0], Err(ReplyError::Length(0x40)));
        assert_eq!(frames[1].unwrap().reply(), Reply::FirmwareVersion(5));
    }

    #[test]
    fn test_short_payload_is_other() {
        let mut parser = ReplyParser::new();
        let frames = feed(&mut parser, &versioned(0x0A, &[0x01]));
        assert_eq!(frames[0].unwrap().reply(), Reply::Other(0x0A));

        // A legacy frame cannot carry a hash
        let frames = feed(&mut parser, &[0x5A, 0x0A, 0x12, 0x34]);
        assert_eq!(frames[0].unwrap().reply(), Reply::Other(0x0A));
    }
}
