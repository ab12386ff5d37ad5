//! Device frame serialization.
//!
//! # Frame Formats
//!
//! ## Legacy
//!
//! ```text
//! <marker 0x5A> <id> <payload hi> <payload lo>
//! ```
//!
//! Always 4 bytes. Only payloads of up to 2 bytes fit.
//!
//! ## Versioned
//!
//! ```text
//! <marker 0xA5> <id> <len> <payload[len]> <crc8>
//! ```
//!
//! The CRC-8/SAE-J1850 covers marker through payload.
//!
//! # Example
//!
//! ```
//! use chromatic_proto::command::{CommandId, ProtocolVersion};
//! use chromatic_proto::frame::{serialize_frame, MAX_FRAME_SIZE};
//!
//! let mut buf = [0u8; MAX_FRAME_SIZE];
//! let len = serialize_frame(&mut buf, ProtocolVersion::Legacy, CommandId::Backlight, &7u16.to_be_bytes()).unwrap();
//! assert_eq!(&buf[..len], &[0x5A, 0x05, 0x00, 0x07]);
//! ```

use crate::command::{CommandId, ProtocolVersion};
use crate::crc::FrameCrc;

/// Largest frame the co-processor accepts.
pub const MAX_FRAME_SIZE: usize = 14;

/// Largest payload a versioned frame can carry.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_SIZE - VERSIONED_OVERHEAD;

/// Size of every legacy frame.
pub const LEGACY_FRAME_SIZE: usize = 4;

/// Marker, id, length and checksum bytes.
const VERSIONED_OVERHEAD: usize = 4;

/// Error type for serialization operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerializeError {
    /// The output buffer is too small to hold the serialized frame.
    BufferTooSmall,
    /// The payload does not fit the selected frame format.
    PayloadTooLarge,
    /// A write operation failed (for I/O adapters).
    WriteError,
}

impl core::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::PayloadTooLarge => write!(f, "payload too large for frame"),
            Self::WriteError => write!(f, "write error"),
        }
    }
}

/// Buffer cursor that checksums what it writes.
struct FrameBuf<'a> {
    buf: &'a mut [u8],
    pos: usize,
    crc: FrameCrc,
}

impl<'a> FrameBuf<'a> {
    #[inline]
    fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            crc: FrameCrc::new(),
        }
    }

    #[inline]
    fn write(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.crc.push(byte);
        self.pos += 1;
    }

    #[inline]
    fn write_slice(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.crc.push_slice(bytes);
        self.pos += bytes.len();
    }

    /// Append the checksum byte.
    #[inline]
    fn finalize(self) -> usize {
        self.buf[self.pos] = self.crc.trailer();
        self.pos + 1
    }
}

/// Size of the frame `payload_len` bytes produce under `version`.
#[inline]
#[must_use]
pub const fn frame_len(version: ProtocolVersion, payload_len: usize) -> usize {
    match version {
        ProtocolVersion::Legacy => LEGACY_FRAME_SIZE,
        ProtocolVersion::Versioned => payload_len + VERSIONED_OVERHEAD,
    }
}

/// Serialize one frame into `buf`.
///
/// Multi-byte values must already be big-endian in `payload`.
///
/// Returns the number of bytes written on success.
///
/// # Errors
///
/// - [`SerializeError::PayloadTooLarge`] if a legacy payload exceeds 2 bytes
///   or a versioned payload exceeds [`MAX_PAYLOAD_LEN`].
/// - [`SerializeError::BufferTooSmall`] if `buf` cannot hold the frame.
pub fn serialize_frame(
    buf: &mut [u8],
    version: ProtocolVersion,
    id: CommandId,
    payload: &[u8],
) -> Result<usize, SerializeError> {
    match version {
        ProtocolVersion::Legacy => {
            if payload.len() > 2 {
                return Err(SerializeError::PayloadTooLarge);
            }
            if buf.len() < LEGACY_FRAME_SIZE {
                return Err(SerializeError::BufferTooSmall);
            }
            buf[0] = version.marker();
            buf[1] = id.as_u8();
            buf[2..LEGACY_FRAME_SIZE].fill(0);
            buf[2..2 + payload.len()].copy_from_slice(payload);
            Ok(LEGACY_FRAME_SIZE)
        }
        ProtocolVersion::Versioned => {
            if payload.len() > MAX_PAYLOAD_LEN {
                return Err(SerializeError::PayloadTooLarge);
            }
            if buf.len() < frame_len(version, payload.len()) {
                return Err(SerializeError::BufferTooSmall);
            }
            let mut out = FrameBuf::new(buf);
            out.write(version.marker());
            out.write(id.as_u8());
            out.write(payload.len() as u8);
            out.write_slice(payload);
            Ok(out.finalize())
        }
    }
}

/// Serialize a frame into a `heapless::Vec`.
///
/// # Errors
///
/// Same as [`serialize_frame`].
#[cfg(feature = "heapless")]
pub fn serialize_frame_to_vec(
    version: ProtocolVersion,
    id: CommandId,
    payload: &[u8],
) -> Result<heapless::Vec<u8, MAX_FRAME_SIZE>, SerializeError> {
    let mut buf = [0u8; MAX_FRAME_SIZE];
    let len = serialize_frame(&mut buf, version, id, payload)?;
    heapless::Vec::from_slice(&buf[..len]).map_err(|_| SerializeError::BufferTooSmall)
}

/// Serialize a frame directly to a blocking `embedded_io::Write`.
///
/// # Errors
///
/// Same as [`serialize_frame`], plus [`SerializeError::WriteError`].
#[cfg(feature = "embedded-io")]
pub fn serialize_frame_io<W: embedded_io::Write>(
    writer: &mut W,
    version: ProtocolVersion,
    id: CommandId,
    payload: &[u8],
) -> Result<usize, SerializeError> {
    let mut buf = [0u8; MAX_FRAME_SIZE];
    let len = serialize_frame(&mut buf, version, id, payload)?;
    writer
        .write_all(&buf[..len])
        .map_err(|_| SerializeError::WriteError)?;
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::check_frame;

    #[test]
    fn test_legacy_frame_is_four_bytes() {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = serialize_frame(
            &mut buf,
            ProtocolVersion::Legacy,
            CommandId::SysCtl,
            &0x1234u16.to_be_bytes(),
        )
        .unwrap();
        assert_eq!(&buf[..len], &[0x5A, 0x04, 0x12, 0x34]);
    }

    #[test]
    fn test_legacy_pads_short_payload() {
        let mut buf = [0xFFu8; MAX_FRAME_SIZE];
        let len =
            serialize_frame(&mut buf, ProtocolVersion::Legacy, CommandId::Backlight, &[9]).unwrap();
        assert_eq!(&buf[..len], &[0x5A, 0x05, 0x09, 0x00]);
    }

    #[test]
    fn test_legacy_rejects_wide_payload() {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let result = serialize_frame(
            &mut buf,
            ProtocolVersion::Legacy,
            CommandId::CheatPoke,
            &[0, 0x81, 0xC1, 0x23, 0x45, 0],
        );
        assert_eq!(result, Err(SerializeError::PayloadTooLarge));
    }

    #[test]
    fn test_versioned_frame_layout() {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let payload = [0x02, 0x81, 0xC1, 0x23, 0x45, 0x00];
        let len = serialize_frame(
            &mut buf,
            ProtocolVersion::Versioned,
            CommandId::CheatPoke,
            &payload,
        )
        .unwrap();

        assert_eq!(len, 3 + payload.len() + 1);
        assert_eq!(&buf[..3], &[0xA5, 0x0E, 6]);
        assert_eq!(&buf[3..9], &payload);
        assert!(check_frame(&buf[..len]));
    }

    #[test]
    fn test_versioned_limits() {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let max = [0u8; MAX_PAYLOAD_LEN];
        assert_eq!(
            serialize_frame(&mut buf, ProtocolVersion::Versioned, CommandId::SpritePalette, &max),
            Ok(MAX_FRAME_SIZE)
        );

        let over = [0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            serialize_frame(&mut buf, ProtocolVersion::Versioned, CommandId::SpritePalette, &over),
            Err(SerializeError::PayloadTooLarge)
        );

        let mut small = [0u8; 5];
        assert_eq!(
            serialize_frame(&mut small, ProtocolVersion::Versioned, CommandId::SysCtl, &[0, 1]),
            Err(SerializeError::BufferTooSmall)
        );
    }
}
