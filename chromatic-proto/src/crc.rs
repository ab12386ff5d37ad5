//! Trailer checksum of versioned device frames.
//!
//! A versioned frame ends in one CRC-8/SAE-J1850 byte (poly 0x1D, init
//! 0xFF, xorout 0xFF) taken over everything before it: marker, id, length
//! and payload. Frames going to the co-processor get it appended by
//! [`crate::frame`]; replies coming back are checked with [`check_frame`].
//! Legacy frames carry no checksum.

use crc::{Crc, CRC_8_SAE_J1850};

const SAE_J1850: Crc<u8> = Crc::<u8>::new(&CRC_8_SAE_J1850);

/// Checksum of a frame body, marker through payload.
#[inline]
#[must_use]
pub fn frame_crc(body: &[u8]) -> u8 {
    SAE_J1850.checksum(body)
}

/// `true` if the last byte of `frame` is the checksum of the bytes before it.
///
/// An empty slice never checks out.
#[must_use]
pub fn check_frame(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((&trailer, body)) => frame_crc(body) == trailer,
        None => false,
    }
}

/// Running checksum for a frame built a byte at a time.
pub struct FrameCrc {
    digest: crc::Digest<'static, u8>,
}

impl FrameCrc {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            digest: SAE_J1850.digest(),
        }
    }

    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    #[inline]
    pub fn push_slice(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// The trailer byte for everything pushed so far.
    #[inline]
    #[must_use]
    pub fn trailer(self) -> u8 {
        self.digest.finalize()
    }
}

impl Default for FrameCrc {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cheat poke for slot 2: marker, id 0x0E, len 6, payload, trailer
    const POKE_FRAME: [u8; 10] = [0xA5, 0x0E, 0x06, 0x02, 0x81, 0xC1, 0x23, 0x45, 0x00, 0x5C];

    #[test]
    fn test_catalogue_check_value() {
        assert_eq!(frame_crc(b"123456789"), 0x4B);
    }

    #[test]
    fn test_poke_frame_trailer() {
        assert_eq!(frame_crc(&POKE_FRAME[..9]), 0x5C);

        let mut running = FrameCrc::new();
        running.push(POKE_FRAME[0]);
        running.push(POKE_FRAME[1]);
        running.push_slice(&POKE_FRAME[2..9]);
        assert_eq!(running.trailer(), 0x5C);
    }

    #[test]
    fn test_check_frame() {
        assert!(check_frame(&POKE_FRAME));

        let mut corrupt = POKE_FRAME;
        corrupt[4] ^= 0x01;
        assert!(!check_frame(&corrupt));
        assert!(!check_frame(&[]));
    }
}
