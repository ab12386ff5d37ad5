//! GATT service identifiers and advertising payloads.
//!
//! The advertising packet carries the flags and the primary service UUID;
//! the device name goes in the scan response so both stay under the
//! 31-byte legacy advertising limit.

use crate::frame::SerializeError;

/// Legacy advertising / scan response payload limit.
pub const MAX_ADV_LEN: usize = 31;

/// Primary service.
pub const SERVICE_UUID: u128 = 0xe1f40400_78fc_4c5f_9aee_9f4d6a1d0001;
/// Status characteristic (read, notify).
pub const STATUS_UUID: u128 = 0xe1f40400_78fc_4c5f_9aee_9f4d6a1d0002;
/// Ingest characteristic (write).
pub const INGEST_UUID: u128 = 0xe1f40400_78fc_4c5f_9aee_9f4d6a1d0003;
/// Proxy characteristic (write, notify).
pub const PROXY_UUID: u128 = 0xe1f40400_78fc_4c5f_9aee_9f4d6a1d0004;

/// Name advertised in the scan response.
pub const DEVICE_NAME: &str = "Chromatic";

const AD_FLAGS: u8 = 0x01;
const AD_COMPLETE_UUID128: u8 = 0x07;
const AD_COMPLETE_NAME: u8 = 0x09;
/// LE General Discoverable, BR/EDR not supported.
const FLAGS_GENERAL_NO_BREDR: u8 = 0x06;

/// One advertising-sized buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdPayload {
    buf: [u8; MAX_ADV_LEN],
    len: usize,
}

impl AdPayload {
    const fn new() -> Self {
        Self {
            buf: [0; MAX_ADV_LEN],
            len: 0,
        }
    }

    fn push_structure(&mut self, ad_type: u8, data: &[u8]) -> Result<(), SerializeError> {
        let end = self.len + 2 + data.len();
        if end > MAX_ADV_LEN {
            return Err(SerializeError::BufferTooSmall);
        }
        self.buf[self.len] = (data.len() + 1) as u8;
        self.buf[self.len + 1] = ad_type;
        self.buf[self.len + 2..end].copy_from_slice(data);
        self.len = end;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Advertising packet plus scan response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingData {
    pub adv: AdPayload,
    pub scan_response: AdPayload,
}

impl AdvertisingData {
    /// Build the payloads for a device called `name` offering `service`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if the name does not fit
    /// the scan response.
    pub fn new(name: &str, service: u128) -> Result<Self, SerializeError> {
        let mut adv = AdPayload::new();
        adv.push_structure(AD_FLAGS, &[FLAGS_GENERAL_NO_BREDR])?;
        adv.push_structure(AD_COMPLETE_UUID128, &service.to_le_bytes())?;

        let mut scan_response = AdPayload::new();
        scan_response.push_structure(AD_COMPLETE_NAME, name.as_bytes())?;

        Ok(Self { adv, scan_response })
    }
}
