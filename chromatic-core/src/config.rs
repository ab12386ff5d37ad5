//! Compile-time defaults for the bridge.

use chromatic_proto::advert::DEVICE_NAME;

/// Largest single write accepted on the ingest and proxy characteristics.
pub const WRITE_CAP: usize = 256;

/// Size of the status characteristic response.
pub const STATUS_CAPACITY: usize = 256;

/// Bounded retry for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Total transmission attempts, first one included.
    pub attempts: u8,
    /// Pause between attempts.
    pub delay_ms: u32,
}

impl RetryPolicy {
    pub const DEFAULT: Self = Self {
        attempts: 5,
        delay_ms: 2,
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Tunables shared by the link, proxy and device writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfig {
    /// Name placed in the scan response.
    pub device_name: &'static str,
    pub notify_retry: RetryPolicy,
    /// Upper bound on how long the device writer sleeps with nothing pending.
    pub writer_poll_ms: u32,
    /// Period of the memory telemetry pushed to the phone. Floored at
    /// [`crate::telemetry::MIN_INTERVAL_MS`].
    pub telemetry_interval_ms: u32,
}

impl BridgeConfig {
    pub const DEFAULT: Self = Self {
        device_name: DEVICE_NAME,
        notify_retry: RetryPolicy::DEFAULT,
        writer_poll_ms: 100,
        telemetry_interval_ms: 1000,
    };
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
