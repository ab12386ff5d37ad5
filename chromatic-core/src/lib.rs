//! Platform-agnostic state machines for the Chromatic wireless bridge.
//!
//! Nothing here touches hardware. Radio, notification transport, flash and
//! the device byte stream are reached through traits, so every module runs
//! on the host under test.
//!
//! # Overview
//!
//! - [`link`]: Advertising and connection lifecycle ([`LinkStateMachine`])
//! - [`proxy`]: Notify-with-retry byte pipe to the phone ([`ProxyChannel`])
//! - [`status`]: Status read payload and ingest writes
//! - [`cheats`]: Cheat slots, editing, import/export, persistence ([`CheatEngine`])
//! - [`device`]: Coalescing command queue, frame writer and reply reader ([`CommandQueue`], [`DeviceWriter`], [`DeviceReader`])
//! - [`router`]: Proxy application messages ([`ProxyRouter`])
//! - [`telemetry`]: Periodic memory telemetry to the phone ([`Telemetry`])
//! - [`config`]: Compile-time defaults ([`BridgeConfig`])
//!
//! # Contexts
//!
//! ```text
//! radio events ──▶ LinkStateMachine ──▶ ProxyChannel ──▶ ProxyRouter
//!                        │
//!                        └── ingest ──▶ CheatEngine ──▶ CommandQueue ──▶ DeviceWriter ──▶ UART
//! ```
//!
//! Producers only ever request work on the [`CommandQueue`]. The
//! [`DeviceWriter`] is the single place frames are written.
//!
//! # Example
//!
//! ```rust
//! use chromatic_core::device::{CommandQueue, TxFlags};
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//!
//! let queue = CommandQueue::<NoopRawMutex>::new();
//! queue.request(TxFlags::SYS_CTL);
//! queue.request(TxFlags::SYS_CTL);
//!
//! let drained = queue.take().unwrap();
//! assert_eq!(drained.flags, TxFlags::SYS_CTL);
//! assert!(queue.take().is_none());
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log through defmt and derive `defmt::Format`
//! - **`log`**: Log through the `log` facade

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

// This must go first so the macros are visible to the other modules.
#[macro_use]
mod fmt;

pub mod cheats;
pub mod config;
pub mod device;
pub mod link;
pub mod proxy;
pub mod router;
pub mod status;
pub mod telemetry;

// Re-export main types at crate root
pub use cheats::{CheatButton, CheatEngine, CheatSink, CheatStore, GameKey};
pub use config::{BridgeConfig, RetryPolicy};
pub use device::{CommandQueue, DeviceReader, DeviceSettings, DeviceWriter, TxFlags, WriterError};
pub use link::{Characteristic, LinkEvent, LinkState, LinkStateMachine, RadioError, RadioStack};
pub use proxy::{NotifyTransport, ProxyChannel, ProxyConsumer, ProxyError, TransportError};
pub use router::{ProxyRouter, RouterError, RouterEvent};
pub use telemetry::{MemoryWindow, Telemetry};
