//! Wire formats for the Chromatic wireless bridge.
//!
//! This crate holds every byte layout the bridge speaks, with no state:
//!
//! - **Device frames**: commands to the emulation co-processor
//!   - [`CommandId`] - Command identifiers
//!   - [`ProtocolVersion`] - Legacy 4-byte or versioned CRC frames
//!   - [`serialize_frame()`] - Frame serializer
//!   - [`CheatPoke`], [`SysCtl`], [`PaletteWords`] - Structured payloads
//!   - [`ReplyParser`] - Replies from the co-processor, which also reveal
//!     the framing it speaks
//!
//! - **Cheat codes**: GameShark-style code text
//!   - [`CheatCode`] - 8-character hex code
//!   - [`CheatPatch`] - Decoded type/value/address
//!   - [`CheatRecord`] - Persisted slot table
//!
//! - **Wireless link**: payloads exchanged with the phone application
//!   - [`ProxyMessage`] - Inbound proxy message decoder
//!   - [`AdvertisingData`] - Advertising and scan response payloads
//!
//! # Device Frame Format
//!
//! Legacy frames are exactly 4 bytes:
//!
//! ```text
//! <0x5A> <id> <payload hi> <payload lo>
//! ```
//!
//! Versioned frames carry a length and a trailing CRC-8/SAE-J1850:
//!
//! ```text
//! <0xA5> <id> <len> <payload[len]> <crc8>
//! ```
//!
//! # Example
//!
//! ```
//! use chromatic_proto::{serialize_frame, CheatCode, CheatPoke, CommandId, ProtocolVersion};
//!
//! let patch = CheatCode::parse(b"0163A0DA").unwrap().decode().unwrap();
//! let poke = CheatPoke::from_patch(0, true, &patch).unwrap();
//!
//! let mut buf = [0u8; chromatic_proto::MAX_FRAME_SIZE];
//! let len = serialize_frame(&mut buf, ProtocolVersion::Versioned, CommandId::CheatPoke, &poke.to_bytes()).unwrap();
//! assert_eq!(&buf[..3], &[0xA5, 0x0E, 6]);
//! assert_eq!(len, 10);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//! - **`heapless`**: Enable [`frame::serialize_frame_to_vec()`]
//! - **`embedded-io`**: Enable [`frame::serialize_frame_io()`] for blocking I/O peripherals

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod advert;
pub mod cheat;
pub mod command;
pub mod crc;
pub mod fmt;
pub mod frame;
pub mod payload;
pub mod proxy;
pub mod record;
pub mod reply;

pub use advert::{AdvertisingData, DEVICE_NAME, SERVICE_UUID};
pub use cheat::{CheatCode, CheatPatch, CheatType, CodeError, CODE_LEN};
pub use command::{CommandId, ProtocolVersion};
pub use frame::{serialize_frame, SerializeError, MAX_FRAME_SIZE, MAX_PAYLOAD_LEN};
pub use payload::{CheatPoke, ColorCorrection, PaletteWords, SysCtl, MAX_CHEAT_SLOTS};
pub use proxy::{DecodeError, ProxyMessage, ProxyOpcode, MAX_PROXY_MESSAGE};
pub use record::{CheatRecord, RecordError, StoredSlot};
pub use reply::{Reply, ReplyError, ReplyFrame, ReplyId, ReplyParser};
