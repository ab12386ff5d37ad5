//! Device command path: producers request, one writer frames and sends.
//!
//! ```text
//! buttons, cheats, menus ──request──▶ CommandQueue ──take──▶ DeviceWriter ──▶ UART
//!                                       ▲  │                        ▲
//!                        framing        │  └──────── Signal ────────┘
//! UART ──▶ DeviceReader ────────────────┘
//! ```
//!
//! Requests are coalesced per category. The writer drains everything
//! pending in one step and reads state payloads from [`DeviceSettings`]
//! when it builds each frame.
//!
//! [`DeviceReader`] watches the replies and switches the queue to the
//! framing the co-processor answers in.

mod flags;
mod queue;
mod reader;
mod settings;
mod writer;

pub use flags::TxFlags;
pub use queue::{CommandQueue, Drained, BOOT_RESYNC_COUNT, BOOT_RESYNC_GAP_MS, MAX_COLOR_TEMP};
pub use reader::DeviceReader;
pub use settings::DeviceSettings;
pub use writer::{DeviceWriter, WriterError, BRIGHTNESS_LEVELS};
