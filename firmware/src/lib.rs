//! Chromatic wireless bridge firmware for RP2040.
//!
//! Connects a phone over BLE to the handheld's co-processor. The phone
//! manages cheat codes and the proxy stream; the board drives the device
//! link and stores cheat records in flash.
//!
//! # Hardware
//!
//! | Function            | Peripheral | Pins            |
//! |---------------------|------------|-----------------|
//! | Device link         | UART0      | GPIO 0 TX, GPIO 1 RX |
//! | HCI controller      | UART1      | GPIO 4 TX, GPIO 5 RX |
//! | Buttons             | GPIO       | GPIO 10..=18    |
//!
//! # Tasks
//!
//! ```text
//! ble_task ──writes──> CHEAT_INPUT ──> cheat_task ──pokes──> COMMANDS
//!    ^  ^                                  │                    │
//!    │  └───────── STATUS <── render ──────┘                    v
//!    │     buttons_task ──> CHEAT_INPUT / SETTINGS ──────> device_task ──> UART0
//!    │
//!    └── WRAM window <── device_rx_task <── UART0 (game hash, WRAM chunks, framing)
//! ```
//!
//! # Features
//!
//! - `dev-panic` (default): panic-probe over RTT
//! - `prod-panic`: reset on panic

#![no_std]

pub mod ble;
pub mod buttons;
pub mod device_uart;
pub mod flash_store;
pub mod settings;
pub mod shared;

pub use ble::BleRadio;
pub use buttons::ButtonPad;
pub use device_uart::{DeviceUart, DeviceUartRx, DEVICE_BAUD};
pub use flash_store::FlashCheatStore;
pub use settings::{Settings, SharedSettings};
