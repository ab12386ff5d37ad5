//! Board settings served to the device writer.

use core::cell::Cell;

use chromatic_core::device::{DeviceSettings, TxFlags};
use chromatic_proto::{PaletteWords, SysCtl};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::shared::COMMANDS;

/// Backlight level after power-on.
pub const DEFAULT_BRIGHTNESS: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct Settings {
    pub brightness: u8,
    pub sys_ctl: SysCtl,
    pub poked_buttons: u16,
    /// `None` in GBC color mode.
    pub palette: Option<PaletteWords>,
}

impl Settings {
    pub const DEFAULT: Self = Self {
        brightness: DEFAULT_BRIGHTNESS,
        sys_ctl: SysCtl {
            mute: false,
            frame_blend: false,
            color_correction: chromatic_proto::ColorCorrection {
                lcd: false,
                usb: false,
            },
            player_number: 0,
            reject_diagonals: false,
            screen_transition_fix: false,
            low_battery_icon: 0,
        },
        poked_buttons: 0,
        palette: None,
    };
}

/// Settings shared between the tasks that change them and the writer.
pub struct SharedSettings {
    inner: Mutex<CriticalSectionRawMutex, Cell<Settings>>,
}

impl SharedSettings {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(Settings::DEFAULT)),
        }
    }

    pub fn get(&self) -> Settings {
        self.inner.lock(Cell::get)
    }

    /// Change the settings and request the matching device commands.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let (before, after) = self.inner.lock(|cell| {
            let before = cell.get();
            let mut after = before;
            f(&mut after);
            cell.set(after);
            (before, after)
        });

        let mut flags = TxFlags::NONE;
        if before.brightness != after.brightness {
            flags |= TxFlags::BRIGHTNESS;
        }
        if before.sys_ctl != after.sys_ctl {
            flags |= TxFlags::SYS_CTL;
        }
        if before.poked_buttons != after.poked_buttons {
            flags |= TxFlags::POKE_BUTTON;
        }
        if before.palette != after.palette {
            flags |= TxFlags::PALETTE;
        }
        if !flags.is_empty() {
            COMMANDS.request(flags);
        }
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSettings for SharedSettings {
    fn brightness(&self) -> u8 {
        self.get().brightness
    }

    fn sys_ctl(&self) -> SysCtl {
        self.get().sys_ctl
    }

    fn poked_buttons(&self) -> u16 {
        self.get().poked_buttons
    }

    fn palette(&self) -> Option<PaletteWords> {
        self.get().palette
    }
}
