//! Board buttons driving the cheat menu.
//!
//! # Pins
//!
//! | Function | GPIO |
//! |----------|------|
//! | Up       | 10   |
//! | Down     | 11   |
//! | Left     | 12   |
//! | Right    | 13   |
//! | A        | 14   |
//! | B        | 15   |
//! | Start    | 16   |
//! | Select   | 17   |
//! | Menu     | 18   |
//!
//! All buttons are active low with internal pull-ups. With the menu closed,
//! Up and Down step the backlight.

use chromatic_core::cheats::CheatButton;
use embassy_rp::gpio::Input;
use embassy_time::{Duration, Ticker};

use crate::shared::{CheatInput, CHEAT_INPUT, SETTINGS};

/// Scan period; also the debounce window.
pub const SCAN_PERIOD: Duration = Duration::from_millis(10);

/// Highest backlight level the buttons select.
pub const MAX_BRIGHTNESS: u8 = 15;

const MAP: [CheatButton; 8] = [
    CheatButton::Up,
    CheatButton::Down,
    CheatButton::Left,
    CheatButton::Right,
    CheatButton::A,
    CheatButton::B,
    CheatButton::Start,
    CheatButton::Select,
];

/// Scans the button inputs.
pub struct ButtonPad<'d> {
    pad: [Input<'d>; 8],
    menu: Input<'d>,
    held: u16,
    menu_open: bool,
}

impl<'d> ButtonPad<'d> {
    /// `pad` follows the order of the pin table.
    #[must_use]
    pub fn new(pad: [Input<'d>; 8], menu: Input<'d>) -> Self {
        Self {
            pad,
            menu,
            held: 0,
            menu_open: false,
        }
    }

    fn sample(&self) -> u16 {
        let mut mask = 0;
        for (i, input) in self.pad.iter().enumerate() {
            if input.is_low() {
                mask |= 1 << i;
            }
        }
        if self.menu.is_low() {
            mask |= 1 << 8;
        }
        mask
    }

    /// Scan forever, forwarding fresh presses.
    pub async fn run(&mut self) -> ! {
        let mut ticker = Ticker::every(SCAN_PERIOD);
        loop {
            ticker.next().await;
            let now = self.sample();
            let pressed = now & !self.held;
            self.held = now;
            if pressed != 0 {
                self.dispatch(pressed).await;
            }
        }
    }

    async fn dispatch(&mut self, pressed: u16) {
        if pressed & (1 << 8) != 0 {
            self.menu_open = !self.menu_open;
            CHEAT_INPUT.send(CheatInput::Menu(self.menu_open)).await;
        }

        for (i, &button) in MAP.iter().enumerate() {
            if pressed & (1 << i) == 0 {
                continue;
            }
            if self.menu_open {
                CHEAT_INPUT.send(CheatInput::Button(button)).await;
                continue;
            }
            match button {
                CheatButton::Up => SETTINGS.update(|s| {
                    s.brightness = s.brightness.saturating_add(1).min(MAX_BRIGHTNESS);
                }),
                CheatButton::Down => SETTINGS.update(|s| {
                    s.brightness = s.brightness.saturating_sub(1);
                }),
                _ => {}
            }
        }
    }
}
