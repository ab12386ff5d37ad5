use chromatic_proto::{PaletteWords, SysCtl};

/// Current device settings, read at drain time.
///
/// Payloads for state categories are never cached in the queue. The writer
/// asks for the latest value when it builds the frame.
pub trait DeviceSettings {
    /// Backlight level. Levels of 16 and above are not sent.
    fn brightness(&self) -> u8;

    fn sys_ctl(&self) -> SysCtl;

    /// Button mask injected into the co-processor.
    fn poked_buttons(&self) -> u16;

    /// Palette registers, or `None` when palettes do not apply (GBC color
    /// mode).
    fn palette(&self) -> Option<PaletteWords>;
}

impl<T: DeviceSettings + ?Sized> DeviceSettings for &T {
    fn brightness(&self) -> u8 {
        (**self).brightness()
    }

    fn sys_ctl(&self) -> SysCtl {
        (**self).sys_ctl()
    }

    fn poked_buttons(&self) -> u16 {
        (**self).poked_buttons()
    }

    fn palette(&self) -> Option<PaletteWords> {
        (**self).palette()
    }
}
