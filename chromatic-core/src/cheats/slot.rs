//! A single cheat slot.

use chromatic_proto::record::StoredSlot;
use chromatic_proto::{CheatCode, CheatPatch};

/// One stored code with its decoded form.
///
/// A slot can only be enabled while its code decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CheatSlot {
    code: CheatCode,
    patch: Option<CheatPatch>,
    enabled: bool,
}

impl CheatSlot {
    /// A disabled slot holding `code`.
    #[must_use]
    pub fn new(code: CheatCode) -> Self {
        Self {
            code,
            patch: code.decode().ok(),
            enabled: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn code(&self) -> &CheatCode {
        &self.code
    }

    #[inline]
    #[must_use]
    pub fn patch(&self) -> Option<&CheatPatch> {
        self.patch.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.patch.is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Untouched default slot: valid, disabled, default code.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        !self.enabled && self.patch.is_some() && self.code == CheatCode::DEFAULT
    }

    /// Enable or disable. Enabling an undecodable code is refused.
    pub(crate) fn set_enabled(&mut self, enabled: bool) -> bool {
        if enabled && self.patch.is_none() {
            return false;
        }
        self.enabled = enabled;
        true
    }

    /// Replace the code text and re-derive the patch.
    pub(crate) fn set_code(&mut self, code: CheatCode) {
        self.code = code;
        self.patch = code.decode().ok();
        if self.patch.is_none() {
            self.enabled = false;
        }
    }

    pub(crate) fn to_stored(self) -> StoredSlot {
        let (raw_type, value, address) = self
            .patch
            .map_or((0, 0, 0), |p| (p.kind.as_u8(), p.value, p.address));
        StoredSlot {
            code: self.code,
            raw_type,
            value,
            address,
            enabled: self.enabled,
            valid: self.patch.is_some(),
        }
    }

    /// Rebuild from storage, trusting only the code text.
    pub(crate) fn from_stored(stored: &StoredSlot) -> Self {
        let mut slot = Self::new(stored.code);
        slot.set_enabled(stored.enabled);
        slot
    }
}

impl Default for CheatSlot {
    fn default() -> Self {
        Self::new(CheatCode::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_slot_cannot_enable() {
        let mut slot = CheatSlot::new(CheatCode::parse(b"02FF0000").unwrap());
        assert!(!slot.is_valid());
        assert!(!slot.set_enabled(true));
        assert!(!slot.is_enabled());
    }

    #[test]
    fn test_code_change_to_invalid_disables() {
        let mut slot = CheatSlot::new(CheatCode::parse(b"0105D2C8").unwrap());
        assert!(slot.set_enabled(true));
        slot.set_code(CheatCode::parse(b"0F05D2C8").unwrap());
        assert!(!slot.is_valid());
        assert!(!slot.is_enabled());
    }

    #[test]
    fn test_placeholder() {
        let mut slot = CheatSlot::default();
        assert!(slot.is_placeholder());
        slot.set_enabled(true);
        assert!(!slot.is_placeholder());
    }

    #[test]
    fn test_from_stored_revalidates() {
        let stored = StoredSlot {
            code: CheatCode::parse(b"7705D2C8").unwrap(),
            raw_type: 0x01,
            enabled: true,
            valid: true,
            ..StoredSlot::default()
        };
        let slot = CheatSlot::from_stored(&stored);
        assert!(!slot.is_valid());
        assert!(!slot.is_enabled());

        let good = CheatSlot::new(CheatCode::parse(b"91FF34C1").unwrap());
        assert_eq!(CheatSlot::from_stored(&good.to_stored()), good);
    }
}
