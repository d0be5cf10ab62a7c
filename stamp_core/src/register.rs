/*!
Register state for the digital output port.

The register is split into an upper status word (bits 31:16) and a lower data
word (bits 15:0). This module owns the last value committed to the port, the
sticky toggle mask and the board-wiring bit shift.
*/

use crate::port::PortError;
use crate::protocol::{DATA_WORD_MASK, REGISTER_BITS, STATUS_WORD_MASK};

/// Last committed port value plus the transforms applied on every write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterState {
    value: u32,
    toggle_mask: u32,
    bit_shift: u32,
}

impl RegisterState {
    /// Create a cleared register with a fixed hardware bit shift
    pub fn new(bit_shift: u32) -> Result<Self, PortError> {
        if bit_shift >= REGISTER_BITS {
            return Err(PortError::argument(format!(
                "bit shift {} does not fit a {}-bit port",
                bit_shift, REGISTER_BITS
            )));
        }

        Ok(Self {
            value: 0,
            toggle_mask: 0,
            bit_shift,
        })
    }

    /// Current register value (post-toggle, pre-shift)
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Upper status word, bits 31:16
    pub fn status_word(&self) -> u16 {
        (self.value >> 16) as u16
    }

    /// Lower data word, bits 15:0
    pub fn data_word(&self) -> u16 {
        (self.value & DATA_WORD_MASK) as u16
    }

    pub fn toggle_mask(&self) -> u32 {
        self.toggle_mask
    }

    pub fn bit_shift(&self) -> u32 {
        self.bit_shift
    }

    /// Set the sticky toggle mask. Zero disables toggling.
    pub fn set_toggle_mask(&mut self, mask: u32) {
        self.toggle_mask = mask;
    }

    /// Raw value that places `word` on the data lines and keeps the current
    /// status word
    pub fn with_data_word(&self, word: u16) -> u32 {
        (self.value & STATUS_WORD_MASK) | u32::from(word)
    }

    /// Apply the toggle mask to `raw`, store it as the new register value and
    /// return the shifted value destined for hardware.
    pub fn commit(&mut self, raw: u32) -> u32 {
        self.value = raw ^ self.toggle_mask;
        self.hardware_value()
    }

    /// Register value as written to hardware. Bits shifted past bit 31 are
    /// dropped.
    pub fn hardware_value(&self) -> u32 {
        self.value << self.bit_shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_oversized_shift() {
        assert!(RegisterState::new(31).is_ok());
        assert!(matches!(RegisterState::new(32), Err(PortError::Argument(_))));
    }

    #[test]
    fn test_commit_applies_toggle_then_shift() {
        let mut reg = RegisterState::new(4).unwrap();
        reg.set_toggle_mask(0x0000_FF00);
        let hw = reg.commit(0x0000_0001);
        assert_eq!(reg.value(), 0x0000_FF01);
        assert_eq!(hw, 0x000F_F010);
    }

    #[test]
    fn test_data_word_keeps_status_word() {
        let mut reg = RegisterState::new(0).unwrap();
        reg.commit(0x0006_1234);
        assert_eq!(reg.with_data_word(0xBEEF), 0x0006_BEEF);
        assert_eq!(reg.status_word(), 0x0006);
        assert_eq!(reg.data_word(), 0x1234);
    }

    #[test]
    fn test_shift_drops_high_bits() {
        let mut reg = RegisterState::new(8).unwrap();
        assert_eq!(reg.commit(0xAB00_0001), 0x0000_0100);
        assert_eq!(reg.value(), 0xAB00_0001);
    }
}
