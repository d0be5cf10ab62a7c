/*!
Running 16-bit checksum of posted data words.
*/

use crate::protocol::DATA_WORD_MASK;

/// 16-bit wrapping sum of every data word posted since the last reset.
///
/// Only data words count. Bit operations and the toggle mask never touch it,
/// so the receiver can validate payload integrity independently of the
/// signaling on the status bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum(u16);

impl Checksum {
    /// Create a checksum starting at `initial`
    pub fn new(initial: u16) -> Self {
        Self(initial)
    }

    /// Add the low 16 bits of `word`, wrapping modulo 65536
    pub fn accumulate(&mut self, word: u32) {
        self.0 = self.0.wrapping_add((word & DATA_WORD_MASK) as u16);
    }

    /// Current checksum value
    pub fn get(&self) -> u16 {
        self.0
    }

    /// Overwrite the checksum, usually with 0 to start a new session
    pub fn reset(&mut self, value: u16) {
        self.0 = value;
    }
}
