/*!
Port controller: the encoder, bit operations and checksum over one register.

The private `post` step is the only path that changes the register or touches
hardware. Encoder calls add each data word to the checksum *before* the
toggle mask is applied, so the checksum tracks payload content while the
register tracks what was physically sent.
*/

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::board::{BoardError, DoutDevice};
use crate::checksum::Checksum;
use crate::config::PortConfig;
use crate::delay::{Delay, StabilityDelay};
use crate::register::RegisterState;
use crate::sink::{HardwareSink, SinkError};
use crate::value::{check_string_length, split_u32, string_frame, Value};

/// Errors surfaced by posting and bit operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Malformed input. Nothing was changed.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The write to hardware failed. Register and checksum still hold the
    /// attempted value.
    #[error("Hardware write of {value:#010x} failed: {source}")]
    HardwareWrite { value: u32, source: SinkError },
}

impl PortError {
    /// Create a new argument error
    pub fn argument(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        debug!("Rejected argument: {}", msg);
        Self::Argument(msg)
    }

    /// Both variants leave the port in a consistent, usable state
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

/// Whether to hold the value on the port after a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pace {
    /// Hold for one stability interval so the sampler is guaranteed to see it
    #[default]
    Hold,
    /// Return immediately; the caller is about to post again
    Immediate,
}

/// The single digital output port
pub struct Port<S: HardwareSink, D: Delay = StabilityDelay> {
    sink: S,
    delay: D,
    register: RegisterState,
    checksum: Checksum,
}

impl<S: HardwareSink> Port<S, StabilityDelay> {
    /// Build a port from configuration with a monotonic stability hold
    pub fn from_config(sink: S, config: &PortConfig) -> Result<Self, PortError> {
        let mut port = Self::new(sink, StabilityDelay::new(config.hold()), config.bit_shift)?;
        port.toggle_bits_on_post(config.initial_toggle_mask);
        Ok(port)
    }
}

impl<S: HardwareSink, D: Delay> Port<S, D> {
    /// Create a port with a cleared register, zero checksum and no toggle mask
    pub fn new(sink: S, delay: D, bit_shift: u32) -> Result<Self, PortError> {
        Ok(Self {
            sink,
            delay,
            register: RegisterState::new(bit_shift)?,
            checksum: Checksum::default(),
        })
    }

    /// Current register value (after toggle, before shift)
    pub fn register(&self) -> u32 {
        self.register.value()
    }

    pub fn register_state(&self) -> &RegisterState {
        &self.register
    }

    pub fn toggle_mask(&self) -> u32 {
        self.register.toggle_mask()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Release the sink, dropping the port state
    pub fn into_sink(self) -> S {
        self.sink
    }

    // Encoder

    /// Post one data word
    pub fn post_int16(&mut self, word: u16, pace: Pace) -> Result<(), PortError> {
        self.post_words(&[word], pace)
    }

    /// Post a 32-bit integer as two data words, low then high
    pub fn post_int32(&mut self, value: u32, pace: Pace) -> Result<(), PortError> {
        self.post_words(&split_u32(value), pace)
    }

    /// Post the IEEE-754 bit pattern of `value` as two data words
    pub fn post_float(&mut self, value: f32, pace: Pace) -> Result<(), PortError> {
        self.post_words(&split_u32(value.to_bits()), pace)
    }

    /// Post `text` framed to `length` bytes, two bytes per data word
    pub fn post_string(&mut self, text: &[u8], length: usize, pace: Pace) -> Result<(), PortError> {
        check_string_length(length)?;
        self.post_words(&string_frame(text, length), pace)
    }

    /// Post any typed value
    pub fn post_value(&mut self, value: &Value, pace: Pace) -> Result<(), PortError> {
        if let Value::Text { length, .. } = value {
            check_string_length(*length)?;
        }
        let words = value.words();
        debug!("Posting {} as {} word(s)", value, words.len());
        self.post_words(&words, pace)
    }

    /// Post a frame of data words in order. A failed write does not stop the
    /// frame; the first failure is returned once every word has been sent.
    fn post_words(&mut self, words: &[u16], pace: Pace) -> Result<(), PortError> {
        let mut first_error = None;

        for &word in words {
            self.checksum.accumulate(u32::from(word));
            let raw = self.register.with_data_word(word);
            if let Err(e) = self.post(raw) {
                first_error.get_or_insert(e);
            }
            self.settle(pace);
        }

        first_error.map_or(Ok(()), Err)
    }

    // Bit operations

    /// Set the bits in `mask`
    pub fn set_bits(&mut self, mask: u32, pace: Pace) -> Result<(), PortError> {
        let raw = self.register.value() | mask;
        self.post_paced(raw, pace)
    }

    /// Clear the bits in `mask`
    pub fn clear_bits(&mut self, mask: u32, pace: Pace) -> Result<(), PortError> {
        let raw = self.register.value() & !mask;
        self.post_paced(raw, pace)
    }

    /// Flip the bits in `mask`
    pub fn toggle_bits(&mut self, mask: u32, pace: Pace) -> Result<(), PortError> {
        let raw = self.register.value() ^ mask;
        self.post_paced(raw, pace)
    }

    /// Flip `mask` on every following post until reset with 0. Does not post.
    pub fn toggle_bits_on_post(&mut self, mask: u32) {
        debug!("Toggle mask set to {:#010x}", mask);
        self.register.set_toggle_mask(mask);
    }

    // Checksum

    pub fn checksum(&self) -> u16 {
        self.checksum.get()
    }

    /// Overwrite the checksum, usually with 0 to start a new session
    pub fn set_checksum(&mut self, value: u16) {
        self.checksum.reset(value);
    }

    fn post_paced(&mut self, raw: u32, pace: Pace) -> Result<(), PortError> {
        let result = self.post(raw);
        self.settle(pace);
        result
    }

    fn settle(&mut self, pace: Pace) {
        if pace == Pace::Hold {
            self.delay.hold();
        }
    }

    /// Commit `raw` through the toggle mask and write the shifted value.
    /// The register keeps the new value even if the write fails.
    fn post(&mut self, raw: u32) -> Result<(), PortError> {
        let hardware = self.register.commit(raw);
        trace!(
            "Post register={:#010x} hardware={:#010x}",
            self.register.value(),
            hardware
        );

        self.sink.write_word(hardware).map_err(|source| {
            warn!("Error writing {:#010x} to port: {}", hardware, source);
            PortError::HardwareWrite {
                value: hardware,
                source,
            }
        })
    }
}

impl<S: DoutDevice, D: Delay> Port<S, D> {
    /// Release the board behind this port
    pub fn shutdown(self) -> Result<(), BoardError> {
        let mut device = self.into_sink();
        device.shutdown()
    }
}
