/*!
# Digital Output Posting Core

This crate drives a single 32-bit digital output port that is sampled by an
independent acquisition system at a fixed rate. Values wider than the 16-bit
data word are serialized into sequential word writes, each held long enough to
be captured, and every data word is folded into a 16-bit checksum so the
receiver can verify what was sent.

## Core Types

- [`Port`] - Register model, encoder and bit operations over a hardware sink
- [`Value`] - Typed values and their word framing
- [`Checksum`] - 16-bit wrapping checksum of posted data words
- [`StabilityDelay`] - Monotonic hold between posts

## Modules

- [`register`] - Register state, toggle mask and bit shift
- [`board`] - Board discovery and digital output configuration
- [`sim`] - Simulated board used by the CLI and tests
- [`status`] - Named status bits on the upper word
- [`error`] - Common error types
*/

pub mod board;
pub mod checksum;
pub mod config;
pub mod delay;
pub mod error;
pub mod port;
pub mod register;
pub mod sim;
pub mod sink;
pub mod status;
pub mod value;

// Re-export commonly used types
pub use board::{initialize, BoardError, BoardInfo, DoutConfig, DoutDevice, Driver};
pub use checksum::Checksum;
pub use config::PortConfig;
pub use delay::{CountingDelay, Delay, StabilityDelay};
pub use error::{Result, StampError};
pub use port::{Pace, Port, PortError};
pub use register::RegisterState;
pub use sink::{HardwareSink, RecordingSink, SinkError};
pub use status::StatusBit;
pub use value::Value;

/// Version information for the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    /// Lower half of the register, carries data words
    pub const DATA_WORD_MASK: u32 = 0x0000_FFFF;

    /// Upper half of the register, carries status/sync bits
    pub const STATUS_WORD_MASK: u32 = 0xFFFF_0000;

    /// Width of the register in bits
    pub const REGISTER_BITS: u32 = 32;

    /// Data strobe. Toggled to signal new header or checksum data on the port.
    pub const DATA: u32 = 0x0001_0000;

    /// Sweep bit. A positive edge marks a new stimulus sweep, low means pause.
    pub const SWEEP: u32 = 0x0002_0000;

    /// Run bit. Must be high before the receiver listens to any other line.
    pub const RUN: u32 = 0x0004_0000;

    /// Refresh bit. Toggled to signal new frame-related data.
    pub const REFRESH: u32 = 0x0008_0000;

    /// Largest value that fits on the 16 data lines
    pub const MAX_POSTABLE_INT: u32 = 0x0000_FFFF;

    /// Default hold after a post, in microseconds. A 25 kHz sampler captures
    /// one snapshot every 40 us.
    pub const DEFAULT_HOLD_US: u64 = 50;

    /// Longest hold accepted from configuration, in microseconds
    pub const MAX_HOLD_US: u64 = 1_000_000;

    /// Default digital output resolution requested from the board
    pub const DEFAULT_RESOLUTION: u32 = 32;

    /// Longest string frame, in bytes
    pub const MAX_STRING_LEN: usize = 0xFFFF;
}
