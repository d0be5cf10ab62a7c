/*!
Port configuration.
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::board::{DataFlow, DoutConfig};
use crate::error::{Result, StampError};
use crate::protocol::{DEFAULT_HOLD_US, DEFAULT_RESOLUTION, MAX_HOLD_US, REGISTER_BITS};

/// Fixed parameters of one digital output port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Bits to shift every value up by before it reaches hardware, set by
    /// the wiring of the acquisition panel
    pub bit_shift: u32,

    /// How long each held post stays on the port, in microseconds. Must cover
    /// at least one sampling interval of the receiver.
    pub hold_us: u64,

    /// Digital output resolution requested from the board
    pub resolution: u32,

    /// Toggle mask active from the first post
    pub initial_toggle_mask: u32,
}

impl PortConfig {
    /// Stability hold as a duration
    pub fn hold(&self) -> Duration {
        Duration::from_micros(self.hold_us)
    }

    /// Board configuration for single-value output at the requested resolution
    pub fn dout_config(&self) -> DoutConfig {
        DoutConfig {
            data_flow: DataFlow::SingleValue,
            resolution: self.resolution,
        }
    }

    /// Check the values against the register geometry
    pub fn validate(&self) -> Result<()> {
        if self.bit_shift >= REGISTER_BITS {
            return Err(StampError::config(format!(
                "bit_shift {} must be below {}",
                self.bit_shift, REGISTER_BITS
            )));
        }
        if self.resolution == 0 || self.resolution > REGISTER_BITS {
            return Err(StampError::config(format!(
                "resolution {} must be between 1 and {}",
                self.resolution, REGISTER_BITS
            )));
        }
        if self.hold_us > MAX_HOLD_US {
            return Err(StampError::config(format!(
                "hold_us {} must not exceed {}",
                self.hold_us, MAX_HOLD_US
            )));
        }
        Ok(())
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            bit_shift: 0,
            hold_us: DEFAULT_HOLD_US,
            resolution: DEFAULT_RESOLUTION,
            initial_toggle_mask: 0,
        }
    }
}
