/*!
Stability hold between posts.

The acquisition side captures one register snapshot per sampling interval, so
a value must stay on the port for at least that long to be seen. The hold is a
deadline on the monotonic clock rather than a calibrated loop count.
*/

use std::thread;
use std::time::{Duration, Instant};

use crate::protocol::DEFAULT_HOLD_US;

/// Anything that can hold the current register value before returning
pub trait Delay {
    /// Block until the value just written has been on the port long enough
    fn hold(&mut self);
}

/// Deadline wait on [`Instant`] for a fixed hold duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityDelay {
    hold: Duration,
}

/// Holds longer than twice this sleep first and spin for the final stretch of
/// this length.
const SPIN_WINDOW: Duration = Duration::from_millis(1);

impl StabilityDelay {
    /// Create a delay that holds for `hold`
    pub fn new(hold: Duration) -> Self {
        Self { hold }
    }

    /// Create a delay from a hold in microseconds
    pub fn from_micros(us: u64) -> Self {
        Self::new(Duration::from_micros(us))
    }

    /// Configured hold duration
    pub fn duration(&self) -> Duration {
        self.hold
    }
}

impl Default for StabilityDelay {
    fn default() -> Self {
        Self::from_micros(DEFAULT_HOLD_US)
    }
}

impl Delay for StabilityDelay {
    fn hold(&mut self) {
        if self.hold.is_zero() {
            return;
        }

        let deadline = Instant::now() + self.hold;
        if self.hold > SPIN_WINDOW * 2 {
            thread::sleep(self.hold - SPIN_WINDOW);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// Delay that returns immediately and counts how often it was asked to hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountingDelay {
    holds: usize,
}

impl CountingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of holds requested so far
    pub fn holds(&self) -> usize {
        self.holds
    }
}

impl Delay for CountingDelay {
    fn hold(&mut self) {
        self.holds += 1;
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn hold(&mut self) {
        (**self).hold();
    }
}
