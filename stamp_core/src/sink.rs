/*!
Hardware sink boundary.

The sink receives the final raw value for the port, already toggled and
shifted. It never sees data words or the checksum.
*/

use thiserror::Error;
use tracing::trace;

/// Errors reported by a single hardware write
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("device rejected write (code {0})")]
    Rejected(i32),

    #[error("digital output subsystem is not configured")]
    NotConfigured,

    #[error("device is closed")]
    Closed,
}

/// Destination for raw port values
pub trait HardwareSink {
    /// Write one raw 32-bit value to the port. Never retried by the caller.
    fn write_word(&mut self, raw: u32) -> Result<(), SinkError>;
}

impl<S: HardwareSink + ?Sized> HardwareSink for &mut S {
    fn write_word(&mut self, raw: u32) -> Result<(), SinkError> {
        (**self).write_word(raw)
    }
}

impl<S: HardwareSink + ?Sized> HardwareSink for Box<S> {
    fn write_word(&mut self, raw: u32) -> Result<(), SinkError> {
        (**self).write_word(raw)
    }
}

/// In-memory sink that records every attempted write
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    writes: Vec<u32>,
    failing: Option<i32>,
    failures: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail with `code`, or succeed again with `None`
    pub fn set_failing(&mut self, code: Option<i32>) {
        self.failing = code;
    }

    /// Every value handed to the sink, failed writes included
    pub fn writes(&self) -> &[u32] {
        &self.writes
    }

    /// Most recent value handed to the sink
    pub fn last(&self) -> Option<u32> {
        self.writes.last().copied()
    }

    /// Number of writes that reported failure
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn clear(&mut self) {
        self.writes.clear();
        self.failures = 0;
    }
}

impl HardwareSink for RecordingSink {
    fn write_word(&mut self, raw: u32) -> Result<(), SinkError> {
        self.writes.push(raw);
        match self.failing {
            Some(code) => {
                self.failures += 1;
                Err(SinkError::Rejected(code))
            }
            None => {
                trace!("Recorded write {:#010x}", raw);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_records_failures() {
        let mut sink = RecordingSink::new();
        sink.write_word(1).unwrap();
        sink.set_failing(Some(-7));
        assert_eq!(sink.write_word(2), Err(SinkError::Rejected(-7)));
        assert_eq!(sink.writes(), &[1, 2]);
        assert_eq!(sink.failures(), 1);
        assert_eq!(sink.last(), Some(2));
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let mut boxed: Box<dyn HardwareSink> = Box::new(RecordingSink::new());
        assert!(boxed.write_word(0xFFFF).is_ok());
    }
}
