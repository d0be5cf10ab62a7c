/*!
Board discovery and digital output configuration.

A [`Driver`] enumerates candidate boards and opens them. [`initialize`] walks
the candidates in order, keeps the first that opens, claims its digital output
subsystem and configures it for single-value writes. The resulting device is
the [`HardwareSink`] a [`crate::Port`] writes to.
*/

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::sink::HardwareSink;

/// Errors from board discovery, configuration and release
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// No compatible board, or a fault while enumerating
    #[error("Board discovery failed: {0}")]
    Discovery(String),

    /// Board found, but its digital output subsystem could not be claimed
    /// or configured
    #[error("Digital output subsystem on {board} could not be configured: {reason}")]
    SubsystemConfig { board: String, reason: String },

    /// Releasing the board failed
    #[error("Board shutdown failed: {0}")]
    Shutdown(String),
}

impl BoardError {
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    pub fn subsystem(board: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SubsystemConfig {
            board: board.into(),
            reason: reason.into(),
        }
    }

    pub fn shutdown(msg: impl Into<String>) -> Self {
        Self::Shutdown(msg.into())
    }
}

/// Identity of an enumerated board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    /// Board name as reported by the driver
    pub name: String,
    /// Driver registry entry for the board
    pub entry: String,
}

impl BoardInfo {
    pub fn new(name: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: entry.into(),
        }
    }
}

/// How the digital output subsystem moves data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFlow {
    /// One value per write call
    SingleValue,
    /// Buffered streaming
    Continuous,
}

/// Digital output subsystem configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoutConfig {
    pub data_flow: DataFlow,
    /// Number of output lines driven, in bits
    pub resolution: u32,
}

impl Default for DoutConfig {
    fn default() -> Self {
        Self {
            data_flow: DataFlow::SingleValue,
            resolution: crate::protocol::DEFAULT_RESOLUTION,
        }
    }
}

/// Subsystem element counts reported by a board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub analog_in: u32,
    pub analog_out: u32,
    pub digital_in: u32,
    pub digital_out: u32,
    pub counter_timer: u32,
    pub serial: u32,
}

impl Capabilities {
    pub fn total(&self) -> u32 {
        self.analog_in
            + self.analog_out
            + self.digital_in
            + self.digital_out
            + self.counter_timer
            + self.serial
    }
}

/// An opened board whose digital output subsystem accepts raw port values
pub trait DoutDevice: HardwareSink {
    fn info(&self) -> &BoardInfo;

    fn capabilities(&self) -> Capabilities;

    /// Claim the digital output subsystem and apply `config`
    fn configure(&mut self, config: &DoutConfig) -> Result<(), BoardError>;

    /// Release the subsystem and the board. Safe to call more than once.
    fn shutdown(&mut self) -> Result<(), BoardError>;
}

/// Source of candidate boards
pub trait Driver {
    type Device: DoutDevice;

    /// List installed boards in driver order
    fn enumerate(&mut self) -> Result<Vec<BoardInfo>, BoardError>;

    /// Open one board
    fn open(&mut self, board: &BoardInfo) -> Result<Self::Device, BoardError>;
}

/// Open the first board that initializes and configure its digital output
/// subsystem. Boards that fail to open are skipped; any failure after a board
/// has been chosen is fatal.
pub fn initialize<D: Driver>(driver: &mut D, config: &DoutConfig) -> Result<D::Device, BoardError> {
    let boards = driver.enumerate()?;
    if boards.is_empty() {
        return Err(BoardError::discovery("no boards found"));
    }

    let mut device = None;
    let mut last_error = None;
    for board in &boards {
        match driver.open(board) {
            Ok(opened) => {
                info!("🔌 Opened board {} ({})", board.name, board.entry);
                device = Some(opened);
                break;
            }
            Err(e) => {
                warn!("Board {} did not initialize: {}", board.name, e);
                last_error = Some(e);
            }
        }
    }

    let mut device = device.ok_or_else(|| {
        BoardError::discovery(match last_error {
            Some(e) => format!("none of {} board(s) initialized, last error: {}", boards.len(), e),
            None => format!("none of {} board(s) initialized", boards.len()),
        })
    })?;

    let caps = device.capabilities();
    info!(
        "📊 Subsystems on {}: AD {} DA {} DIN {} DOUT {} Timer {} Serial {} Total {}",
        device.info().name,
        caps.analog_in,
        caps.analog_out,
        caps.digital_in,
        caps.digital_out,
        caps.counter_timer,
        caps.serial,
        caps.total()
    );

    if caps.digital_out == 0 {
        return Err(BoardError::subsystem(
            device.info().name.clone(),
            "board has no digital output subsystem",
        ));
    }

    device.configure(config)?;
    info!(
        "✅ Digital output configured: {:?}, {} bit(s)",
        config.data_flow, config.resolution
    );

    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBoardSpec, SimDriver};

    #[test]
    fn test_picks_first_board_that_opens() {
        let mut driver = SimDriver::new(vec![
            SimBoardSpec::new("DT3010").failing_init(),
            SimBoardSpec::new("DT340"),
            SimBoardSpec::new("DT340-B"),
        ]);
        let device = initialize(&mut driver, &DoutConfig::default()).unwrap();
        assert_eq!(device.info().name, "DT340");
        assert_eq!(device.configured(), Some(DoutConfig::default()));
    }

    #[test]
    fn test_no_boards_is_discovery_error() {
        let mut driver = SimDriver::new(Vec::new());
        let err = initialize(&mut driver, &DoutConfig::default()).unwrap_err();
        assert!(matches!(err, BoardError::Discovery(_)));
    }

    #[test]
    fn test_all_boards_failing_is_discovery_error() {
        let mut driver = SimDriver::new(vec![SimBoardSpec::new("DT340").failing_init()]);
        let err = initialize(&mut driver, &DoutConfig::default()).unwrap_err();
        assert!(matches!(err, BoardError::Discovery(msg) if msg.contains("last error")));
    }

    #[test]
    fn test_missing_dout_is_subsystem_error() {
        let mut driver = SimDriver::new(vec![SimBoardSpec::new("AD-only").digital_out(0)]);
        let err = initialize(&mut driver, &DoutConfig::default()).unwrap_err();
        assert!(matches!(err, BoardError::SubsystemConfig { .. }));
    }

    #[test]
    fn test_unsupported_resolution_is_subsystem_error() {
        let mut driver = SimDriver::new(vec![SimBoardSpec::new("DT340").max_resolution(16)]);
        let config = DoutConfig { data_flow: DataFlow::SingleValue, resolution: 32 };
        let err = initialize(&mut driver, &config).unwrap_err();
        assert!(matches!(err, BoardError::SubsystemConfig { .. }));
    }

    #[test]
    fn test_capabilities_total() {
        let caps = Capabilities { digital_in: 1, digital_out: 2, counter_timer: 3, ..Default::default() };
        assert_eq!(caps.total(), 6);
    }
}
