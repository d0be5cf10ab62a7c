/*!
Simulated digital output board.

Stands in for a physical board when none is installed. Every successful write
lands in a shared [`WriteLog`] so callers can inspect exactly what reached the
port, and faults can be injected at each lifecycle step.
*/

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::board::{BoardError, BoardInfo, Capabilities, DataFlow, DoutConfig, DoutDevice, Driver};
use crate::sink::{HardwareSink, SinkError};

/// Raw values written to a simulated port, in order
pub type WriteLog = Rc<RefCell<Vec<u32>>>;

/// Description of one simulated board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBoardSpec {
    pub name: String,
    pub fails_init: bool,
    pub fails_shutdown: bool,
    pub digital_out: u32,
    pub max_resolution: u32,
}

impl SimBoardSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fails_init: false,
            fails_shutdown: false,
            digital_out: 1,
            max_resolution: 32,
        }
    }

    /// Board refuses to open
    pub fn failing_init(mut self) -> Self {
        self.fails_init = true;
        self
    }

    /// Board reports an error when released
    pub fn failing_shutdown(mut self) -> Self {
        self.fails_shutdown = true;
        self
    }

    pub fn digital_out(mut self, elements: u32) -> Self {
        self.digital_out = elements;
        self
    }

    pub fn max_resolution(mut self, bits: u32) -> Self {
        self.max_resolution = bits;
        self
    }
}

/// Driver over a fixed list of simulated boards sharing one write log
#[derive(Debug, Clone)]
pub struct SimDriver {
    boards: Vec<SimBoardSpec>,
    log: WriteLog,
    write_fault: Rc<Cell<Option<i32>>>,
}

impl SimDriver {
    pub fn new(boards: Vec<SimBoardSpec>) -> Self {
        Self {
            boards,
            log: Rc::new(RefCell::new(Vec::new())),
            write_fault: Rc::new(Cell::new(None)),
        }
    }

    /// Driver with one healthy board
    pub fn single(name: impl Into<String>) -> Self {
        Self::new(vec![SimBoardSpec::new(name)])
    }

    /// Handle on the values written by any board from this driver
    pub fn log(&self) -> WriteLog {
        Rc::clone(&self.log)
    }

    /// Make writes fail with `code`, or succeed again with `None`
    pub fn set_write_fault(&self, code: Option<i32>) {
        self.write_fault.set(code);
    }
}

impl Driver for SimDriver {
    type Device = SimBoard;

    fn enumerate(&mut self) -> Result<Vec<BoardInfo>, BoardError> {
        Ok(self
            .boards
            .iter()
            .enumerate()
            .map(|(i, spec)| BoardInfo::new(spec.name.clone(), format!("sim{}", i)))
            .collect())
    }

    fn open(&mut self, board: &BoardInfo) -> Result<SimBoard, BoardError> {
        let spec = self
            .boards
            .iter()
            .find(|spec| spec.name == board.name)
            .ok_or_else(|| BoardError::discovery(format!("unknown board {}", board.name)))?;

        if spec.fails_init {
            return Err(BoardError::discovery(format!("{} failed to initialize", board.name)));
        }

        Ok(SimBoard {
            info: board.clone(),
            spec: spec.clone(),
            log: Rc::clone(&self.log),
            write_fault: Rc::clone(&self.write_fault),
            configured: None,
            open: true,
        })
    }
}

/// An opened simulated board
#[derive(Debug)]
pub struct SimBoard {
    info: BoardInfo,
    spec: SimBoardSpec,
    log: WriteLog,
    write_fault: Rc<Cell<Option<i32>>>,
    configured: Option<DoutConfig>,
    open: bool,
}

impl SimBoard {
    /// Configuration applied to the digital output subsystem, if any
    pub fn configured(&self) -> Option<DoutConfig> {
        self.configured
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn log(&self) -> WriteLog {
        Rc::clone(&self.log)
    }
}

impl HardwareSink for SimBoard {
    fn write_word(&mut self, raw: u32) -> Result<(), SinkError> {
        if !self.open {
            return Err(SinkError::Closed);
        }
        if self.configured.is_none() {
            return Err(SinkError::NotConfigured);
        }
        if let Some(code) = self.write_fault.get() {
            return Err(SinkError::Rejected(code));
        }

        trace!("{} <- {:#010x}", self.info.name, raw);
        self.log.borrow_mut().push(raw);
        Ok(())
    }
}

impl DoutDevice for SimBoard {
    fn info(&self) -> &BoardInfo {
        &self.info
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            analog_in: 0,
            analog_out: 0,
            digital_in: 1,
            digital_out: self.spec.digital_out,
            counter_timer: 4,
            serial: 0,
        }
    }

    fn configure(&mut self, config: &DoutConfig) -> Result<(), BoardError> {
        if self.spec.digital_out == 0 {
            return Err(BoardError::subsystem(&self.info.name, "unable to claim digital output subsystem"));
        }
        if config.data_flow != DataFlow::SingleValue {
            return Err(BoardError::subsystem(&self.info.name, "only single-value data flow is supported"));
        }
        if config.resolution == 0 || config.resolution > self.spec.max_resolution {
            return Err(BoardError::subsystem(
                &self.info.name,
                format!(
                    "resolution {} outside 1..={}",
                    config.resolution, self.spec.max_resolution
                ),
            ));
        }

        debug!("{} configured: {:?}", self.info.name, config);
        self.configured = Some(*config);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), BoardError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.configured = None;

        if self.spec.fails_shutdown {
            return Err(BoardError::shutdown(format!(
                "error releasing digital output subsystem on {}",
                self.info.name
            )));
        }
        debug!("{} released", self.info.name);
        Ok(())
    }
}
