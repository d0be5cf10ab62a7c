/*!
Posting session on an acquired board.

A session owns the port for the life of one command: it acquires the board,
posts values or status bits, runs sweep stamping loops and produces a report
of everything that reached the port.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use stamp_core::protocol::{DATA_WORD_MASK, RUN, SWEEP};
use stamp_core::sim::{SimBoard, WriteLog};
use stamp_core::{initialize, DoutDevice, Pace, Port, PortError, StatusBit, Value};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Bit operation selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BitOp {
    Set,
    Clear,
    Toggle,
    /// Toggle these bits on every following post
    ToggleOnPost,
}

/// Summary printed at the end of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub started: String,
    pub board: String,
    pub command: String,
    pub writes: Vec<String>,
    /// Operations that hit at least one failed write
    pub write_errors: u64,
    pub register: String,
    pub status_bits: Vec<&'static str>,
    pub checksum: u16,
    pub checksum_hex: String,
    pub frames: Option<u32>,
}

/// One command's worth of port activity
pub struct Session {
    port: Port<SimBoard>,
    log: WriteLog,
    board: String,
    command: String,
    started: String,
    write_errors: u64,
    frames: Option<u32>,
    running: Arc<AtomicBool>,
}

impl Session {
    /// Acquire a board from the configured driver and wrap it in a port
    pub fn open(config: &AppConfig, command: impl Into<String>) -> Result<Self> {
        let started = Local::now().to_rfc3339();
        let mut driver = config.board.driver();
        let log = driver.log();

        let device = initialize(&mut driver, &config.port.dout_config())
            .context("Failed to initialize a digital output board")?;
        let board = device.info().name.clone();

        let port = Port::from_config(device, &config.port)
            .context("Failed to set up port")?;

        info!(
            "🚀 Session on {} (bit shift {}, hold {} us)",
            board, config.port.bit_shift, config.port.hold_us
        );

        Ok(Self {
            port,
            log,
            board,
            command: command.into(),
            started,
            write_errors: 0,
            frames: None,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Get a reference to the running flag for external control
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn port(&self) -> &Port<SimBoard> {
        &self.port
    }

    /// Start the checksum at `checksum`, post each value in order and return
    /// the resulting checksum
    pub fn send(&mut self, values: &[Value], pace: Pace, checksum: u16) -> Result<u16> {
        self.port.set_checksum(checksum);

        for value in values {
            tally(&mut self.write_errors, self.port.post_value(value, pace))
                .with_context(|| format!("Failed to post {}", value))?;
        }

        info!("📦 Posted {} value(s), checksum {:#06x}", values.len(), self.port.checksum());
        Ok(self.port.checksum())
    }

    /// Apply one bit operation
    pub fn bits(&mut self, op: BitOp, mask: u32, pace: Pace) -> Result<()> {
        let result = match op {
            BitOp::Set => self.port.set_bits(mask, pace),
            BitOp::Clear => self.port.clear_bits(mask, pace),
            BitOp::Toggle => self.port.toggle_bits(mask, pace),
            BitOp::ToggleOnPost => {
                self.port.toggle_bits_on_post(mask);
                Ok(())
            }
        };
        tally(&mut self.write_errors, result)
            .with_context(|| format!("Failed to {:?} bits {:#010x}", op, mask))
    }

    /// Sweep stamping: raise RUN, then for each frame raise SWEEP and post the
    /// frame index without delay, keeping each frame up for `period`. SWEEP
    /// and RUN are lowered with a hold at the end, or as soon as the running
    /// flag is cleared.
    pub fn sweep(&mut self, frames: u32, period: Duration) -> Result<u32> {
        let errors = &mut self.write_errors;
        tally(errors, self.port.set_bits(RUN, Pace::Hold))?;

        let mut shown = 0u32;
        while shown < frames && self.running.load(Ordering::SeqCst) {
            let frame_start = Instant::now();

            tally(errors, self.port.set_bits(SWEEP, Pace::Immediate))?;
            let index = (shown & DATA_WORD_MASK) as u16;
            tally(errors, self.port.post_int16(index, Pace::Immediate))?;
            shown += 1;

            if shown % 100 == 0 {
                info!("📊 Sweep frame {} of {}", shown, frames);
            }

            let elapsed = frame_start.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }

        if shown < frames {
            warn!("🛑 Sweep stopped after {} of {} frames", shown, frames);
        }

        // Let the receiver see the end of the sweep
        tally(errors, self.port.clear_bits(SWEEP, Pace::Hold))?;
        tally(errors, self.port.clear_bits(RUN, Pace::Hold))?;

        self.frames = Some(shown);
        info!("✅ Sweep finished: {} frame(s), checksum {:#06x}", shown, self.port.checksum());
        Ok(shown)
    }

    /// Snapshot of the session so far
    pub fn report(&self) -> SessionReport {
        let register = self.port.register();
        SessionReport {
            started: self.started.clone(),
            board: self.board.clone(),
            command: self.command.clone(),
            writes: self
                .log
                .borrow()
                .iter()
                .map(|raw| hex::encode(raw.to_be_bytes()))
                .collect(),
            write_errors: self.write_errors,
            register: hex::encode(register.to_be_bytes()),
            status_bits: StatusBit::decompose(register).into_iter().map(StatusBit::as_str).collect(),
            checksum: self.port.checksum(),
            checksum_hex: hex::encode(self.port.checksum().to_be_bytes()),
            frames: self.frames,
        }
    }

    /// Release the board and return the final report
    pub fn close(self) -> Result<SessionReport> {
        let report = self.report();
        if let Err(e) = self.port.shutdown() {
            // Release failures never block exit
            warn!("⚠️ {}", e);
        }
        Ok(report)
    }
}

/// Count a hardware write failure and carry on; argument errors propagate.
fn tally(write_errors: &mut u64, result: Result<(), PortError>) -> Result<(), PortError> {
    match result {
        Err(PortError::HardwareWrite { value, source }) => {
            warn!("❌ Write of {:#010x} failed: {}", value, source);
            *write_errors += 1;
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        let mut config = AppConfig::new();
        config.port.hold_us = 0;
        config
    }

    fn writes(session: &Session) -> Vec<u32> {
        session.log.borrow().clone()
    }

    #[test]
    fn test_send_overwrites_checksum_and_reports() {
        let mut session = Session::open(&config(), "send").unwrap();
        session.port.set_checksum(0x1111);

        let values = vec![Value::Int16(1), Value::Int32(0x0002_0003)];
        let checksum = session.send(&values, Pace::Hold, 0).unwrap();
        assert_eq!(checksum, 6);
        assert_eq!(writes(&session), vec![1, 3, 2]);

        let report = session.close().unwrap();
        assert_eq!(report.board, "DT340");
        assert_eq!(report.writes, vec!["00000001", "00000003", "00000002"]);
        assert_eq!(report.checksum_hex, "0006");
        assert_eq!(report.write_errors, 0);
    }

    #[test]
    fn test_send_starts_from_given_checksum() {
        let mut session = Session::open(&config(), "send").unwrap();
        let checksum = session.send(&[Value::Int16(5)], Pace::Immediate, 0xFFFE).unwrap();
        assert_eq!(checksum, 3);

        let report = session.close().unwrap();
        assert_eq!(report.checksum, 3);
        assert_eq!(report.checksum_hex, "0003");
    }

    #[test]
    fn test_bits_toggle_on_post() {
        let mut session = Session::open(&config(), "bits").unwrap();
        session.bits(BitOp::ToggleOnPost, SWEEP, Pace::Hold).unwrap();
        assert!(writes(&session).is_empty());

        session.bits(BitOp::Set, RUN, Pace::Hold).unwrap();
        assert_eq!(session.port().register(), RUN | SWEEP);
        assert_eq!(session.report().status_bits, vec!["sweep", "run"]);
    }

    #[test]
    fn test_sweep_stamps_each_frame() {
        let mut session = Session::open(&config(), "sweep").unwrap();
        let shown = session.sweep(3, Duration::ZERO).unwrap();
        assert_eq!(shown, 3);

        assert_eq!(
            writes(&session),
            vec![
                RUN,
                RUN | SWEEP,
                RUN | SWEEP,
                RUN | SWEEP,
                RUN | SWEEP | 1,
                RUN | SWEEP | 1,
                RUN | SWEEP | 2,
                RUN | 2,
                2,
            ]
        );
        assert_eq!(session.port().checksum(), 3);
        assert_eq!(session.report().frames, Some(3));
    }

    #[test]
    fn test_sweep_stops_when_flag_cleared() {
        let mut session = Session::open(&config(), "sweep").unwrap();
        session.get_running_flag().store(false, Ordering::SeqCst);
        assert_eq!(session.sweep(10, Duration::ZERO).unwrap(), 0);
        assert_eq!(session.port().register(), 0);
    }

    #[test]
    fn test_write_faults_are_counted_not_fatal() {
        let mut config = config();
        config.board.write_fault = Some(-3);
        let mut session = Session::open(&config, "send").unwrap();

        let checksum = session.send(&[Value::Float(1.0)], Pace::Hold, 0).unwrap();
        assert_eq!(checksum, 0x3F80);
        assert!(writes(&session).is_empty());
        // Both words failed, counted once for the value
        assert_eq!(session.report().write_errors, 1);
    }

    #[test]
    fn test_open_skips_failing_board() {
        let mut config = config();
        config.board.boards = vec!["DT3010".into(), "DT340".into()];
        config.board.failing_boards = vec!["DT3010".into()];
        let session = Session::open(&config, "bits").unwrap();
        assert_eq!(session.report().board, "DT340");
    }

    #[test]
    fn test_open_without_boards_fails() {
        let mut config = config();
        config.board.boards.clear();
        assert!(Session::open(&config, "send").is_err());
    }
}
