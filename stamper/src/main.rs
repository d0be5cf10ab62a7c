/*!
# Stamper

Command-line front end for posting values and status bits to a digital output
port sampled by an acquisition system.

## Features

- Typed value posting (int16, int32, float, string) with checksum reporting
- Direct set/clear/toggle of status bits, and sticky toggle-on-post masks
- Sweep stamping loop with Ctrl+C to stop cleanly
- TOML configuration for bit shift, hold time and boards
- JSON session report on stdout, logs on stderr

## Usage

### Post values
```bash
stamper send i16:7 i32:0x12345678 f32:1.5 str:header:8
```

### Status bits
```bash
stamper bits set sweep|run
stamper bits toggle-on-post data
```

### Sweep stamping
```bash
stamper sweep --frames 600 --period-ms 16
```
*/

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use stamp_core::status::{parse_int, parse_mask};
use stamp_core::{Pace, PortError, Value};

mod config;
mod session;

use config::AppConfig;
use session::{BitOp, Session, SessionReport};

#[derive(Parser)]
#[command(name = "stamper")]
#[command(about = "Post values and sweep stamps to a digital output port")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "stamper.toml")]
    config: PathBuf,

    /// Bits to shift every value up by before it reaches hardware
    #[arg(long)]
    bit_shift: Option<u32>,

    /// Hold after each delayed post, in microseconds
    #[arg(long)]
    hold_us: Option<u64>,

    /// Log verbosity on stderr
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,
}

#[derive(Subcommand)]
enum Commands {
    /// Post typed values (i16:<n>, i32:<n>, f32:<x>, str:<text>[:<len>])
    Send {
        #[arg(required = true)]
        values: Vec<Value>,

        /// Skip the stability hold after each word
        #[arg(long)]
        no_delay: bool,

        /// Checksum to start from (decimal or 0x hex, 0..=65535)
        #[arg(long, default_value = "0", value_parser = parse_checksum)]
        checksum: u16,
    },

    /// Set, clear or toggle status bits
    Bits {
        #[arg(value_enum)]
        op: BitOp,

        /// Mask as names and/or numbers, e.g. `sweep|run` or `0x20000`
        mask: String,

        /// Skip the stability hold
        #[arg(long)]
        no_delay: bool,
    },

    /// Run a sweep stamping loop
    Sweep {
        /// Number of frames to stamp
        #[arg(short, long)]
        frames: Option<u32>,

        /// Frame period in milliseconds
        #[arg(short, long)]
        period_ms: Option<u64>,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "stamper.toml")]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr to keep stdout clean for the JSON report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level.as_filter())
        .with_target(false)
        .init();

    if let Commands::Config { output } = &cli.command {
        return generate_config_file(output);
    }

    let mut config = AppConfig::load_or_default(&cli.config)?;
    if let Some(bit_shift) = cli.bit_shift {
        config.port.bit_shift = bit_shift;
    }
    if let Some(hold_us) = cli.hold_us {
        config.port.hold_us = hold_us;
    }
    config.port.validate()?;

    let report = match cli.command {
        Commands::Send { values, no_delay, checksum } => {
            let mut session = Session::open(&config, "send")?;
            session.send(&values, pace(no_delay), checksum)?;
            session.close()?
        }

        Commands::Bits { op, mask, no_delay } => {
            let mask = parse_mask(&mask)?;
            let mut session = Session::open(&config, "bits")?;
            session.bits(op, mask, pace(no_delay))?;
            session.close()?
        }

        Commands::Sweep { frames, period_ms } => {
            let frames = frames.unwrap_or(config.session.sweep_frames);
            let period = Duration::from_millis(period_ms.unwrap_or(config.session.frame_period_ms));
            run_sweep(&config, frames, period)?
        }

        Commands::Config { .. } => unreachable!("handled above"),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn parse_checksum(text: &str) -> Result<u16, PortError> {
    let value = parse_int(text)?;
    u16::try_from(value)
        .map_err(|_| PortError::argument(format!("checksum {} outside 0..=65535", value)))
}

fn pace(no_delay: bool) -> Pace {
    if no_delay {
        Pace::Immediate
    } else {
        Pace::Hold
    }
}

/// Run a sweep until all frames are stamped or Ctrl+C is pressed
fn run_sweep(config: &AppConfig, frames: u32, period: Duration) -> Result<SessionReport> {
    let mut session = Session::open(config, "sweep")?;

    // Set up Ctrl+C handler
    let running = session.get_running_flag();
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, ending sweep...");
        running.store(false, Ordering::SeqCst);
    })?;

    session.sweep(frames, period)?;
    session.close()
}

/// Generate a default configuration file
fn generate_config_file(output_path: &PathBuf) -> Result<()> {
    let config = AppConfig::new();
    config.save_to_file(output_path)?;

    eprintln!("✅ Generated configuration file: {}", output_path.display());
    eprintln!("📝 Edit the file to customize settings, then run:");
    eprintln!("   stamper --config {} send i16:1", output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checksum() {
        assert_eq!(parse_checksum("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_checksum("65535").unwrap(), 0xFFFF);
        assert!(parse_checksum("65536").is_err());
        assert!(parse_checksum("-1").is_err());
    }

    #[test]
    fn test_send_checksum_option() {
        let cli = Cli::try_parse_from(["stamper", "send", "--checksum", "0x10", "i16:1"]).unwrap();
        match cli.command {
            Commands::Send { checksum, values, .. } => {
                assert_eq!(checksum, 0x10);
                assert_eq!(values, vec![Value::Int16(1)]);
            }
            _ => panic!("expected send"),
        }

        let cli = Cli::try_parse_from(["stamper", "send", "i16:1"]).unwrap();
        assert!(matches!(cli.command, Commands::Send { checksum: 0, .. }));
        assert!(Cli::try_parse_from(["stamper", "send", "--checksum", "70000", "i16:1"]).is_err());
    }
}
