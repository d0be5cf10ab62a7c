/*!
Configuration management for the stamper application.
*/

use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::{Context, Result};
use stamp_core::sim::{SimBoardSpec, SimDriver};
use stamp_core::PortConfig;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub port: PortConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        config.port.validate()
            .with_context(|| format!("Invalid port settings in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            info!("No config at {}, using defaults", path.as_ref().display());
            Ok(Self::new())
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

/// Boards offered by the bundled simulated driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Board names in enumeration order
    pub boards: Vec<String>,

    /// Boards that refuse to initialize, to exercise discovery fallback
    pub failing_boards: Vec<String>,

    /// Error code every write reports, if set
    pub write_fault: Option<i32>,
}

impl BoardConfig {
    /// Build the simulated driver described by this configuration
    pub fn driver(&self) -> SimDriver {
        let specs = self
            .boards
            .iter()
            .map(|name| {
                let spec = SimBoardSpec::new(name.clone());
                if self.failing_boards.contains(name) {
                    spec.failing_init()
                } else {
                    spec
                }
            })
            .collect();

        let driver = SimDriver::new(specs);
        driver.set_write_fault(self.write_fault);
        driver
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            boards: vec!["DT340".to_string()],
            failing_boards: Vec::new(),
            write_fault: None,
        }
    }
}

/// Sweep stamping settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Time each sweep frame stays up, in milliseconds
    pub frame_period_ms: u64,

    /// Frames per sweep when not given on the command line
    pub sweep_frames: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_period_ms: 16, // ~60 Hz refresh
            sweep_frames: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_roundtrip() {
        let mut original_config = AppConfig::new();
        original_config.port.bit_shift = 4;
        original_config.board.failing_boards = vec!["DT3010".to_string()];

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path();

        // Save and load
        original_config.save_to_file(temp_path).unwrap();
        let loaded_config = AppConfig::load_from_file(temp_path).unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::new();

        assert_eq!(config.port.bit_shift, 0);
        assert_eq!(config.port.hold_us, 50);
        assert_eq!(config.board.boards, vec!["DT340".to_string()]);
        assert!(config.board.write_fault.is_none());
        assert_eq!(config.session.frame_period_ms, 16);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "[port]\nbit_shift = 2\n").unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.port.bit_shift, 2);
        assert_eq!(config.port.hold_us, 50);
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_invalid_shift_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "[port]\nbit_shift = 40\n").unwrap();

        assert!(AppConfig::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::new());
    }
}
