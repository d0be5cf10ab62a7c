/*!
Common error types for the digital output posting components.
*/

use thiserror::Error;

/// Common result type used throughout the core library
pub type Result<T> = std::result::Result<T, StampError>;

/// Umbrella error for all core operations
#[derive(Error, Debug)]
pub enum StampError {
    /// Posting and bit operation errors
    #[error("Port error: {0}")]
    Port(#[from] crate::port::PortError),

    /// Board discovery, configuration and shutdown errors
    #[error("Board error: {0}")]
    Board(#[from] crate::board::BoardError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StampError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error leaves the port usable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Port(err) => err.is_recoverable(),
            Self::Board(_) | Self::Config(_) => false,
        }
    }
}
