//! Error types for CLI operations.

use dispatcher::DispatcherError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[from] contracts::ContractError),

    /// Dispatcher could not be built
    #[error("Failed to build dispatcher: {0}")]
    Dispatcher(#[from] DispatcherError),

    /// Beacons still in flight when the CLI gave up waiting
    #[error("{pending} beacon(s) did not settle within {waited_ms}ms")]
    Unsettled { pending: u64, waited_ms: u64 },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn unsettled(pending: u64, waited_ms: u64) -> Self {
        Self::Unsettled { pending, waited_ms }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
