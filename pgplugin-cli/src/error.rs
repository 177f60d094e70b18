//! CLI error type.

use std::fmt;

use pgplugin::config::ConfigError;
use pgplugin::logging::LoggingError;
use pgplugin::store::StoreError;
use pgplugin::EngineError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or saved
    Config(String),
    /// Logging could not be set up
    Logging(String),
    /// Load order snapshot could not be read
    Snapshot(String),
    /// Update batch file could not be read
    Updates(String),
    /// The patch run failed
    Run(String),
    /// Output could not be rendered
    Output(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Logging(_) => 2,
            CliError::Snapshot(_) | CliError::Updates(_) => 3,
            CliError::Run(_) | CliError::Output(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(msg) => write!(f, "Logging error: {}", msg),
            CliError::Snapshot(msg) => write!(f, "Snapshot error: {}", msg),
            CliError::Updates(msg) => write!(f, "Update batch error: {}", msg),
            CliError::Run(msg) => write!(f, "Patch run failed: {}", msg),
            CliError::Output(msg) => write!(f, "Output error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Snapshot(e.to_string())
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Run(e.to_string())
    }
}
