//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

use geofix::config::ConfigError;
use geofix::{LocationError, ManagerError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be used
    Config(ConfigError),
    /// Location manager could not be created
    Manager(ManagerError),
    /// A request finished with an error
    Location(LocationError),
    /// Command-line value rejected before any request was made
    InvalidArgument(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Location(LocationError::Timeout) => {
                eprintln!();
                eprintln!("The receiver did not reach the requested accuracy in time.");
                eprintln!("Try a coarser --accuracy or a longer --timeout.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!(
                    "Check {} or pass --config <path>.",
                    geofix::config::default_config_path().display()
                );
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Manager(e) => write!(f, "Failed to start location manager: {}", e),
            CliError::Location(e) => write!(f, "{}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Manager(e) => Some(e),
            CliError::Location(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        CliError::Manager(e)
    }
}

impl From<LocationError> for CliError {
    fn from(e: LocationError) -> Self {
        CliError::Location(e)
    }
}
