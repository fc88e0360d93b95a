//! Driver error types

use crate::driver::DriverState;
use crate::session::SessionError;
use crate::utils::ConfigError;
use thiserror::Error;

/// Errors surfaced by drivers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The message was malformed or the device refused it outright.
    /// The underlying cause is deliberately not carried.
    #[error("Invalid argument(s) supplied to the `send` method")]
    InvalidArguments,
    /// Operation not allowed in the current lifecycle state
    #[error("cannot {operation} while {state}")]
    InvalidState { operation: &'static str, state: DriverState },
    /// The driver was destroyed
    #[error("driver has been destroyed")]
    Destroyed,
    /// Fault reported by the device session, passed through as-is
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid driver configuration: {0}")]
    Config(#[from] ConfigError),
    /// No driver registered under this name
    #[error("unknown driver `{0}`")]
    UnknownDriver(String),
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;
