//! Device session error types

use thiserror::Error;

/// Faults raised by a device session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The modem stopped responding or was unplugged
    #[error("device disconnected: {device}")]
    Disconnected { device: String },
    /// Arguments the device cannot act on
    #[error("invalid argument `{parameter}`: {reason}")]
    InvalidArgument { parameter: String, reason: String },
    /// The network refused or lost the message
    #[error("transmission failed: {details}")]
    TransmissionFailed { details: String },
    /// Device-specific error code
    #[error("device error {code}: {description}")]
    Device { code: u32, description: String },
    /// The session was destroyed and can no longer be used
    #[error("session has been destroyed")]
    Destroyed,
}

/// Result type for device session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Durability fault reported by whoever persists inbound messages.
///
/// Handed back to the device session so it can keep the physical message
/// for redelivery instead of purging it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("message could not be stored: {reason}")]
pub struct StorageError {
    pub reason: String,
}

impl StorageError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::new(error.to_string())
    }
}
