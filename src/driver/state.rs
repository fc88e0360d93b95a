//! Driver lifecycle state machine
//!
//! ```text
//! uninitialized -> initialized -> started <-> stopped
//!        \______________\______________\________\____> destroyed
//! ```

use crate::driver::{DriverError, DriverResult};
use std::fmt;

/// Lifecycle state of a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
    Destroyed,
}

/// Operations gated by the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    RegisterHandler,
    Send,
    Start,
    Stop,
    Destroy,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::RegisterHandler => "register a handler",
            Operation::Send => "send",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Destroy => "destroy",
        }
    }
}

impl DriverState {
    /// State reached by performing `operation` from `self`.
    ///
    /// Operations that do not move the lifecycle return `self` when allowed.
    pub fn apply(self, operation: Operation) -> DriverResult<DriverState> {
        use DriverState::*;

        let next = match (self, operation) {
            (Destroyed, _) => return Err(DriverError::Destroyed),
            (Uninitialized, Operation::Initialize) => Initialized,
            (Initialized | Stopped, Operation::RegisterHandler) => self,
            (Initialized | Started | Stopped, Operation::Send) => self,
            (Initialized | Stopped, Operation::Start) => Started,
            (Started, Operation::Stop) => Stopped,
            (_, Operation::Destroy) => Destroyed,
            (state, operation) => {
                return Err(DriverError::InvalidState {
                    operation: operation.name(),
                    state,
                })
            }
        };
        Ok(next)
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Uninitialized => "uninitialized",
            DriverState::Initialized => "initialized",
            DriverState::Started => "started",
            DriverState::Stopped => "stopped",
            DriverState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
