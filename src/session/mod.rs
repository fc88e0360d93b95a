//! Device session abstraction
//!
//! A device session owns the radio-layer conversation with one modem.
//! Drivers talk to it through [`DeviceSession`]; sessions are created by a
//! [`SessionFactory`] so a driver never shares its handle with anyone else.

pub mod error;
pub mod mock;

pub use error::{SessionError, SessionResult, StorageError};
pub use mock::{MockModem, MockModemFactory, MockModemHandle};

use crate::utils::config::DriverConfig;
use crate::core::{InboundMessage, SendReport};
use std::fmt;

/// Outcome the storage layer reports for an inbound message
pub type AckResult = Result<(), StorageError>;

/// Invoked by the session once a send has completed
pub type SendCompletion = Box<dyn FnOnce(SessionResult<SendReport>) + Send>;

/// One-shot acknowledgement channel for an inbound message.
///
/// Consuming `self` guarantees the session hears about each message at most
/// once. Dropping it without acknowledging leaves the message on the device.
pub struct ReceiptAck {
    callback: Box<dyn FnOnce(AckResult) + Send>,
}

impl ReceiptAck {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(AckResult) + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Tell the session whether the message was durably accepted
    pub fn acknowledge(self, result: AckResult) {
        (self.callback)(result)
    }
}

impl fmt::Debug for ReceiptAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptAck").finish_non_exhaustive()
    }
}

/// A send the device has finished with, waiting to be reported to its owner
pub struct CompletedSend {
    completion: SendCompletion,
    result: SessionResult<SendReport>,
}

impl CompletedSend {
    pub fn new(completion: SendCompletion, result: SessionResult<SendReport>) -> Self {
        Self { completion, result }
    }

    pub fn result(&self) -> &SessionResult<SendReport> {
        &self.result
    }

    /// Hand the outcome to whoever queued the send
    pub fn finish(self) {
        (self.completion)(self.result)
    }
}

impl fmt::Debug for CompletedSend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletedSend")
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

/// Events emitted by a running session
#[derive(Debug)]
pub enum SessionEvent {
    /// A queued send finished
    SendComplete(CompletedSend),
    /// A message arrived and awaits acknowledgement
    Receive {
        message: InboundMessage,
        ack: ReceiptAck,
    },
    /// A fault not tied to any particular send
    Error(SessionError),
}

/// Radio-layer session with a single modem
pub trait DeviceSession: Send {
    /// Queue a message for transmission.
    ///
    /// Returns `Err` when the arguments are rejected outright; in that case
    /// `completion` is never invoked. Otherwise `completion` runs once the
    /// device has finished with the message.
    fn send(&mut self, to: &str, content: &str, completion: SendCompletion) -> SessionResult<()>;

    /// Drain everything the session emitted since the last poll, in order.
    ///
    /// Finished sends come back as [`SessionEvent::SendComplete`] so they stay
    /// in sequence with inbound traffic; the caller runs them.
    fn poll_events(&mut self) -> Vec<SessionEvent>;

    /// Begin polling the device for inbound messages
    fn start(&mut self) -> SessionResult<()>;

    /// Stop polling; the session stays usable
    fn stop(&mut self) -> SessionResult<()>;

    /// Release the device. Terminal.
    fn destroy(&mut self) -> SessionResult<()>;
}

/// Creates device sessions from driver configuration
pub trait SessionFactory: Send {
    fn create(&self, config: &DriverConfig) -> SessionResult<Box<dyn DeviceSession>>;
}
