//! Driver contract
//!
//! A driver owns one device session and exposes it to the transport layer:
//! outbound sends with classified results, inbound messages paired with an
//! acknowledgement that must be settled once the message is durably stored,
//! and out-of-band device faults.
//!
//! Handlers must be registered before [`Driver::start`]. Anything the device
//! emits while no handler is registered is dropped; inbound messages dropped
//! that way are never acknowledged, so the device offers them again on the
//! next start.

pub mod error;
pub mod modem;
pub mod state;

pub use error::{DriverError, DriverResult};
pub use modem::ModemDriver;
pub use state::{DriverState, Operation};

use crate::core::{InboundMessage, OutboundMessage, SendReport};
use crate::session::{AckResult, ReceiptAck, SessionError, StorageError};
use crate::trace::{TraceEvent, Tracer};
use crate::utils::DriverConfig;
use std::fmt;

/// Invoked once per send with the device's report or the reason it failed
pub type SendCallback = Box<dyn FnOnce(DriverResult<SendReport>) + Send>;

/// Invoked for every inbound message
pub type ReceiveHandler = Box<dyn FnMut(InboundMessage, Done) + Send>;

/// Invoked for every fault not attributable to a send
pub type ErrorHandler = Box<dyn FnMut(SessionError) + Send>;

/// Completion token handed to the receive handler alongside each message.
///
/// Call one of its methods once the message has been written to persistent
/// storage (or could not be). The outcome is forwarded unchanged to the
/// device, which only purges the message on success. Dropping it without
/// completing leaves the message on the device indefinitely.
#[must_use = "the device keeps the message until it is acknowledged"]
pub struct Done {
    ack: ReceiptAck,
    tracer: Tracer,
}

impl Done {
    pub(crate) fn new(ack: ReceiptAck, tracer: Tracer) -> Self {
        Self { ack, tracer }
    }

    /// Settle the message with the storage outcome
    pub fn complete(self, result: AckResult) {
        self.tracer.emit_with(|| TraceEvent::Acknowledged {
            error: result.as_ref().err().map(ToString::to_string),
        });
        self.ack.acknowledge(result);
    }

    /// The message is safely stored
    pub fn accept(self) {
        self.complete(Ok(()));
    }

    /// The message could not be stored and must be kept by the device
    pub fn reject(self, error: StorageError) {
        self.complete(Err(error));
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").finish_non_exhaustive()
    }
}

/// Interface the transport layer drives
pub trait Driver: Send {
    /// Registered name of this driver
    fn name(&self) -> &str;

    fn state(&self) -> DriverState;

    /// Bind configuration and create the device session. Only valid once.
    fn initialize(&mut self, config: DriverConfig) -> DriverResult<()>;

    /// Send a message. Every outcome, including argument errors, is
    /// reported through `callback`; nothing is returned directly.
    ///
    /// Device results arrive through [`Driver::dispatch_pending`], so a send
    /// queued before [`Driver::start`] completes only once the driver runs.
    /// Destroying the driver fails any send still in flight with
    /// [`SessionError::Destroyed`].
    fn send(&mut self, message: OutboundMessage, callback: SendCallback);

    /// Replace the receive handler. Only valid while not started.
    fn register_receive_handler(&mut self, handler: ReceiveHandler) -> DriverResult<()>;

    /// Replace the error handler. Only valid while not started.
    fn register_error_handler(&mut self, handler: ErrorHandler) -> DriverResult<()>;

    /// Begin polling the device. Register handlers first.
    fn start(&mut self) -> DriverResult<()>;

    /// Stop polling. The device session stays open.
    fn stop(&mut self) -> DriverResult<()>;

    /// Release the device session. Nothing is valid afterwards.
    fn destroy(&mut self) -> DriverResult<()>;

    /// Route everything the device emitted since the last call to the
    /// registered handlers and send callbacks, in order. Returns the number
    /// of events drained.
    fn dispatch_pending(&mut self) -> usize;
}
