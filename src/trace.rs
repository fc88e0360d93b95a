//! Diagnostic tracing for drivers
//!
//! Drivers never write to a fixed output stream. They report what they are
//! doing as [`TraceEvent`]s to an injected [`TraceSink`]; the binary wires up
//! [`TracingSink`], tests use [`MemorySink`] to look at what happened.

use crate::core::{InboundMessage, OutboundMessage, SendReport};
use crate::driver::DriverState;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Handler kinds, as reported in traces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Receive,
    Error,
}

/// Something a driver did that is worth tracing
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// A message was accepted for sending
    Queued { message: OutboundMessage },
    /// The device finished with a message
    Sent { message: OutboundMessage },
    /// Completion status of a send; `None` when the device reported a fault
    Status { report: Option<SendReport>, error: Option<String> },
    /// An inbound message arrived
    Received { message: InboundMessage },
    /// The receive handler settled a message
    Acknowledged { error: Option<String> },
    HandlerRegistered { kind: HandlerKind },
    LifecycleChanged { from: DriverState, to: DriverState },
    /// Suspicious but legal usage
    Warning { message: String },
}

/// Destination for driver traces
pub trait TraceSink: Send + Sync {
    fn record(&self, driver: &str, event: TraceEvent);
}

/// Forwards traces to the `tracing` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&self, driver: &str, event: TraceEvent) {
        match event {
            TraceEvent::Queued { message } => {
                debug!(driver, to = %message.to, content = %message.content, "queueing message");
            }
            TraceEvent::Sent { message } => {
                debug!(driver, to = %message.to, "sent message");
            }
            TraceEvent::Status { report, error } => {
                debug!(driver, ?report, ?error, "send status");
            }
            TraceEvent::Received { message } => {
                debug!(driver, from = %message.from, timestamp = %message.timestamp, "received message");
            }
            TraceEvent::Acknowledged { error } => {
                debug!(driver, ?error, "receive handler invoked");
            }
            TraceEvent::HandlerRegistered { kind } => {
                debug!(driver, ?kind, "registered handler");
            }
            TraceEvent::LifecycleChanged { from, to } => {
                debug!(driver, ?from, ?to, "lifecycle changed");
            }
            TraceEvent::Warning { message } => {
                warn!(driver, "{}", message);
            }
        }
    }
}

/// Keeps every trace in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<(String, TraceEvent)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, oldest first
    pub fn events(&self) -> Vec<TraceEvent> {
        self.lock().iter().map(|(_, event)| event.clone()).collect()
    }

    /// Events recorded by one driver
    pub fn events_for(&self, driver: &str) -> Vec<TraceEvent> {
        self.lock()
            .iter()
            .filter(|(name, _)| name == driver)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, TraceEvent)>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TraceSink for MemorySink {
    fn record(&self, driver: &str, event: TraceEvent) {
        self.lock().push((driver.to_string(), event));
    }
}

/// Sink gated by the driver's `debug` flag
#[derive(Clone)]
pub(crate) struct Tracer {
    driver: Arc<str>,
    sink: Arc<dyn TraceSink>,
    enabled: bool,
}

impl Tracer {
    pub(crate) fn new(driver: impl Into<Arc<str>>, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            driver: driver.into(),
            sink,
            enabled: false,
        }
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn emit(&self, event: TraceEvent) {
        if self.enabled {
            self.sink.record(&self.driver, event);
        }
    }

    /// Like `emit`, but only builds the event when tracing is on
    pub(crate) fn emit_with<F>(&self, event: F)
    where
        F: FnOnce() -> TraceEvent,
    {
        if self.enabled {
            self.sink.record(&self.driver, event());
        }
    }
}
