//! Driver over a single modem device session

use crate::core::OutboundMessage;
use crate::driver::{
    Done, Driver, DriverError, DriverResult, DriverState, ErrorHandler, Operation,
    ReceiveHandler, SendCallback,
};
use crate::session::{
    DeviceSession, MockModemFactory, MockModemHandle, SendCompletion, SessionEvent, SessionFactory,
};
use crate::trace::{HandlerKind, TraceEvent, TraceSink, Tracer};
use crate::utils::DriverConfig;
use std::sync::{Arc, Mutex};

/// Name the mock-backed driver is registered under
pub const MOCK_DRIVER: &str = "mock";

/// Send callback that may be claimed from either the synchronous or the
/// asynchronous path, whichever happens first
type CallbackSlot = Arc<Mutex<Option<SendCallback>>>;

fn claim(slot: &CallbackSlot) -> Option<SendCallback> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
}

/// Driver that forwards to one exclusively-owned device session
pub struct ModemDriver {
    name: String,
    factory: Box<dyn SessionFactory>,
    session: Option<Box<dyn DeviceSession>>,
    receive_handler: Option<ReceiveHandler>,
    error_handler: Option<ErrorHandler>,
    state: DriverState,
    tracer: Tracer,
}

impl ModemDriver {
    /// Create an uninitialized driver that will build its session with `factory`
    pub fn new<F>(name: impl Into<String>, factory: F, sink: Arc<dyn TraceSink>) -> Self
    where
        F: SessionFactory + 'static,
    {
        let name = name.into();
        Self {
            tracer: Tracer::new(name.as_str(), sink),
            name,
            factory: Box::new(factory),
            session: None,
            receive_handler: None,
            error_handler: None,
            state: DriverState::Uninitialized,
        }
    }

    /// Driver over a fresh virtual modem, plus a handle to script it
    pub fn mock(sink: Arc<dyn TraceSink>) -> (Self, MockModemHandle) {
        let factory = MockModemFactory::new();
        let handle = factory.handle();
        (Self::new(MOCK_DRIVER, factory, sink), handle)
    }

    fn transition(&mut self, next: DriverState) {
        let from = self.state;
        self.state = next;
        if from != next {
            self.tracer.emit(TraceEvent::LifecycleChanged { from, to: next });
        }
    }

    fn session_mut(&mut self) -> DriverResult<&mut Box<dyn DeviceSession>> {
        self.session.as_mut().ok_or(DriverError::Destroyed)
    }

    fn dispatch(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Receive { message, ack } => {
                self.tracer.emit_with(|| TraceEvent::Received { message: message.clone() });
                match self.receive_handler.as_mut() {
                    Some(handler) => handler(message, Done::new(ack, self.tracer.clone())),
                    None => self.tracer.emit(TraceEvent::Warning {
                        message: format!("no receive handler; message from {} left on device", message.from),
                    }),
                }
            }
            SessionEvent::SendComplete(completed) => completed.finish(),
            SessionEvent::Error(error) => match self.error_handler.as_mut() {
                Some(handler) => handler(error),
                None => self.tracer.emit_with(|| TraceEvent::Warning {
                    message: format!("no error handler; dropped: {}", error),
                }),
            },
        }
    }
}

impl Driver for ModemDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> DriverState {
        self.state
    }

    fn initialize(&mut self, config: DriverConfig) -> DriverResult<()> {
        let next = self.state.apply(Operation::Initialize)?;
        config.validate()?;

        let session = self.factory.create(&config)?;
        self.tracer.set_enabled(config.debug);
        self.session = Some(session);
        self.transition(next);
        Ok(())
    }

    fn send(&mut self, message: OutboundMessage, callback: SendCallback) {
        self.tracer.emit_with(|| TraceEvent::Queued { message: message.clone() });

        if let Err(error) = self.state.apply(Operation::Send) {
            return callback(Err(error));
        }
        if let Err(fault) = message.validate() {
            self.tracer.emit_with(|| TraceEvent::Status {
                report: None,
                error: Some(format!("{:?}", fault)),
            });
            return callback(Err(DriverError::InvalidArguments));
        }

        let slot: CallbackSlot = Arc::new(Mutex::new(Some(callback)));
        let pending = Arc::clone(&slot);
        let tracer = self.tracer.clone();
        let traced = message.clone();
        let completion: SendCompletion = Box::new(move |result| {
            tracer.emit_with(|| TraceEvent::Sent { message: traced });
            tracer.emit_with(|| TraceEvent::Status {
                report: result.as_ref().ok().cloned(),
                error: result.as_ref().err().map(ToString::to_string),
            });
            if let Some(callback) = claim(&pending) {
                callback(result.map_err(DriverError::from));
            }
        });

        let outcome = match self.session.as_mut() {
            Some(session) => session.send(&message.to, &message.content, completion),
            None => {
                if let Some(callback) = claim(&slot) {
                    callback(Err(DriverError::Destroyed));
                }
                return;
            }
        };

        if let Err(fault) = outcome {
            self.tracer.emit_with(|| TraceEvent::Status {
                report: None,
                error: Some(fault.to_string()),
            });
            if let Some(callback) = claim(&slot) {
                callback(Err(DriverError::InvalidArguments));
            }
        }
    }

    fn register_receive_handler(&mut self, handler: ReceiveHandler) -> DriverResult<()> {
        self.state.apply(Operation::RegisterHandler)?;
        self.receive_handler = Some(handler);
        self.tracer.emit(TraceEvent::HandlerRegistered { kind: HandlerKind::Receive });
        Ok(())
    }

    fn register_error_handler(&mut self, handler: ErrorHandler) -> DriverResult<()> {
        self.state.apply(Operation::RegisterHandler)?;
        self.error_handler = Some(handler);
        self.tracer.emit(TraceEvent::HandlerRegistered { kind: HandlerKind::Error });
        Ok(())
    }

    fn start(&mut self) -> DriverResult<()> {
        let next = self.state.apply(Operation::Start)?;

        if self.receive_handler.is_none() {
            self.tracer.emit(TraceEvent::Warning {
                message: "starting without a receive handler; inbound messages will not be delivered"
                    .to_string(),
            });
        }

        self.session_mut()?.start()?;
        self.transition(next);
        Ok(())
    }

    fn stop(&mut self) -> DriverResult<()> {
        let next = self.state.apply(Operation::Stop)?;
        self.session_mut()?.stop()?;
        self.transition(next);
        Ok(())
    }

    fn destroy(&mut self) -> DriverResult<()> {
        let next = self.state.apply(Operation::Destroy)?;
        let session = self.session.take();
        self.receive_handler = None;
        self.error_handler = None;
        self.transition(next);

        // The handle is gone either way; a failed release is still reported.
        if let Some(mut session) = session {
            session.destroy()?;
        }
        Ok(())
    }

    fn dispatch_pending(&mut self) -> usize {
        if self.state != DriverState::Started {
            return 0;
        }

        let events = match self.session.as_mut() {
            Some(session) => session.poll_events(),
            None => return 0,
        };

        let drained = events.len();
        for event in events {
            self.dispatch(event);
        }
        drained
    }
}

impl Drop for ModemDriver {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            let _ = session.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SendStatus;
    use crate::session::{SessionError, StorageError};
    use crate::trace::MemorySink;

    fn driver(debug: bool) -> (ModemDriver, MockModemHandle, MemorySink) {
        let sink = MemorySink::new();
        let (mut driver, handle) = ModemDriver::mock(Arc::new(sink.clone()));
        driver
            .initialize(DriverConfig { debug, ..DriverConfig::default() })
            .unwrap();
        (driver, handle, sink)
    }

    type Outcome = Arc<Mutex<Vec<DriverResult<crate::core::SendReport>>>>;

    fn recorder() -> (SendCallback, Outcome) {
        let outcomes: Outcome = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        (Box::new(move |result| sink.lock().unwrap().push(result)), outcomes)
    }

    #[test]
    fn test_initialize_binds_config_and_session() {
        let (driver, handle, _) = driver(false);
        assert_eq!(driver.state(), DriverState::Initialized);
        assert_eq!(driver.name(), MOCK_DRIVER);
        assert!(handle.is_created());
    }

    #[test]
    fn test_initialize_twice_is_refused() {
        let (mut driver, _, _) = driver(false);
        let result = driver.initialize(DriverConfig::default());
        assert!(matches!(result, Err(DriverError::InvalidState { .. })));
    }

    #[test]
    fn test_invalid_config_leaves_driver_uninitialized() {
        let (mut driver, handle) = ModemDriver::mock(Arc::new(MemorySink::new()));
        let config = DriverConfig { poll_interval_ms: 0, ..DriverConfig::default() };

        assert!(matches!(driver.initialize(config), Err(DriverError::Config(_))));
        assert_eq!(driver.state(), DriverState::Uninitialized);
        assert!(!handle.is_created());
    }

    #[test]
    fn test_send_reports_partial_delivery() {
        let (mut driver, handle, _) = driver(false);
        driver.start().unwrap();
        handle.fail_fragments(vec![0]);

        let (callback, outcomes) = recorder();
        driver.send(OutboundMessage::new("+15551234", "y".repeat(400)), callback);
        driver.dispatch_pending();

        let outcomes = outcomes.lock().unwrap();
        let report = outcomes[0].as_ref().unwrap();
        assert_eq!(report.result, SendStatus::Partial);
        assert_eq!(report.fragments.len(), 3);
    }

    #[test]
    fn test_synchronous_fault_is_normalized() {
        let (mut driver, handle, _) = driver(false);
        let (callback, outcomes) = recorder();

        driver.send(OutboundMessage::new("bogus", "hello"), callback);

        assert_eq!(*outcomes.lock().unwrap(), vec![Err(DriverError::InvalidArguments)]);
        assert!(handle.sent_messages().is_empty());
    }

    #[test]
    fn test_asynchronous_fault_passes_through() {
        let (mut driver, handle, _) = driver(false);
        driver.start().unwrap();
        let fault = SessionError::TransmissionFailed { details: "SMSC timeout".to_string() };
        handle.fail_next_send(fault.clone());

        let (callback, outcomes) = recorder();
        driver.send(OutboundMessage::new("+15551234", "hello"), callback);
        driver.dispatch_pending();

        assert_eq!(*outcomes.lock().unwrap(), vec![Err(DriverError::Session(fault))]);
    }

    #[test]
    fn test_send_before_initialize_fails_through_callback() {
        let (mut driver, _) = ModemDriver::mock(Arc::new(MemorySink::new()));
        let (callback, outcomes) = recorder();

        driver.send(OutboundMessage::new("+15551234", "hello"), callback);
        assert!(matches!(
            outcomes.lock().unwrap()[0],
            Err(DriverError::InvalidState { state: DriverState::Uninitialized, .. })
        ));
    }

    #[test]
    fn test_register_while_started_is_refused() {
        let (mut driver, _, _) = driver(false);
        driver.start().unwrap();

        let result = driver.register_error_handler(Box::new(|_| {}));
        assert!(matches!(result, Err(DriverError::InvalidState { .. })));

        driver.stop().unwrap();
        assert!(driver.register_error_handler(Box::new(|_| {})).is_ok());
    }

    #[test]
    fn test_unhandled_message_stays_on_device() {
        let (mut driver, handle, _) = driver(false);
        driver.start().unwrap();
        handle.inject_message("+15559876", "lost?");

        assert_eq!(driver.dispatch_pending(), 1);
        assert_eq!(handle.stored_count(), 1);
        assert!(handle.acknowledgements().is_empty());
    }

    #[test]
    fn test_rejection_reaches_device() {
        let (mut driver, handle, _) = driver(false);
        driver
            .register_receive_handler(Box::new(|_, done| done.reject(StorageError::new("disk full"))))
            .unwrap();
        driver.start().unwrap();
        handle.inject_message("+15559876", "keep me");
        driver.dispatch_pending();

        let acks = handle.acknowledgements();
        assert_eq!(acks[0].result, Err(StorageError::new("disk full")));
        assert_eq!(handle.stored_count(), 1);
    }

    #[test]
    fn test_no_dispatch_unless_started() {
        let (mut driver, handle, _) = driver(false);
        handle.inject_error(SessionError::Destroyed);
        assert_eq!(driver.dispatch_pending(), 0);
    }

    #[test]
    fn test_debug_traces_each_send_phase() {
        let (mut driver, _, sink) = driver(true);
        driver.start().unwrap();
        sink.clear();

        let (callback, _) = recorder();
        driver.send(OutboundMessage::new("+15551234", "hello"), callback);
        driver.dispatch_pending();

        let events = sink.events();
        assert!(matches!(events[0], TraceEvent::Queued { .. }));
        assert!(matches!(events[1], TraceEvent::Sent { .. }));
        assert!(matches!(events[2], TraceEvent::Status { report: Some(_), .. }));
    }

    #[test]
    fn test_debug_traces_why_a_message_was_refused() {
        let (mut driver, handle, sink) = driver(true);
        driver.start().unwrap();
        sink.clear();

        let (callback, outcomes) = recorder();
        driver.send(OutboundMessage::new("+15551234", ""), callback);

        assert_eq!(*outcomes.lock().unwrap(), vec![Err(DriverError::InvalidArguments)]);
        assert!(handle.sent_messages().is_empty());
        assert!(sink.events().iter().any(|event| matches!(
            event,
            TraceEvent::Status { report: None, error: Some(error) } if error == "MissingContent"
        )));
    }

    #[test]
    fn test_disconnected_send_reports_session_error() {
        let (mut driver, handle, _) = driver(false);
        driver.start().unwrap();
        handle.disconnect();
        driver.dispatch_pending();

        let (callback, outcomes) = recorder();
        driver.send(OutboundMessage::new("+15551234", "hello"), callback);
        driver.dispatch_pending();
        assert!(matches!(
            outcomes.lock().unwrap()[0],
            Err(DriverError::Session(SessionError::Disconnected { .. }))
        ));

        handle.reconnect();
        let (callback, outcomes) = recorder();
        driver.send(OutboundMessage::new("+15551234", "hello again"), callback);
        driver.dispatch_pending();
        assert!(outcomes.lock().unwrap()[0].as_ref().unwrap().is_success());
        assert_eq!(handle.sent_messages().len(), 1);
    }

    #[test]
    fn test_session_runs_only_while_started() {
        let (mut driver, handle, _) = driver(false);
        assert!(!handle.is_running());

        driver.start().unwrap();
        assert!(handle.is_running());

        driver.stop().unwrap();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_quiet_without_debug() {
        let (mut driver, _, sink) = driver(false);
        driver.start().unwrap();
        let (callback, _) = recorder();
        driver.send(OutboundMessage::new("+15551234", "hello"), callback);
        driver.dispatch_pending();

        assert!(sink.is_empty());
    }

    #[test]
    fn test_warns_when_started_without_receive_handler() {
        let (mut driver, _, sink) = driver(true);
        driver.start().unwrap();

        assert!(sink
            .events()
            .iter()
            .any(|event| matches!(event, TraceEvent::Warning { .. })));
    }

    #[test]
    fn test_drop_releases_session() {
        let (driver, handle, _) = driver(false);
        drop(driver);
        assert!(handle.is_destroyed());
    }
}
