//! Virtual modem for testing and development
//!
//! `MockModem` behaves like a SIM-backed modem: inbound messages stay in its
//! storage until they are acknowledged successfully, sends are split into
//! fragments whose delivery can be scripted, and messages addressed to the
//! modem's own number loop back as inbound traffic.

use crate::utils::config::DriverConfig;
use crate::core::{fragment_count, FragmentOutcome, InboundMessage, SendReport};
use crate::session::{
    AckResult, CompletedSend, DeviceSession, ReceiptAck, SendCompletion, SessionError,
    SessionEvent, SessionFactory, SessionResult,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// A message the modem was asked to transmit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub content: String,
    pub report: SendReport,
}

/// An acknowledgement the modem received for an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckRecord {
    pub message: InboundMessage,
    pub result: AckResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Waiting,
    InFlight,
    Retained,
}

#[derive(Debug)]
struct Stored {
    message: InboundMessage,
    slot: Slot,
}

enum Pending {
    Completion(SendCompletion, SessionResult<SendReport>),
    Deliver(u64),
    Fault(SessionError),
}

struct MockState {
    device: String,
    own_number: Option<String>,
    created: bool,
    running: bool,
    destroyed: bool,
    connected: bool,
    queue: VecDeque<Pending>,
    storage: BTreeMap<u64, Stored>,
    next_id: u64,
    sent: Vec<SentMessage>,
    fragment_failures: VecDeque<Vec<usize>>,
    next_send_fault: Option<SessionError>,
    acknowledgements: Vec<AckRecord>,
}

impl MockState {
    fn new() -> Self {
        Self {
            device: "mock0".to_string(),
            own_number: None,
            created: false,
            running: false,
            destroyed: false,
            connected: true,
            queue: VecDeque::new(),
            storage: BTreeMap::new(),
            next_id: 0,
            sent: Vec::new(),
            fragment_failures: VecDeque::new(),
            next_send_fault: None,
            acknowledgements: Vec::new(),
        }
    }

    fn store(&mut self, message: InboundMessage) {
        let id = self.next_id;
        self.next_id += 1;
        self.storage.insert(id, Stored { message, slot: Slot::Waiting });
        self.queue.push_back(Pending::Deliver(id));
    }
}

/// Shared view of a mock modem, used to script and inspect it
#[derive(Clone)]
pub struct MockModemHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockModemHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only means a test callback panicked; the state is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Place a message in the modem's storage, timestamped now
    pub fn inject_message(&self, from: &str, content: &str) {
        self.inject_message_at(from, Utc::now(), content);
    }

    /// Place a message in the modem's storage with an explicit timestamp
    pub fn inject_message_at(&self, from: &str, timestamp: DateTime<Utc>, content: &str) {
        self.lock().store(InboundMessage::new(from, timestamp, content));
    }

    /// Emit an out-of-band fault
    pub fn inject_error(&self, error: SessionError) {
        self.lock().queue.push_back(Pending::Fault(error));
    }

    /// Make the given fragment indices of the next send fail
    pub fn fail_fragments(&self, indices: Vec<usize>) {
        self.lock().fragment_failures.push_back(indices);
    }

    /// Complete the next send with `error` instead of a report
    pub fn fail_next_send(&self, error: SessionError) {
        self.lock().next_send_fault = Some(error);
    }

    /// Simulate the modem being unplugged
    pub fn disconnect(&self) {
        let mut state = self.lock();
        state.connected = false;
        let error = SessionError::Disconnected { device: state.device.clone() };
        state.queue.push_back(Pending::Fault(error));
    }

    /// Restore the connection
    pub fn reconnect(&self) {
        self.lock().connected = true;
    }

    /// Messages handed to the modem for transmission
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    /// Acknowledgements received, in order
    pub fn acknowledgements(&self) -> Vec<AckRecord> {
        self.lock().acknowledgements.clone()
    }

    /// Number of inbound messages still held in storage
    pub fn stored_count(&self) -> usize {
        self.lock().storage.len()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Whether a session has been created from this modem
    pub fn is_created(&self) -> bool {
        self.lock().created
    }
}

/// Builds the single session a mock modem supports
pub struct MockModemFactory {
    handle: MockModemHandle,
}

impl MockModemFactory {
    pub fn new() -> Self {
        Self {
            handle: MockModemHandle {
                state: Arc::new(Mutex::new(MockState::new())),
            },
        }
    }

    /// Handle onto the modem this factory hands out
    pub fn handle(&self) -> MockModemHandle {
        self.handle.clone()
    }
}

impl Default for MockModemFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFactory for MockModemFactory {
    fn create(&self, config: &DriverConfig) -> SessionResult<Box<dyn DeviceSession>> {
        let mut state = self.handle.lock();
        if state.created {
            return Err(SessionError::Device {
                code: 16,
                description: format!("{} is already claimed by another session", state.device),
            });
        }

        state.created = true;
        if let Some(device) = &config.device {
            state.device = device.clone();
        }
        state.own_number = config.own_number.clone();
        drop(state);

        Ok(Box::new(MockModem {
            handle: self.handle.clone(),
        }))
    }
}

/// Session over the virtual modem
pub struct MockModem {
    handle: MockModemHandle,
}

impl MockModem {
    fn live(&self) -> SessionResult<MutexGuard<'_, MockState>> {
        let state = self.handle.lock();
        if state.destroyed {
            return Err(SessionError::Destroyed);
        }
        Ok(state)
    }

    fn ack_for(&self, id: u64) -> ReceiptAck {
        let handle = self.handle.clone();
        ReceiptAck::new(move |result: AckResult| {
            let mut state = handle.lock();
            let Some(message) = state.storage.get(&id).map(|stored| stored.message.clone()) else {
                return;
            };

            if result.is_ok() {
                state.storage.remove(&id);
            } else if let Some(stored) = state.storage.get_mut(&id) {
                stored.slot = Slot::Retained;
            }
            state.acknowledgements.push(AckRecord { message, result });
        })
    }
}

/// Addresses the modem accepts: optional `+`, then 3 to 20 digits
fn valid_address(address: &str) -> bool {
    let digits = address.strip_prefix('+').unwrap_or(address);
    (3..=20).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

impl DeviceSession for MockModem {
    fn send(&mut self, to: &str, content: &str, completion: SendCompletion) -> SessionResult<()> {
        let mut state = self.live()?;

        if !valid_address(to) {
            return Err(SessionError::InvalidArgument {
                parameter: "to".to_string(),
                reason: format!("`{}` is not a phone number", to),
            });
        }

        if !state.connected {
            let error = SessionError::Disconnected { device: state.device.clone() };
            state.queue.push_back(Pending::Completion(completion, Err(error)));
            return Ok(());
        }

        if let Some(error) = state.next_send_fault.take() {
            state.queue.push_back(Pending::Completion(completion, Err(error)));
            return Ok(());
        }

        let failures = state.fragment_failures.pop_front().unwrap_or_default();
        let fragments = (0..fragment_count(content))
            .map(|index| FragmentOutcome {
                index,
                delivered: !failures.contains(&index),
            })
            .collect();
        let report = SendReport::from_fragments(fragments);

        state.sent.push(SentMessage {
            to: to.to_string(),
            content: content.to_string(),
            report: report.clone(),
        });

        let loops_back = state.own_number.as_deref() == Some(to) && report.delivered_count() > 0;
        state.queue.push_back(Pending::Completion(completion, Ok(report)));
        if loops_back {
            let from = to.to_string();
            state.store(InboundMessage::new(from, Utc::now(), content));
        }

        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut ready = Vec::new();
        {
            let mut state = self.handle.lock();
            if state.destroyed {
                return Vec::new();
            }

            let mut held = VecDeque::new();
            while let Some(pending) = state.queue.pop_front() {
                match pending {
                    Pending::Completion(..) => ready.push(pending),
                    other if state.running => ready.push(other),
                    other => held.push_back(other),
                }
            }
            state.queue = held;
        }

        let mut events = Vec::new();
        for pending in ready {
            match pending {
                Pending::Completion(completion, result) => {
                    let completed = CompletedSend::new(completion, result);
                    events.push(SessionEvent::SendComplete(completed));
                }
                Pending::Fault(error) => events.push(SessionEvent::Error(error)),
                Pending::Deliver(id) => {
                    let message = {
                        let mut state = self.handle.lock();
                        match state.storage.get_mut(&id) {
                            Some(stored) if stored.slot != Slot::InFlight => {
                                stored.slot = Slot::InFlight;
                                Some(stored.message.clone())
                            }
                            _ => None,
                        }
                    };
                    if let Some(message) = message {
                        events.push(SessionEvent::Receive {
                            message,
                            ack: self.ack_for(id),
                        });
                    }
                }
            }
        }
        events
    }

    fn start(&mut self) -> SessionResult<()> {
        let mut state = self.live()?;
        state.running = true;

        // Anything delivered earlier but not accepted is offered again on every start.
        let unsettled: Vec<u64> = state
            .storage
            .iter()
            .filter(|(_, stored)| stored.slot != Slot::Waiting)
            .map(|(id, _)| *id)
            .collect();
        for id in unsettled {
            if let Some(stored) = state.storage.get_mut(&id) {
                stored.slot = Slot::Waiting;
            }
            state.queue.push_back(Pending::Deliver(id));
        }
        Ok(())
    }

    fn stop(&mut self) -> SessionResult<()> {
        self.live()?.running = false;
        Ok(())
    }

    fn destroy(&mut self) -> SessionResult<()> {
        let orphaned: Vec<SendCompletion> = {
            let mut state = self.live()?;
            state.running = false;
            state.destroyed = true;
            state
                .queue
                .drain(..)
                .filter_map(|pending| match pending {
                    Pending::Completion(completion, _) => Some(completion),
                    _ => None,
                })
                .collect()
        };

        for completion in orphaned {
            completion(Err(SessionError::Destroyed));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SendStatus;
    use crate::session::StorageError;

    fn started_modem() -> (Box<dyn DeviceSession>, MockModemHandle) {
        let factory = MockModemFactory::new();
        let handle = factory.handle();
        let mut modem = factory.create(&DriverConfig::default()).unwrap();
        modem.start().unwrap();
        (modem, handle)
    }

    fn capture() -> (SendCompletion, Arc<Mutex<Option<SessionResult<SendReport>>>>) {
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        let completion: SendCompletion = Box::new(move |result| {
            *sink.lock().unwrap() = Some(result);
        });
        (completion, slot)
    }

    /// Run finished sends and return everything else
    fn finish_sends(events: Vec<SessionEvent>) -> Vec<SessionEvent> {
        events
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::SendComplete(completed) => {
                    completed.finish();
                    None
                }
                other => Some(other),
            })
            .collect()
    }

    #[test]
    fn test_address_validation() {
        assert!(valid_address("+15551234"));
        assert!(valid_address("911"));
        assert!(!valid_address(""));
        assert!(!valid_address("+1"));
        assert!(!valid_address("555-1234"));
    }

    #[test]
    fn test_send_completes_on_poll() {
        let (mut modem, handle) = started_modem();
        let (completion, slot) = capture();

        modem.send("+15551234", "hello", completion).unwrap();
        assert!(slot.lock().unwrap().is_none());

        let events = modem.poll_events();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::SendComplete(completed)] if completed.result().is_ok()
        ));
        assert!(slot.lock().unwrap().is_none());

        assert!(finish_sends(events).is_empty());
        let report = slot.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(report.result, SendStatus::Success);
        assert_eq!(handle.sent_messages().len(), 1);
    }

    #[test]
    fn test_scripted_fragment_failures() {
        let (mut modem, handle) = started_modem();
        handle.fail_fragments(vec![1]);
        let (completion, slot) = capture();

        modem.send("+15551234", &"x".repeat(200), completion).unwrap();
        finish_sends(modem.poll_events());

        let report = slot.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(report.result, SendStatus::Partial);
        assert_eq!(report.fragments.len(), 2);
    }

    #[test]
    fn test_bad_address_is_rejected_synchronously() {
        let (mut modem, handle) = started_modem();
        let (completion, _slot) = capture();

        let result = modem.send("not-a-number", "hello", completion);
        assert!(matches!(result, Err(SessionError::InvalidArgument { .. })));
        assert!(handle.sent_messages().is_empty());
    }

    #[test]
    fn test_rejected_message_is_retained_and_redelivered() {
        let (mut modem, handle) = started_modem();
        handle.inject_message("+15559876", "ping");

        let mut events = modem.poll_events();
        assert_eq!(events.len(), 1);
        let Some(SessionEvent::Receive { ack, .. }) = events.pop() else {
            panic!("expected a receive event");
        };
        ack.acknowledge(Err(StorageError::new("database offline")));
        assert_eq!(handle.stored_count(), 1);
        assert!(modem.poll_events().is_empty());

        modem.stop().unwrap();
        modem.start().unwrap();
        let mut events = modem.poll_events();
        let Some(SessionEvent::Receive { ack, .. }) = events.pop() else {
            panic!("expected redelivery");
        };
        ack.acknowledge(Ok(()));
        assert_eq!(handle.stored_count(), 0);
        assert_eq!(handle.acknowledgements().len(), 2);
    }

    #[test]
    fn test_unacknowledged_message_is_redelivered_on_restart() {
        let (mut modem, handle) = started_modem();
        handle.inject_message("+15559876", "dropped");

        let events = modem.poll_events();
        assert_eq!(events.len(), 1);
        drop(events);
        assert!(handle.acknowledgements().is_empty());

        modem.stop().unwrap();
        modem.start().unwrap();
        let mut events = modem.poll_events();
        let Some(SessionEvent::Receive { message, ack }) = events.pop() else {
            panic!("expected redelivery");
        };
        assert_eq!(message.content, "dropped");
        ack.acknowledge(Ok(()));
        assert_eq!(handle.stored_count(), 0);
    }

    #[test]
    fn test_events_are_held_while_stopped() {
        let factory = MockModemFactory::new();
        let handle = factory.handle();
        let mut modem = factory.create(&DriverConfig::default()).unwrap();

        handle.inject_message("+15559876", "early");
        assert!(modem.poll_events().is_empty());

        modem.start().unwrap();
        assert_eq!(modem.poll_events().len(), 1);
    }

    #[test]
    fn test_loopback_to_own_number() {
        let factory = MockModemFactory::new();
        let handle = factory.handle();
        let config = DriverConfig {
            own_number: Some("+15550000".to_string()),
            ..DriverConfig::default()
        };
        let mut modem = factory.create(&config).unwrap();
        modem.start().unwrap();

        let (completion, _slot) = capture();
        modem.send("+15550000", "echo", completion).unwrap();

        let events = modem.poll_events();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::SendComplete(_), SessionEvent::Receive { message, .. }]
                if message.content == "echo"
        ));
        assert_eq!(handle.stored_count(), 1);
    }

    #[test]
    fn test_destroyed_modem_refuses_everything() {
        let (mut modem, handle) = started_modem();
        modem.destroy().unwrap();
        assert!(handle.is_destroyed());

        let (completion, _slot) = capture();
        assert_eq!(modem.send("+15551234", "hi", completion), Err(SessionError::Destroyed));
        assert_eq!(modem.start(), Err(SessionError::Destroyed));
        assert_eq!(modem.destroy(), Err(SessionError::Destroyed));
    }

    #[test]
    fn test_destroy_fails_in_flight_sends() {
        let (mut modem, _handle) = started_modem();
        let (completion, slot) = capture();
        modem.send("+15551234", "hello", completion).unwrap();

        modem.destroy().unwrap();
        assert_eq!(*slot.lock().unwrap(), Some(Err(SessionError::Destroyed)));
    }

    #[test]
    fn test_factory_hands_out_one_session() {
        let factory = MockModemFactory::new();
        factory.create(&DriverConfig::default()).unwrap();
        assert!(factory.create(&DriverConfig::default()).is_err());
    }
}
