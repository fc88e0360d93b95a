//! SMS Transport
//!
//! Pluggable driver layer for sending and receiving SMS through a modem.
//! Drivers own a device session, classify outbound sends, and hand inbound
//! messages to their owner together with an acknowledgement that decides
//! whether the device may purge the message.

pub mod core;
pub mod session;
pub mod driver;
pub mod trace;
pub mod utils;
pub mod factory;

// Re-export commonly used types
pub use core::{InboundMessage, OutboundMessage, SendReport, SendStatus, FragmentOutcome};
pub use session::{
    DeviceSession, SessionFactory, SessionEvent, SessionError, SessionResult, StorageError,
    ReceiptAck, AckResult, CompletedSend, MockModem, MockModemFactory, MockModemHandle,
};
pub use driver::{
    Driver, DriverError, DriverResult, DriverState, ModemDriver, Done,
    SendCallback, ReceiveHandler, ErrorHandler,
};
pub use trace::{TraceSink, TraceEvent, TracingSink, MemorySink};
pub use utils::{DriverConfig, ConfigError};
pub use factory::DriverRegistry;
