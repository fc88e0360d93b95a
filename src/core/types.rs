//! Message and send-result types shared by drivers and device sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message to be transmitted.
///
/// Both fields default to empty so that a partially-formed payload still
/// deserializes; `validate` decides whether it can be handed to a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundMessage {
    /// Phone number or MSISDN of the recipient
    pub to: String,
    /// Message body as UTF-8 text
    pub content: String,
}

impl OutboundMessage {
    pub fn new(to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            content: content.into(),
        }
    }

    /// Check that the message carries both a recipient and a body.
    pub fn validate(&self) -> Result<(), MessageFault> {
        if self.to.trim().is_empty() {
            return Err(MessageFault::MissingRecipient);
        }
        if self.content.is_empty() {
            return Err(MessageFault::MissingContent);
        }
        Ok(())
    }
}

/// Why an outbound message was refused before transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFault {
    MissingRecipient,
    MissingContent,
}

/// A message delivered by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender address
    pub from: String,
    /// Time the device received the message
    pub timestamp: DateTime<Utc>,
    /// Message body as UTF-8 text
    pub content: String,
}

impl InboundMessage {
    pub fn new(from: impl Into<String>, timestamp: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            timestamp,
            content: content.into(),
        }
    }
}

/// Delivery classification of a send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    /// Every fragment reached the network layer
    Success,
    /// Some fragments were delivered, some were not
    Partial,
    /// Nothing was delivered
    Failure,
}

impl SendStatus {
    /// Classify a send from its per-fragment delivery flags.
    pub fn classify<I>(delivered: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let (mut ok, mut failed) = (0usize, 0usize);
        for flag in delivered {
            if flag {
                ok += 1;
            } else {
                failed += 1;
            }
        }

        match (ok, failed) {
            (0, _) => SendStatus::Failure,
            (_, 0) => SendStatus::Success,
            _ => SendStatus::Partial,
        }
    }
}

/// Delivery outcome of one physical segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentOutcome {
    pub index: usize,
    pub delivered: bool,
}

/// Status reported by a device session once a send completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReport {
    pub result: SendStatus,
    #[serde(default)]
    pub fragments: Vec<FragmentOutcome>,
}

impl SendReport {
    /// Build a report whose classification is derived from `fragments`.
    pub fn from_fragments(fragments: Vec<FragmentOutcome>) -> Self {
        let result = SendStatus::classify(fragments.iter().map(|f| f.delivered));
        Self { result, fragments }
    }

    pub fn is_success(&self) -> bool {
        self.result == SendStatus::Success
    }

    /// Number of fragments that reached the network layer
    pub fn delivered_count(&self) -> usize {
        self.fragments.iter().filter(|f| f.delivered).count()
    }
}
