//! Outbound SMS delivery.

use async_trait::async_trait;
use pond_types::PhoneHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The provider refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Sends text to a phone handle. Delivery retries are the implementation's
/// concern; the engine logs a failure and carries on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: &PhoneHandle, body: &str) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: PhoneHandle,
    pub body: String,
}

/// Keeps every message in memory instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail with [`TransportError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn sent_to(&self, to: &PhoneHandle) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|message| &message.to == to)
            .map(|message| message.body)
            .collect()
    }

    pub fn clear(&self) {
        match self.sent.lock() {
            Ok(mut sent) => sent.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, to: &PhoneHandle, body: &str) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("recording transport set to fail".into()));
        }
        let message = OutboundMessage {
            to: to.clone(),
            body: body.to_string(),
        };
        match self.sent.lock() {
            Ok(mut sent) => sent.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
        Ok(())
    }
}
