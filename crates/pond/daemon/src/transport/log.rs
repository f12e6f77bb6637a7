use async_trait::async_trait;
use pond_engine::{Transport, TransportError};
use pond_types::PhoneHandle;

/// Development transport: logs each message and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl LogTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, to: &PhoneHandle, body: &str) -> Result<(), TransportError> {
        tracing::info!(to = %to, body, "outbound sms (not sent)");
        Ok(())
    }
}
