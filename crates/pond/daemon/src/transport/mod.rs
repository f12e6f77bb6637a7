//! Outbound SMS transports selected by configuration

mod log;
mod twilio;

pub use self::log::LogTransport;
pub use self::twilio::{Sender, TwilioTransport};

use crate::config::TransportConfig;
use crate::error::{DaemonError, DaemonResult};
use pond_engine::Transport;
use std::sync::Arc;

/// Build the transport described by `config`.
pub fn build_transport(config: &TransportConfig) -> DaemonResult<Arc<dyn Transport>> {
    match config {
        TransportConfig::Log => Ok(Arc::new(LogTransport::new())),
        TransportConfig::Twilio {
            account_sid,
            auth_token,
            messaging_service_sid,
            from_number,
            api_base,
        } => {
            let sender = match (messaging_service_sid, from_number) {
                (Some(sid), _) => Sender::MessagingService(sid.clone()),
                (None, Some(number)) => Sender::Number(number.clone()),
                (None, None) => {
                    return Err(DaemonError::Config(
                        "twilio transport needs messaging_service_sid or from_number".into(),
                    ))
                }
            };
            let transport = TwilioTransport::new(api_base, account_sid, auth_token, sender)
                .map_err(|e| DaemonError::Config(format!("twilio client: {e}")))?;
            Ok(Arc::new(transport))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twilio_requires_a_sender() {
        let config = TransportConfig::Twilio {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            messaging_service_sid: None,
            from_number: None,
            api_base: "https://api.twilio.com".into(),
        };
        assert!(matches!(build_transport(&config), Err(DaemonError::Config(_))));
    }

    #[test]
    fn log_transport_is_the_default() {
        assert!(build_transport(&TransportConfig::default()).is_ok());
    }
}
