//! Twilio Messages REST API transport

use async_trait::async_trait;
use pond_engine::{Transport, TransportError};
use pond_types::PhoneHandle;
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Who the message appears to come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    MessagingService(String),
    Number(String),
}

/// Sends each message with one authenticated form POST.
#[derive(Debug, Clone)]
pub struct TwilioTransport {
    client: reqwest::Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    sender: Sender,
}

impl TwilioTransport {
    pub fn new(
        api_base: &str,
        account_sid: &str,
        auth_token: &str,
        sender: Sender,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            messages_url: messages_url(api_base, account_sid),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            sender,
        })
    }

    fn form<'a>(&'a self, to: &'a PhoneHandle, body: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut form = vec![("To", to.as_str()), ("Body", body)];
        match &self.sender {
            Sender::MessagingService(sid) => form.push(("MessagingServiceSid", sid.as_str())),
            Sender::Number(number) => form.push(("From", number.as_str())),
        }
        form
    }
}

fn messages_url(api_base: &str, account_sid: &str) -> String {
    format!(
        "{}/2010-04-01/Accounts/{}/Messages.json",
        api_base.trim_end_matches('/'),
        account_sid
    )
}

#[async_trait]
impl Transport for TwilioTransport {
    async fn send(&self, to: &PhoneHandle, body: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&self.form(to, body))
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %to, "sms accepted by twilio");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(TransportError::Unavailable(format!("{status}: {detail}")))
        } else {
            Err(TransportError::Rejected(format!("{status}: {detail}")))
        }
    }
}
