//! Duckpond engine.
//!
//! Turns inbound text messages from members into ledger, directory and
//! conversation operations plus outbound replies:
//!
//! ```text
//! inbound text -> CommandInterpreter -> MemberDirectory (identity)
//!                                    -> InvitationLedger / ConversationRegistry
//!                                    -> MatchEngine (new pairings)
//!                                    -> Transport (notifications, forwarding)
//! ```
//!
//! Transport delivery and phone parsing are collaborators behind the
//! [`Transport`] and [`PhoneParser`] traits.

#![deny(unsafe_code)]

pub mod command;
pub mod directory;
pub mod error;
pub mod interpreter;
pub mod matcher;
pub mod messages;
pub mod phone;
pub mod registry;
pub mod transport;

pub use command::Command;
pub use directory::MemberDirectory;
pub use error::{PondError, PondResult};
pub use interpreter::CommandInterpreter;
pub use matcher::{MatchEngine, Pairing};
pub use phone::{NanpPhoneParser, PhoneNumber, PhoneParseError, PhoneParser};
pub use registry::ConversationRegistry;
pub use transport::{OutboundMessage, RecordingTransport, Transport, TransportError};

use chrono::Duration;
use pond_types::{DEFAULT_STALE_AFTER_SECS, DEFAULT_WINDOW_SIZE};

/// Tunables shared by the matcher and the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PondPolicy {
    /// Invitations in the recency window (N).
    pub window_size: usize,
    /// Idle time after which a conversation counts as dead for matching.
    pub stale_after: Duration,
    /// Region used to interpret numbers written without a country code.
    pub default_region: String,
}

impl Default for PondPolicy {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            stale_after: Duration::seconds(DEFAULT_STALE_AFTER_SECS),
            default_region: "US".to_string(),
        }
    }
}
