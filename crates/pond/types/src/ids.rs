//! Strongly-typed identifiers for pond entities.

use crate::SYSTEM_MEMBER_ID;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a member.
///
/// Generated members carry a simple (hyphenless) UUID. The reserved
/// [`SYSTEM_MEMBER_ID`] only ever appears as an inviter on ledger edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The pond's bootstrap identity.
    pub fn system() -> Self {
        Self(SYSTEM_MEMBER_ID.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_MEMBER_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Unique identifier for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conv:{}", self.0.simple())
    }
}

/// A normalized E.164 phone handle, e.g. `+15551234567`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneHandle(String);

impl PhoneHandle {
    /// Wrap an already-normalized handle. Parsing lives with the phone parser.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_member_ids_are_never_system() {
        let id = MemberId::generate();
        assert!(!id.is_system());
        assert_eq!(id.as_str().len(), 32);
        assert!(MemberId::system().is_system());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = MemberId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let phone = PhoneHandle::new("+15551234567");
        assert_eq!(phone.to_string(), "+15551234567");
    }
}
