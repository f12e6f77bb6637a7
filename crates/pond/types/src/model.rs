use crate::{ConversationId, MemberId, PhoneHandle};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identity record for a pond member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub phone: PhoneHandle,
    pub created: DateTime<Utc>,
    pub muted: bool,
    pub report_count: u32,
}

impl Member {
    /// A fresh, unmuted, unreported member.
    pub fn new(phone: PhoneHandle, created: DateTime<Utc>) -> Self {
        Self {
            id: MemberId::generate(),
            phone,
            created,
            muted: false,
            report_count: 0,
        }
    }
}

/// One immutable entry of the invitation ledger.
///
/// `sequence` is the value of the global counter right after the invitation
/// bumped it, so it doubles as a recency signal for both participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationEdge {
    pub inviter: MemberId,
    pub invitee: MemberId,
    pub sequence: i64,
    pub created: DateTime<Utc>,
}

/// An active pairing between two members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub member_a: MemberId,
    pub member_b: MemberId,
    pub created: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(member_a: MemberId, member_b: MemberId, now: DateTime<Utc>) -> Self {
        Self {
            id: ConversationId::generate(),
            member_a,
            member_b,
            created: now,
            last_message_at: now,
        }
    }

    pub fn involves(&self, member: &MemberId) -> bool {
        &self.member_a == member || &self.member_b == member
    }

    /// The participant that is not `member`.
    pub fn partner_of(&self, member: &MemberId) -> &MemberId {
        if &self.member_a == member {
            &self.member_b
        } else {
            &self.member_a
        }
    }

    /// True when nothing has been forwarded for longer than `threshold`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.last_message_at < now - threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_of_returns_other_side() {
        let a = MemberId::new("a");
        let b = MemberId::new("b");
        let conversation = Conversation::new(a.clone(), b.clone(), Utc::now());
        assert_eq!(conversation.partner_of(&a), &b);
        assert_eq!(conversation.partner_of(&b), &a);
        assert!(conversation.involves(&a));
        assert!(!conversation.involves(&MemberId::new("c")));
    }

    #[test]
    fn staleness_uses_last_message() {
        let now = Utc::now();
        let mut conversation =
            Conversation::new(MemberId::new("a"), MemberId::new("b"), now - Duration::minutes(10));
        assert!(conversation.is_stale(now, Duration::minutes(5)));

        conversation.last_message_at = now - Duration::minutes(1);
        assert!(!conversation.is_stale(now, Duration::minutes(5)));
    }
}
