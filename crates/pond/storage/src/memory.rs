//! In-memory reference implementation of the pond storage traits.
//!
//! This adapter is deterministic and test-friendly. Every compound operation
//! (counter + edge, idle check + insert) runs under a single write lock, which
//! gives the same atomicity the PostgreSQL adapter gets from transactions.

use crate::traits::{ConversationStore, InvitationStore, MemberStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pond_types::{Conversation, ConversationId, InvitationEdge, Member, MemberId, PhoneHandle};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    counter: i64,
    edges: Vec<InvitationEdge>,
}

/// In-memory pond storage adapter.
#[derive(Default)]
pub struct InMemoryPondStorage {
    members: RwLock<HashMap<MemberId, Member>>,
    ledger: RwLock<LedgerState>,
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl InMemoryPondStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> StorageError {
    StorageError::Backend(format!("{what} lock poisoned"))
}

#[async_trait]
impl MemberStore for InMemoryPondStorage {
    async fn get_member(&self, id: &MemberId) -> StorageResult<Option<Member>> {
        let guard = self.members.read().map_err(|_| poisoned("members"))?;
        Ok(guard.get(id).cloned())
    }

    async fn get_member_by_phone(&self, phone: &PhoneHandle) -> StorageResult<Option<Member>> {
        let guard = self.members.read().map_err(|_| poisoned("members"))?;
        Ok(guard.values().find(|m| &m.phone == phone).cloned())
    }

    async fn create_member(
        &self,
        phone: &PhoneHandle,
        created: DateTime<Utc>,
    ) -> StorageResult<Member> {
        let mut guard = self.members.write().map_err(|_| poisoned("members"))?;
        if guard.values().any(|m| &m.phone == phone) {
            return Err(StorageError::Conflict(format!(
                "member with phone {phone} already exists"
            )));
        }

        let member = Member::new(phone.clone(), created);
        guard.insert(member.id.clone(), member.clone());
        Ok(member)
    }

    async fn delete_member(&self, id: &MemberId) -> StorageResult<bool> {
        let mut guard = self.members.write().map_err(|_| poisoned("members"))?;
        Ok(guard.remove(id).is_some())
    }

    async fn set_muted(&self, id: &MemberId, muted: bool) -> StorageResult<bool> {
        let mut guard = self.members.write().map_err(|_| poisoned("members"))?;
        Ok(match guard.get_mut(id) {
            Some(member) => {
                member.muted = muted;
                true
            }
            None => false,
        })
    }

    async fn increment_report_count(&self, id: &MemberId) -> StorageResult<bool> {
        let mut guard = self.members.write().map_err(|_| poisoned("members"))?;
        Ok(match guard.get_mut(id) {
            Some(member) => {
                member.report_count = member.report_count.saturating_add(1);
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl InvitationStore for InMemoryPondStorage {
    async fn append_invitation(
        &self,
        inviter: &MemberId,
        invitee: &MemberId,
        step: i64,
        created: DateTime<Utc>,
    ) -> StorageResult<InvitationEdge> {
        if step <= 0 {
            return Err(StorageError::InvalidInput(format!(
                "invitation step must be positive, got {step}"
            )));
        }

        let mut guard = self.ledger.write().map_err(|_| poisoned("ledger"))?;
        guard.counter += step;
        let edge = InvitationEdge {
            inviter: inviter.clone(),
            invitee: invitee.clone(),
            sequence: guard.counter,
            created,
        };
        guard.edges.push(edge.clone());
        Ok(edge)
    }

    async fn max_sequence_as_inviter(
        &self,
        member: &MemberId,
        min_exclusive: i64,
    ) -> StorageResult<Option<i64>> {
        let guard = self.ledger.read().map_err(|_| poisoned("ledger"))?;
        Ok(guard
            .edges
            .iter()
            .filter(|e| &e.inviter == member && e.sequence > min_exclusive)
            .map(|e| e.sequence)
            .max())
    }

    async fn max_sequence_as_invitee(
        &self,
        member: &MemberId,
        min_exclusive: i64,
    ) -> StorageResult<Option<i64>> {
        let guard = self.ledger.read().map_err(|_| poisoned("ledger"))?;
        Ok(guard
            .edges
            .iter()
            .filter(|e| &e.invitee == member && e.sequence > min_exclusive)
            .map(|e| e.sequence)
            .max())
    }

    async fn recent_invitations(&self, limit: usize) -> StorageResult<Vec<InvitationEdge>> {
        let guard = self.ledger.read().map_err(|_| poisoned("ledger"))?;
        // Newest append first so ties on sequence keep insertion recency.
        let mut edges = guard.edges.iter().rev().cloned().collect::<Vec<_>>();
        edges.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        edges.truncate(limit);
        Ok(edges)
    }

    async fn counter(&self) -> StorageResult<i64> {
        let guard = self.ledger.read().map_err(|_| poisoned("ledger"))?;
        Ok(guard.counter)
    }

    async fn adjust_counter(&self, delta: i64) -> StorageResult<i64> {
        let mut guard = self.ledger.write().map_err(|_| poisoned("ledger"))?;
        guard.counter += delta;
        Ok(guard.counter)
    }
}

#[async_trait]
impl ConversationStore for InMemoryPondStorage {
    async fn conversations_for_member(
        &self,
        member: &MemberId,
    ) -> StorageResult<Vec<Conversation>> {
        let guard = self
            .conversations
            .read()
            .map_err(|_| poisoned("conversations"))?;
        let mut values = guard
            .values()
            .filter(|c| c.involves(member))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(values)
    }

    async fn create_conversation_if_idle(
        &self,
        member_a: &MemberId,
        member_b: &MemberId,
        now: DateTime<Utc>,
    ) -> StorageResult<Conversation> {
        if member_a == member_b {
            return Err(StorageError::InvalidInput(format!(
                "member {member_a} cannot talk to themselves"
            )));
        }

        let mut guard = self
            .conversations
            .write()
            .map_err(|_| poisoned("conversations"))?;
        if let Some(busy) = guard
            .values()
            .find(|c| c.involves(member_a) || c.involves(member_b))
        {
            return Err(StorageError::Conflict(format!(
                "{} already pairs {} with {}",
                busy.id, busy.member_a, busy.member_b
            )));
        }

        let conversation = Conversation::new(member_a.clone(), member_b.clone(), now);
        guard.insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn delete_conversation(&self, id: &ConversationId) -> StorageResult<bool> {
        let mut guard = self
            .conversations
            .write()
            .map_err(|_| poisoned("conversations"))?;
        Ok(guard.remove(id).is_some())
    }

    async fn touch_conversation(
        &self,
        id: &ConversationId,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut guard = self
            .conversations
            .write()
            .map_err(|_| poisoned("conversations"))?;
        Ok(match guard.get_mut(id) {
            Some(conversation) => {
                conversation.last_message_at = at;
                true
            }
            None => false,
        })
    }
}
