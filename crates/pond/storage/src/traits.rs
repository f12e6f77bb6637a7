use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pond_types::{Conversation, ConversationId, InvitationEdge, Member, MemberId, PhoneHandle};

/// Storage interface for member identity records.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn get_member(&self, id: &MemberId) -> StorageResult<Option<Member>>;

    async fn get_member_by_phone(&self, phone: &PhoneHandle) -> StorageResult<Option<Member>>;

    /// Insert a new member. Fails with `Conflict` if the phone is taken.
    async fn create_member(&self, phone: &PhoneHandle, created: DateTime<Utc>)
        -> StorageResult<Member>;

    /// Remove the record entirely. Returns whether a row was removed.
    async fn delete_member(&self, id: &MemberId) -> StorageResult<bool>;

    /// Returns `false` when the member no longer exists.
    async fn set_muted(&self, id: &MemberId, muted: bool) -> StorageResult<bool>;

    /// Returns `false` when the member no longer exists.
    async fn increment_report_count(&self, id: &MemberId) -> StorageResult<bool>;
}

/// Storage interface for the append-only invitation ledger.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    /// Bump the global counter by `step` and append an edge keyed to the
    /// post-increment value, as one atomic unit.
    async fn append_invitation(
        &self,
        inviter: &MemberId,
        invitee: &MemberId,
        step: i64,
        created: DateTime<Utc>,
    ) -> StorageResult<InvitationEdge>;

    /// Highest sequence on edges where `member` is the inviter and the
    /// sequence is strictly above `min_exclusive`.
    async fn max_sequence_as_inviter(
        &self,
        member: &MemberId,
        min_exclusive: i64,
    ) -> StorageResult<Option<i64>>;

    /// Same as [`InvitationStore::max_sequence_as_inviter`] for the invitee side.
    async fn max_sequence_as_invitee(
        &self,
        member: &MemberId,
        min_exclusive: i64,
    ) -> StorageResult<Option<i64>>;

    /// The newest `limit` edges, highest sequence first.
    async fn recent_invitations(&self, limit: usize) -> StorageResult<Vec<InvitationEdge>>;

    async fn counter(&self) -> StorageResult<i64>;

    /// Adjust the counter without writing an edge. Returns the new value.
    async fn adjust_counter(&self, delta: i64) -> StorageResult<i64>;
}

/// Storage interface for active pairings.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Every conversation where `member` is either participant.
    async fn conversations_for_member(&self, member: &MemberId)
        -> StorageResult<Vec<Conversation>>;

    /// Create a pairing only if neither participant currently has one.
    /// Fails with `Conflict` otherwise.
    async fn create_conversation_if_idle(
        &self,
        member_a: &MemberId,
        member_b: &MemberId,
        now: DateTime<Utc>,
    ) -> StorageResult<Conversation>;

    /// Returns whether a row was removed; deleting twice is not an error.
    async fn delete_conversation(&self, id: &ConversationId) -> StorageResult<bool>;

    /// Returns `false` when the conversation no longer exists.
    async fn touch_conversation(
        &self,
        id: &ConversationId,
        at: DateTime<Utc>,
    ) -> StorageResult<bool>;
}

/// Unified storage bundle used by the pond core.
pub trait PondStorage: MemberStore + InvitationStore + ConversationStore + Send + Sync {}

impl<T> PondStorage for T where T: MemberStore + InvitationStore + ConversationStore + Send + Sync {}
