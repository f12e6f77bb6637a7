//! Conversation registry: at most one live pairing per member.

use crate::PondResult;
use chrono::{DateTime, Utc};
use pond_storage::ConversationStore;
use pond_types::{Conversation, ConversationId, MemberId};
use std::sync::Arc;

pub struct ConversationRegistry<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ConversationRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> ConversationRegistry<S>
where
    S: ConversationStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// All conversations where `member` is either participant, oldest first.
    pub async fn for_member(&self, member: &MemberId) -> PondResult<Vec<Conversation>> {
        Ok(self.store.conversations_for_member(member).await?)
    }

    /// Pair `a` with `b`. Fails with `PondError::Conflict` when either is
    /// already in a conversation.
    pub async fn create(&self, a: &MemberId, b: &MemberId) -> PondResult<Conversation> {
        Ok(self.store.create_conversation_if_idle(a, b, Utc::now()).await?)
    }

    pub async fn delete(&self, id: &ConversationId) -> PondResult<bool> {
        Ok(self.store.delete_conversation(id).await?)
    }

    pub async fn touch(&self, id: &ConversationId, at: DateTime<Utc>) -> PondResult<bool> {
        Ok(self.store.touch_conversation(id, at).await?)
    }

    /// Remove every conversation of `member` and return what was removed.
    /// Safe to repeat: rows already gone are skipped.
    pub async fn clear_member(&self, member: &MemberId) -> PondResult<Vec<Conversation>> {
        let conversations = self.for_member(member).await?;
        for conversation in &conversations {
            if !self.delete(&conversation.id).await? {
                tracing::debug!(conversation = %conversation.id, "conversation already gone");
            }
        }
        Ok(conversations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PondError;
    use pond_storage::InMemoryPondStorage;

    #[tokio::test]
    async fn clear_member_is_idempotent() {
        let registry = ConversationRegistry::new(Arc::new(InMemoryPondStorage::new()));
        let (a, b) = (MemberId::new("a"), MemberId::new("b"));
        registry.create(&a, &b).await.unwrap();

        let removed = registry.clear_member(&a).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(registry.for_member(&b).await.unwrap().is_empty());
        assert!(registry.clear_member(&a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn double_booking_is_a_conflict() {
        let registry = ConversationRegistry::new(Arc::new(InMemoryPondStorage::new()));
        let (a, b, c) = (MemberId::new("a"), MemberId::new("b"), MemberId::new("c"));
        registry.create(&a, &b).await.unwrap();
        assert!(matches!(
            registry.create(&c, &a).await,
            Err(PondError::Conflict(_))
        ));
    }
}
