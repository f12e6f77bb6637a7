//! Member directory: identity records keyed by id and phone handle.

use crate::{PondError, PondResult};
use chrono::Utc;
use pond_storage::{MemberStore, StorageError};
use pond_types::{Member, MemberId, PhoneHandle};
use std::sync::Arc;

pub struct MemberDirectory<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for MemberDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> MemberDirectory<S>
where
    S: MemberStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &MemberId) -> PondResult<Option<Member>> {
        if id.is_system() {
            return Ok(None);
        }
        Ok(self.store.get_member(id).await?)
    }

    pub async fn find_by_phone(&self, phone: &PhoneHandle) -> PondResult<Option<Member>> {
        Ok(self.store.get_member_by_phone(phone).await?)
    }

    /// Existing member for `phone`, or a freshly created one.
    ///
    /// A concurrent create for the same phone loses the unique constraint and
    /// re-reads the winner's record.
    pub async fn lookup_or_create(&self, phone: &PhoneHandle) -> PondResult<Member> {
        self.lookup_or_create_tracked(phone)
            .await
            .map(|(member, _)| member)
    }

    /// Like [`MemberDirectory::lookup_or_create`], also reporting whether
    /// this call created the record.
    pub async fn lookup_or_create_tracked(
        &self,
        phone: &PhoneHandle,
    ) -> PondResult<(Member, bool)> {
        if let Some(member) = self.store.get_member_by_phone(phone).await? {
            return Ok((member, false));
        }

        match self.store.create_member(phone, Utc::now()).await {
            Ok(member) => {
                tracing::info!(member = %member.id, "member created");
                Ok((member, true))
            }
            Err(StorageError::Conflict(_)) => self
                .store
                .get_member_by_phone(phone)
                .await?
                .map(|member| (member, false))
                .ok_or_else(|| PondError::NotFound(format!("member with phone {phone}"))),
            Err(other) => Err(other.into()),
        }
    }

    /// Delete the record entirely. Removing an absent member is a no-op.
    pub async fn remove(&self, id: &MemberId) -> PondResult<bool> {
        Ok(self.store.delete_member(id).await?)
    }

    pub async fn set_muted(&self, id: &MemberId, muted: bool) -> PondResult<bool> {
        Ok(self.store.set_muted(id, muted).await?)
    }

    pub async fn report(&self, id: &MemberId) -> PondResult<bool> {
        Ok(self.store.increment_report_count(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pond_storage::InMemoryPondStorage;

    #[tokio::test]
    async fn lookup_or_create_is_stable_per_phone() {
        let directory = MemberDirectory::new(Arc::new(InMemoryPondStorage::new()));
        let phone = PhoneHandle::new("+15552223333");

        let first = directory.lookup_or_create(&phone).await.unwrap();
        let second = directory.lookup_or_create(&phone).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!first.muted);
        assert_eq!(first.report_count, 0);
    }

    #[tokio::test]
    async fn tracked_lookup_reports_creation_once() {
        let directory = MemberDirectory::new(Arc::new(InMemoryPondStorage::new()));
        let phone = PhoneHandle::new("+15552225555");

        let (first, created) = directory.lookup_or_create_tracked(&phone).await.unwrap();
        assert!(created);
        let (second, created) = directory.lookup_or_create_tracked(&phone).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn system_identity_is_never_a_member() {
        let directory = MemberDirectory::new(Arc::new(InMemoryPondStorage::new()));
        assert!(directory.get(&MemberId::system()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn report_and_mute_update_record() {
        let directory = MemberDirectory::new(Arc::new(InMemoryPondStorage::new()));
        let member = directory
            .lookup_or_create(&PhoneHandle::new("+15552224444"))
            .await
            .unwrap();

        assert!(directory.report(&member.id).await.unwrap());
        assert!(directory.set_muted(&member.id, true).await.unwrap());
        let stored = directory.get(&member.id).await.unwrap().unwrap();
        assert_eq!(stored.report_count, 1);
        assert!(stored.muted);

        assert!(directory.remove(&member.id).await.unwrap());
        assert!(!directory.remove(&member.id).await.unwrap());
    }
}
