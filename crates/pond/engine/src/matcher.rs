//! Randomized partner selection from the recency window.

use crate::{ConversationRegistry, MemberDirectory, PondError, PondResult};
use chrono::{Duration, Utc};
use pond_ledger::InvitationLedger;
use pond_storage::PondStorage;
use pond_types::{Conversation, Member, MemberId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};

/// A successful match: who the member now talks to, and the new pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub partner: MemberId,
    pub conversation: Conversation,
}

/// Derives the candidate pool and pairs a member with a random live partner.
///
/// Each candidate is checked and claimed as its own committed step; nothing is
/// locked across the scan, so abandoning it half way leaves no residue.
pub struct MatchEngine<S: ?Sized> {
    ledger: InvitationLedger<S>,
    directory: MemberDirectory<S>,
    registry: ConversationRegistry<S>,
    stale_after: Duration,
    rng: Mutex<StdRng>,
}

impl<S> MatchEngine<S>
where
    S: PondStorage + ?Sized,
{
    pub fn new(storage: Arc<S>, stale_after: Duration) -> Self {
        Self::with_rng(storage, stale_after, StdRng::from_entropy())
    }

    /// Deterministic draw order, for replaying a scenario.
    pub fn with_seed(storage: Arc<S>, stale_after: Duration, seed: u64) -> Self {
        Self::with_rng(storage, stale_after, StdRng::seed_from_u64(seed))
    }

    fn with_rng(storage: Arc<S>, stale_after: Duration, rng: StdRng) -> Self {
        Self {
            ledger: InvitationLedger::new(storage.clone()),
            directory: MemberDirectory::new(storage.clone()),
            registry: ConversationRegistry::new(storage),
            stale_after,
            rng: Mutex::new(rng),
        }
    }

    /// Pair `member` with a random eligible participant of the recency
    /// window, never `member` itself nor `exclude_last`.
    ///
    /// Muted and vanished candidates are skipped, as are candidates that lose
    /// the idle-guarded create to a concurrent search. If any conversation of
    /// a candidate has gone stale the whole search stops with no partner.
    ///
    /// Fails with `PondError::Conflict` when `member` itself was paired by a
    /// concurrent request while the search ran.
    pub async fn find_partner(
        &self,
        member: &Member,
        exclude_last: Option<&MemberId>,
    ) -> PondResult<Option<Pairing>> {
        let counter = self.ledger.counter().await?;
        let window = usize::try_from(counter).unwrap_or(0);
        let mut pool = self
            .ledger
            .recent_participants(window)
            .await?
            .into_iter()
            .filter(|id| id != &member.id && Some(id) != exclude_last)
            .collect::<Vec<_>>();
        self.shuffle(&mut pool);

        let now = Utc::now();
        for candidate_id in pool {
            let candidate = match self.directory.get(&candidate_id).await? {
                Some(candidate) => candidate,
                None => {
                    tracing::debug!(candidate = %candidate_id, "candidate left the pond");
                    continue;
                }
            };
            if candidate.muted {
                tracing::debug!(candidate = %candidate_id, "candidate muted");
                continue;
            }

            let existing = self.registry.for_member(&candidate_id).await?;
            if let Some(stale) = existing.iter().find(|c| c.is_stale(now, self.stale_after)) {
                tracing::warn!(
                    candidate = %candidate_id,
                    conversation = %stale.id,
                    "stale conversation found, abandoning search"
                );
                return Ok(None);
            }

            match self.registry.create(&member.id, &candidate_id).await {
                Ok(conversation) => {
                    tracing::info!(
                        member = %member.id,
                        partner = %candidate_id,
                        conversation = %conversation.id,
                        "new conversation"
                    );
                    return Ok(Some(Pairing {
                        partner: candidate_id,
                        conversation,
                    }));
                }
                Err(PondError::Conflict(reason)) => {
                    // The create fails when either side is busy.
                    if !self.registry.for_member(&member.id).await?.is_empty() {
                        tracing::debug!(member = %member.id, "member paired concurrently");
                        return Err(PondError::Conflict(format!(
                            "member {} is already in a conversation",
                            member.id
                        )));
                    }
                    tracing::debug!(candidate = %candidate_id, %reason, "candidate busy");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        Ok(None)
    }

    fn shuffle(&self, pool: &mut [MemberId]) {
        match self.rng.lock() {
            Ok(mut rng) => pool.shuffle(&mut *rng),
            Err(poisoned) => pool.shuffle(&mut *poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pond_storage::{ConversationStore, InMemoryPondStorage};
    use pond_types::PhoneHandle;
    use proptest::prelude::*;

    struct Pond {
        storage: Arc<InMemoryPondStorage>,
        directory: MemberDirectory<InMemoryPondStorage>,
        ledger: InvitationLedger<InMemoryPondStorage>,
    }

    impl Pond {
        fn new() -> Self {
            let storage = Arc::new(InMemoryPondStorage::new());
            Self {
                directory: MemberDirectory::new(storage.clone()),
                ledger: InvitationLedger::new(storage.clone()),
                storage,
            }
        }

        async fn join(&self, n: u32, inviter: Option<&Member>) -> Member {
            let member = self
                .directory
                .lookup_or_create(&PhoneHandle::new(format!("+1555100{n:04}")))
                .await
                .unwrap();
            let inviter = inviter.map(|m| m.id.clone()).unwrap_or_else(MemberId::system);
            self.ledger.record_invitation(&inviter, &member.id).await.unwrap();
            member
        }

        fn engine(&self, seed: u64) -> MatchEngine<InMemoryPondStorage> {
            MatchEngine::with_seed(self.storage.clone(), Duration::minutes(5), seed)
        }
    }

    #[tokio::test]
    async fn pairs_with_the_only_live_candidate() {
        let pond = Pond::new();
        let x = pond.join(1, None).await;
        let y = pond.join(2, Some(&x)).await;

        let pairing = pond.engine(1).find_partner(&x, None).await.unwrap().unwrap();
        assert_eq!(pairing.partner, y.id);
        assert!(pairing.conversation.involves(&x.id));
        assert!(pairing.conversation.involves(&y.id));
    }

    #[tokio::test]
    async fn excluded_and_muted_candidates_are_skipped() {
        let pond = Pond::new();
        let x = pond.join(1, None).await;
        let y = pond.join(2, Some(&x)).await;
        let z = pond.join(3, Some(&x)).await;

        let engine = pond.engine(7);
        pond.directory.set_muted(&z.id, true).await.unwrap();
        assert!(engine.find_partner(&x, Some(&y.id)).await.unwrap().is_none());

        pond.directory.set_muted(&z.id, false).await.unwrap();
        let pairing = engine.find_partner(&x, Some(&y.id)).await.unwrap().unwrap();
        assert_eq!(pairing.partner, z.id);
    }

    #[tokio::test]
    async fn stale_conversation_aborts_the_search() {
        let pond = Pond::new();
        let x = pond.join(1, None).await;
        let y = pond.join(2, Some(&x)).await;
        let w = pond.join(3, None).await;

        let old = Utc::now() - Duration::minutes(10);
        pond.storage
            .create_conversation_if_idle(&y.id, &w.id, old)
            .await
            .unwrap();

        // Every candidate sits in the stale conversation.
        assert!(pond.engine(3).find_partner(&x, None).await.unwrap().is_none());
        assert!(pond
            .storage
            .conversations_for_member(&x.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn stale_candidate_ends_search_instead_of_being_skipped() {
        let mut aborted = 0;
        for seed in 0..32 {
            let pond = Pond::new();
            let x = pond.join(1, None).await;
            let y = pond.join(2, Some(&x)).await;
            let idle = pond.join(3, Some(&x)).await;
            let stale_partner = MemberId::new("gone-quiet");
            pond.storage
                .create_conversation_if_idle(&y.id, &stale_partner, Utc::now() - Duration::minutes(10))
                .await
                .unwrap();

            match pond.engine(seed).find_partner(&x, None).await.unwrap() {
                None => aborted += 1,
                Some(pairing) => assert_eq!(pairing.partner, idle.id),
            }
        }
        assert!(aborted > 0);
    }

    #[tokio::test]
    async fn fresh_but_busy_candidate_is_skipped() {
        let pond = Pond::new();
        let x = pond.join(1, None).await;
        let y = pond.join(2, Some(&x)).await;
        let idle = pond.join(3, Some(&x)).await;
        pond.storage
            .create_conversation_if_idle(&y.id, &MemberId::new("chatting"), Utc::now())
            .await
            .unwrap();

        for seed in 0..8 {
            let pairing = pond.engine(seed).find_partner(&x, None).await.unwrap().unwrap();
            assert_eq!(pairing.partner, idle.id);
            pond.storage
                .delete_conversation(&pairing.conversation.id)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn already_paired_seeker_is_a_conflict_not_an_empty_pool() {
        let pond = Pond::new();
        let seeker = pond.join(0, None).await;
        let mut others = Vec::new();
        for n in 1..6 {
            others.push(pond.join(n, Some(&seeker)).await);
        }
        pond.storage
            .create_conversation_if_idle(&seeker.id, &others[0].id, Utc::now())
            .await
            .unwrap();

        for seed in 0..8 {
            let err = pond.engine(seed).find_partner(&seeker, None).await.unwrap_err();
            assert!(matches!(err, PondError::Conflict(_)), "seed {seed}: {err:?}");
        }
        for idle in &others[1..] {
            assert!(pond
                .storage
                .conversations_for_member(&idle.id)
                .await
                .unwrap()
                .is_empty());
        }
    }

    #[tokio::test]
    async fn lapsed_members_fall_out_of_the_pool() {
        let pond = Pond::new();
        let x = pond.join(1, None).await;
        let y = pond.join(2, Some(&x)).await;
        pond.directory.remove(&y.id).await.unwrap();

        assert!(pond.engine(5).find_partner(&x, None).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_searches_never_double_book_a_candidate() {
        let pond = Pond::new();
        let target = pond.join(1, None).await;
        let mut seekers = Vec::new();
        for n in 2..10 {
            seekers.push(pond.join(n, Some(&target)).await);
        }
        // Only the target is unmuted; every seeker competes for them.
        for seeker in &seekers {
            pond.directory.set_muted(&seeker.id, true).await.unwrap();
        }

        let engine = Arc::new(pond.engine(11));
        let mut handles = Vec::new();
        for seeker in seekers {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.find_partner(&seeker, None).await.unwrap()
            }));
        }

        let mut paired = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                paired += 1;
            }
        }
        assert_eq!(paired, 1);
        assert_eq!(
            pond.storage
                .conversations_for_member(&target.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    proptest! {
        #[test]
        fn property_partner_is_never_self_or_excluded(
            members in 2u32..8,
            exclude_index in 0u32..8,
            seed in any::<u64>(),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");

            rt.block_on(async move {
                let pond = Pond::new();
                let seeker = pond.join(0, None).await;
                let mut others = Vec::new();
                for n in 1..=members {
                    others.push(pond.join(n, Some(&seeker)).await);
                }
                let excluded = others
                    .get(exclude_index as usize)
                    .map(|m| m.id.clone());

                let result = pond
                    .engine(seed)
                    .find_partner(&seeker, excluded.as_ref())
                    .await
                    .unwrap();
                if let Some(pairing) = result {
                    assert_ne!(pairing.partner, seeker.id);
                    assert_ne!(Some(pairing.partner), excluded);
                }
            });
        }
    }
}
