//! Duckpond invitation ledger.
//!
//! Every invitation appends an immutable edge whose sequence number comes from
//! a single global counter advanced by two: one slot for the inviter's
//! refreshed position and one for the invitee's new position. A member's rank
//! is the freshest sequence they appear on, with the inviter placed one slot
//! behind the invitee. The most recent edges form the recency window that
//! decides who can be matched.

#![deny(unsafe_code)]

use chrono::Utc;
use pond_storage::{InvitationStore, StorageError};
use pond_types::{InvitationEdge, MemberId};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Counter advance per invitation.
pub const INVITATION_STEP: i64 = 2;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("counter adjustments must be non-negative, got {0}")]
    InvalidAmount(i64),

    #[error("inviter and invitee are the same member: {0}")]
    SelfInvitation(MemberId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// A member's place in the pond relative to the current counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// 1-based spot; larger means closer to falling out of the window.
    pub spot: i64,
    /// Counter value the spot was computed against.
    pub total: i64,
}

/// Append-only invitation ledger over an [`InvitationStore`].
pub struct InvitationLedger<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for InvitationLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> InvitationLedger<S>
where
    S: InvitationStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Advance the counter by [`INVITATION_STEP`] and append the edge keyed to
    /// the post-increment value. Storage performs both as one unit.
    pub async fn record_invitation(
        &self,
        inviter: &MemberId,
        invitee: &MemberId,
    ) -> LedgerResult<InvitationEdge> {
        if inviter == invitee {
            return Err(LedgerError::SelfInvitation(inviter.clone()));
        }

        let edge = self
            .store
            .append_invitation(inviter, invitee, INVITATION_STEP, Utc::now())
            .await?;
        tracing::info!(
            inviter = %edge.inviter,
            invitee = %edge.invitee,
            sequence = edge.sequence,
            "invitation recorded"
        );
        Ok(edge)
    }

    /// Freshest ledger slot held by `member` among edges above
    /// `min_sequence_exclusive`. Inviting places you one slot behind the
    /// person you invited. Zero when the member has no edge in range.
    pub async fn rank(&self, member: &MemberId, min_sequence_exclusive: i64) -> LedgerResult<i64> {
        let as_inviter = self
            .store
            .max_sequence_as_inviter(member, min_sequence_exclusive)
            .await?
            .unwrap_or(0);
        let as_invitee = self
            .store
            .max_sequence_as_invitee(member, min_sequence_exclusive)
            .await?
            .unwrap_or(0);
        Ok((as_inviter - 1).max(as_invitee))
    }

    /// Everyone on the newest `limit` edges, minus the reserved bootstrap
    /// identity. Holds at most `2 * limit` members.
    pub async fn recent_participants(&self, limit: usize) -> LedgerResult<BTreeSet<MemberId>> {
        let edges = self.store.recent_invitations(limit).await?;
        Ok(edges
            .into_iter()
            .flat_map(|edge| [edge.inviter, edge.invitee])
            .filter(|id| !id.is_system())
            .collect())
    }

    pub async fn counter(&self) -> LedgerResult<i64> {
        Ok(self.store.counter().await?)
    }

    pub async fn increment_counter(&self, amount: i64) -> LedgerResult<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        Ok(self.store.adjust_counter(amount).await?)
    }

    pub async fn decrement_counter(&self, amount: i64) -> LedgerResult<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let value = self.store.adjust_counter(-amount).await?;
        tracing::debug!(amount, counter = value, "invite counter decremented");
        Ok(value)
    }

    /// Spot of `member` within a window of `window` invitations:
    /// `total - rank(member, max(total - window, 1)) + 1`.
    pub async fn position(&self, member: &MemberId, window: usize) -> LedgerResult<Position> {
        let total = self.counter().await?;
        let window = i64::try_from(window).unwrap_or(i64::MAX);
        let floor = total.saturating_sub(window).max(1);
        let rank = self.rank(member, floor).await?;
        Ok(Position {
            spot: total - rank + 1,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pond_storage::InMemoryPondStorage;
    use proptest::prelude::*;

    fn ledger() -> InvitationLedger<InMemoryPondStorage> {
        InvitationLedger::new(Arc::new(InMemoryPondStorage::new()))
    }

    fn id(name: &str) -> MemberId {
        MemberId::new(name)
    }

    #[tokio::test]
    async fn chain_of_invitations_ranks_inviter_behind_invitee() {
        let ledger = ledger();
        let a_b = ledger.record_invitation(&id("a"), &id("b")).await.unwrap();
        assert_eq!(a_b.sequence, 2);
        assert_eq!(ledger.counter().await.unwrap(), 2);

        let b_c = ledger.record_invitation(&id("b"), &id("c")).await.unwrap();
        assert_eq!(b_c.sequence, 4);
        assert_eq!(ledger.counter().await.unwrap(), 4);

        // max(4 - 50, 1) = 1
        assert_eq!(ledger.rank(&id("b"), 1).await.unwrap(), 3);
        let position = ledger.position(&id("b"), 50).await.unwrap();
        assert_eq!(position, Position { spot: 2, total: 4 });

        assert_eq!(ledger.position(&id("c"), 50).await.unwrap().spot, 1);
        assert_eq!(ledger.position(&id("a"), 50).await.unwrap().spot, 4);
    }

    #[tokio::test]
    async fn rank_is_zero_without_edges_in_range() {
        let ledger = ledger();
        ledger.record_invitation(&id("a"), &id("b")).await.unwrap();
        assert_eq!(ledger.rank(&id("z"), 0).await.unwrap(), 0);
        assert_eq!(ledger.rank(&id("b"), 2).await.unwrap(), 0);
        // Inviter-only members sit one slot behind.
        assert_eq!(ledger.rank(&id("a"), 0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_participants_drops_system_seed() {
        let ledger = ledger();
        ledger
            .record_invitation(&MemberId::system(), &id("first"))
            .await
            .unwrap();
        ledger.record_invitation(&id("first"), &id("second")).await.unwrap();

        let recent = ledger.recent_participants(10).await.unwrap();
        assert_eq!(
            recent.into_iter().collect::<Vec<_>>(),
            vec![id("first"), id("second")]
        );

        let newest_only = ledger.recent_participants(1).await.unwrap();
        assert_eq!(newest_only.len(), 2);
    }

    #[tokio::test]
    async fn self_invitation_is_rejected_without_touching_counter() {
        let ledger = ledger();
        let result = ledger.record_invitation(&id("a"), &id("a")).await;
        assert!(matches!(result, Err(LedgerError::SelfInvitation(_))));
        assert_eq!(ledger.counter().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn counter_adjustments_are_independent_of_edges() {
        let ledger = ledger();
        ledger.record_invitation(&id("a"), &id("b")).await.unwrap();
        assert_eq!(ledger.decrement_counter(1).await.unwrap(), 1);
        assert_eq!(ledger.increment_counter(3).await.unwrap(), 4);
        assert!(matches!(
            ledger.decrement_counter(-1).await,
            Err(LedgerError::InvalidAmount(-1))
        ));
        assert_eq!(ledger.recent_participants(5).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_invitations_yield_even_gapless_sequences() {
        let ledger = ledger();
        let mut handles = Vec::new();
        for i in 0..40 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .record_invitation(&id(&format!("r{i}")), &id(&format!("e{i}")))
                    .await
                    .unwrap()
                    .sequence
            }));
        }

        let mut sequences = Vec::new();
        for handle in handles {
            sequences.push(handle.await.unwrap());
        }
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=40).map(|i| i * 2).collect::<Vec<_>>());
    }

    fn invitation_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
        proptest::collection::vec((0u8..8, 0u8..8), 0..40)
    }

    fn member(n: u8) -> MemberId {
        if n == 0 {
            MemberId::system()
        } else {
            MemberId::new(format!("m{n}"))
        }
    }

    proptest! {
        #[test]
        fn property_sequences_are_even_and_gapless(pairs in invitation_strategy()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");

            rt.block_on(async move {
                let ledger = ledger();
                let mut sequences = Vec::new();
                for (inviter, invitee) in pairs {
                    if let Ok(edge) = ledger.record_invitation(&member(inviter), &member(invitee)).await {
                        sequences.push(edge.sequence);
                    }
                }
                let expected = (1..=sequences.len() as i64).map(|i| i * 2).collect::<Vec<_>>();
                assert_eq!(sequences, expected);
            });
        }

        #[test]
        fn property_window_is_bounded_and_excludes_system(
            pairs in invitation_strategy(),
            limit in 0usize..12,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");

            rt.block_on(async move {
                let ledger = ledger();
                for (inviter, invitee) in pairs {
                    let _ = ledger.record_invitation(&member(inviter), &member(invitee)).await;
                }
                let recent = ledger.recent_participants(limit).await.unwrap();
                assert!(recent.len() <= 2 * limit);
                assert!(!recent.contains(&MemberId::system()));
            });
        }

        #[test]
        fn property_others_activity_never_improves_a_spot(pairs in invitation_strategy()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");

            rt.block_on(async move {
                let ledger = ledger();
                let watched = id("watched");
                ledger.record_invitation(&MemberId::system(), &watched).await.unwrap();
                let mut last_rank = ledger.rank(&watched, 0).await.unwrap();
                let mut last_spot = ledger.position(&watched, usize::MAX).await.unwrap().spot;

                for (inviter, invitee) in pairs {
                    if ledger.record_invitation(&member(inviter), &member(invitee)).await.is_err() {
                        continue;
                    }
                    let rank = ledger.rank(&watched, 0).await.unwrap();
                    let spot = ledger.position(&watched, usize::MAX).await.unwrap().spot;
                    assert!(rank <= last_rank);
                    assert!(spot >= last_spot);
                    last_rank = rank;
                    last_spot = spot;
                }
            });
        }
    }
}
