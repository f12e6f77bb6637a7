//! Duckpond core types.
//!
//! The pond is an invite-only anonymous messaging pool. Members are ranked by
//! how recently they took part in an invitation and are matched with a random
//! live partner from the most recent window of invitations.
//!
//! This crate holds the shared vocabulary only: identifiers, the member
//! record, the immutable invitation edge and the conversation pairing.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod ids;
mod model;

pub use ids::{ConversationId, MemberId, PhoneHandle};
pub use model::{Conversation, InvitationEdge, Member};

/// Reserved identity used as the inviter of the pond's bootstrap invitations.
///
/// Never a directory member and never an eligible match candidate.
pub const SYSTEM_MEMBER_ID: &str = "system";

/// Number of most recent invitations that make up the recency window.
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// Seconds without a forwarded message after which a conversation is stale.
pub const DEFAULT_STALE_AFTER_SECS: i64 = 5 * 60;
