//! Duckpond storage abstractions.
//!
//! This crate defines the storage contract the pond core relies on:
//! - member directory records with point lookup by id and by phone handle
//! - the append-only invitation ledger and its global counter
//! - conversation rows with an idle-guarded create
//!
//! Design stance:
//! - Counter increment and edge append are one atomic storage operation.
//! - Conversation creation refuses to double-book a member.
//! - Deletes are idempotent; removing a missing row reports `false`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryPondStorage;
pub use traits::{ConversationStore, InvitationStore, MemberStore, PondStorage};
