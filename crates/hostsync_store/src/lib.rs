//! # Hostsync Store
//!
//! The relational storage collaborator of the hostsync server.
//!
//! The engine never builds query strings. It talks to storage through the
//! [`Store`] trait, whose methods are parameterized statements with typed
//! results. Two implementations are provided:
//!
//! - [`MemoryStore`] - For tests and ephemeral servers
//! - [`SqliteStore`] - For persistent servers (foreign-key cascades, upserts)
//!
//! ## Tables
//!
//! | Table | Key | Cascades from |
//! |---|---|---|
//! | accounts | identity | - |
//! | groups | group id | host account |
//! | memberships | (group, member) | group, member account |
//! | grants | (group, field, member) | membership |
//! | shared fields | (group, field) | group |
//! | update notices | (group, field, recipient) | membership |
//! | input notices | dedup id | group |
//! | private data | (identity, key) | account |

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod memory;
mod records;
mod sqlite;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use records::{
    Account, ChangeSet, GroupRecord, Grant, InputNotice, SharedField, Timestamp, UpdateNotice,
};
pub use sqlite::SqliteStore;
pub use store::Store;
