//! # Hostsync Testkit
//!
//! Test utilities for the hostsync server.
//!
//! This crate provides:
//! - A test server with a manual clock over either store
//! - Account and group setup helpers
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use hostsync_testkit::prelude::*;
//!
//! let t = TestServer::memory();
//! let alice = t.account("alice");
//! t.group(&alice, "g1", &["bob"]);
//! assert_eq!(t.list_members(&alice, "g1").unwrap(), vec!["alice", "bob"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
