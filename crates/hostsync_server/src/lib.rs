//! # Hostsync Server
//!
//! Group synchronization engine and long-poll server for small multiplayer
//! applications.
//!
//! Clients register accounts, form groups (one host plus members) under an
//! application namespace, and exchange two kinds of state:
//!
//! - **Shared fields** written by the host and readable by members the host
//!   granted access to (update channel)
//! - **Inputs** written by members and read only by the host (input channel)
//!
//! Changes are delivered through held requests: a listen call is parked in
//! the [`HookRegistry`] until a relevant notice exists. Notices are durable
//! rows in the [`hostsync_store::Store`] and are removed only when the
//! recipient acknowledges them, so a server restart loses nothing but the
//! parked requests themselves.
//!
//! # Architecture
//!
//! ```text
//! net::serve ── RequestHandler ── GroupServer ─┬─ Store (memory / SQLite)
//!                                              ├─ HookRegistry
//!                                              └─ Clock
//! ```
//!
//! # Example
//!
//! ```rust
//! use hostsync_server::{Credentials, GroupServer, Permissions, ServerConfig};
//! use hostsync_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let server = GroupServer::new(Arc::new(MemoryStore::new()), ServerConfig::default());
//! let alice = Credentials::new("alice", server.register("alice", "secret", 15).unwrap());
//! server.start_group(&alice, "g1", "demo").unwrap();
//! server
//!     .submit_update(
//!         &alice,
//!         "g1",
//!         &["board".to_string()],
//!         &["X..".to_string()],
//!         Some(&Permissions::broadcast()),
//!     )
//!     .unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod clock;
mod config;
mod error;
mod handler;
mod hooks;
mod inputs;
pub mod net;
mod permissions;
mod registry;
mod server;
mod updates;

pub use auth::{generate_token, is_expired};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServerConfig;
pub use error::{GroupError, GroupResult};
pub use handler::RequestHandler;
pub use hooks::{Hook, HookRegistry};
pub use permissions::{plan, resolve_shape, Grantee, PermissionPlan, Permissions};
pub use server::{Credentials, GroupServer};
