//! # Hostsync Protocol
//!
//! Wire types for the hostsync group synchronization server.
//!
//! Messages are JSON objects, one per line. A request names its operation in
//! the `op` field and carries the caller's `identity` and `session`; every
//! response carries a `status`, the server `time`, and either an `error`
//! (stable `tag` plus message) or an optional `body`.
//!
//! ```rust
//! use hostsync_protocol::{Operation, RequestEnvelope};
//!
//! let req = RequestEnvelope::decode(
//!     r#"{"identity":"bob","session":"s2","op":"listen_updates","group":"g1","ack":["n1"]}"#,
//! ).unwrap();
//! assert!(req.op.is_long_poll());
//! ```
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod delivery;
mod error;
mod messages;
mod response;

pub use delivery::{Delivery, InputDelivery, InputItem, Interrupt, UpdateDelivery};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{Channel, GrantShape, Operation, RequestEnvelope};
pub use response::{ErrorBody, GroupInfo, Response, ResponseBody, Status};
