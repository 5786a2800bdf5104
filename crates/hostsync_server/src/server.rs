//! The group synchronization engine.

use crate::clock::{Clock, SystemClock};
use crate::config::ServerConfig;
use crate::hooks::HookRegistry;
use hostsync_store::{Store, Timestamp};
use std::sync::Arc;

/// Caller credentials presented with every authenticated operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account identity.
    pub identity: String,
    /// Session token issued by register or login.
    pub session: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(identity: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            session: session.into(),
        }
    }
}

/// The group synchronization engine.
///
/// Owns the storage collaborator, the time source and the hook registry.
/// Operations are grouped by component:
///
/// - credentials: `register`, `login`, `logout`, `ping`, `authenticate`,
///   `unregister`, private data
/// - registry: `start_group`, `close_group`, `add_member`, `remove_member`,
///   `join_group`, `leave_group`, `list_groups`, `list_members`
/// - updates: `set_permissions`, `submit_update`, `listen_updates`,
///   `fetch_fields`, `set_threshold`
/// - inputs: `submit_input`, `listen_input`, `stop_listening`
///
/// Every operation validates its arguments before touching storage and
/// passes through [`GroupServer::authenticate`] before touching group state.
pub struct GroupServer<S: Store> {
    pub(crate) store: Arc<S>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) hooks: HookRegistry,
    pub(crate) config: ServerConfig,
}

impl<S: Store> GroupServer<S> {
    /// Creates a server using the system clock.
    pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Creates a server with an explicit time source.
    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>, config: ServerConfig) -> Self {
        Self {
            store,
            clock,
            hooks: HookRegistry::new(),
            config,
        }
    }

    /// Returns the storage collaborator.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the hook registry.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the current server time.
    pub fn now(&self) -> Timestamp {
        self.clock.now_millis()
    }
}
