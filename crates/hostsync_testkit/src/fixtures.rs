//! Test fixtures and server helpers.

use hostsync_server::{Credentials, GroupServer, ManualClock, ServerConfig};
use hostsync_store::{MemoryStore, SqliteStore, Store};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Start time of every test clock.
pub const TEST_EPOCH: u64 = 1_700_000_000_000;

/// Credential used by [`TestServer::account`].
pub const TEST_CREDENTIAL: &str = "secret";

/// A server with a manual clock and automatic cleanup.
pub struct TestServer<S: Store> {
    /// The engine, shareable with spawned tasks.
    pub server: Arc<GroupServer<S>>,
    /// The clock driving the engine.
    pub clock: Arc<ManualClock>,
    _temp_dir: Option<TempDir>,
}

impl TestServer<MemoryStore> {
    /// Creates a server over an in-memory store.
    pub fn memory() -> Self {
        Self::memory_with_config(ServerConfig::default())
    }

    /// Creates a server over an in-memory store with a custom configuration.
    pub fn memory_with_config(config: ServerConfig) -> Self {
        Self::build(MemoryStore::new(), config, None)
    }
}

impl TestServer<SqliteStore> {
    /// Creates a server over a SQLite file in a temporary directory.
    pub fn sqlite() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = SqliteStore::open(temp_dir.path().join("hostsync.db"))
            .expect("Failed to open SQLite store");
        Self::build(store, ServerConfig::default(), Some(temp_dir))
    }
}

impl<S: Store> TestServer<S> {
    fn build(store: S, config: ServerConfig, temp_dir: Option<TempDir>) -> Self {
        let clock = Arc::new(ManualClock::new(TEST_EPOCH));
        let server = GroupServer::with_clock(Arc::new(store), clock.clone(), config);
        Self {
            server: Arc::new(server),
            clock,
            _temp_dir: temp_dir,
        }
    }

    /// Registers an account with a one hour timeout and returns its credentials.
    pub fn account(&self, identity: &str) -> Credentials {
        self.account_with_timeout(identity, 60)
    }

    /// Registers an account with the given timeout.
    pub fn account_with_timeout(&self, identity: &str, timeout_minutes: u32) -> Credentials {
        let session = self
            .server
            .register(identity, TEST_CREDENTIAL, timeout_minutes)
            .expect("Failed to register account");
        Credentials::new(identity, session)
    }

    /// Starts a group in app `demo` and adds the given members, registering
    /// accounts for them if needed.
    pub fn group(&self, host: &Credentials, group: &str, members: &[&str]) {
        self.server
            .start_group(host, group, "demo")
            .expect("Failed to start group");
        for member in members {
            if self.server.store().account(member).ok().flatten().is_none() {
                self.account(member);
            }
            self.server
                .add_member(host, group, member)
                .expect("Failed to add member");
        }
    }

    /// Logs an existing account in again.
    pub fn login(&self, identity: &str) -> Credentials {
        let session = self
            .server
            .login(identity, TEST_CREDENTIAL)
            .expect("Failed to log in");
        Credentials::new(identity, session)
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Moves the clock forward by whole minutes.
    pub fn advance_minutes(&self, minutes: u64) {
        self.advance(Duration::from_secs(minutes * 60));
    }
}

impl<S: Store> std::ops::Deref for TestServer<S> {
    type Target = GroupServer<S>;

    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

/// Converts string slices to owned strings.
pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fixture() {
        let t = TestServer::memory();
        let alice = t.account("alice");
        t.group(&alice, "g1", &["bob", "carol"]);
        assert_eq!(t.list_members(&alice, "g1").unwrap().len(), 3);
    }

    #[test]
    fn sqlite_fixture() {
        let t = TestServer::sqlite();
        let alice = t.account("alice");
        t.group(&alice, "g1", &["bob"]);
        let bob = t.login("bob");
        assert!(t.ping(&bob).is_ok());
    }

    #[test]
    fn clock_advances() {
        let t = TestServer::memory();
        t.advance_minutes(2);
        assert_eq!(t.now(), TEST_EPOCH + 120_000);
    }
}
